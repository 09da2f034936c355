//! Configuration Module
//! Data directory, CSV inference and map rendering settings.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Rows scanned when inferring column types of an accident archive.
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10_000;

/// Settings for the rendered state map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    /// Blank border around the plotting area, in pixels.
    pub margin: u32,
    /// Marker radius in pixels.
    pub point_size: u32,
    pub point_color: [u8; 3],
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            margin: 20,
            point_size: 1,
            point_color: [0, 0, 0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarsConfig {
    /// Directory holding the `accident_<year>.csv.bz2` archives.
    pub data_dir: PathBuf,
    pub infer_schema_length: usize,
    pub map: MapStyle,
}

impl Default for FarsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
            map: MapStyle::default(),
        }
    }
}

impl FarsConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_map_style(mut self, map: MapStyle) -> Self {
        self.map = map;
        self
    }

    /// Load a configuration from a JSON file. Missing keys fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: FarsConfig =
            serde_json::from_str(r#"{"data_dir": "/data/fars", "map": {"width": 400}}"#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data/fars"));
        assert_eq!(config.infer_schema_length, DEFAULT_INFER_SCHEMA_LENGTH);
        assert_eq!(config.map.width, 400);
        assert_eq!(config.map.height, 600);
    }

    #[test]
    fn default_data_dir_is_working_directory() {
        assert_eq!(FarsConfig::default().data_dir, PathBuf::from("."));
    }
}
