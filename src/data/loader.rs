//! Accident Archive Loader Module
//! Resolves yearly archive names and reads them into Polars DataFrames.

use crate::config::{FarsConfig, DEFAULT_INFER_SCHEMA_LENGTH};
use crate::error::{FarsError, Result};
use bzip2::read::BzDecoder;
use polars::prelude::*;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FILENAME_PREFIX: &str = "accident_";
pub const FILENAME_EXTENSION: &str = ".csv.bz2";

/// Synthetic column added to every table loaded through [`DataLoader::load_year`].
pub const YEAR_COLUMN: &str = "year";

const BZIP2_MAGIC: &[u8] = b"BZh";

/// Archive name for a given year, e.g. `accident_2013.csv.bz2`.
pub fn resolve_filename(year: i32) -> String {
    format!("{FILENAME_PREFIX}{year}{FILENAME_EXTENSION}")
}

/// Read an accident archive with the default schema inference length.
pub fn read_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    read_table_with(path.as_ref(), DEFAULT_INFER_SCHEMA_LENGTH)
}

/// Read an accident archive into a materialized DataFrame.
///
/// Archives are bzip2-compressed CSV; uncompressed CSV is accepted as well.
/// An absent file fails with [`FarsError::NotFound`] before anything is opened.
pub fn read_table_with(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(FarsError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let mut compressed = Vec::new();
    File::open(path)?.read_to_end(&mut compressed)?;
    let raw = decompress(compressed)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(infer_schema_length))
        .into_reader_with_file_handle(Cursor::new(raw))
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), "read accident table");
    Ok(df)
}

fn decompress(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !bytes.starts_with(BZIP2_MAGIC) {
        return Ok(bytes);
    }
    let mut raw = Vec::with_capacity(bytes.len() * 8);
    BzDecoder::new(bytes.as_slice()).read_to_end(&mut raw)?;
    Ok(raw)
}

/// Fail with [`FarsError::MissingColumn`] unless every name is a column of `df`.
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(FarsError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Loads yearly accident archives from a data directory.
#[derive(Debug, Clone)]
pub struct DataLoader {
    data_dir: PathBuf,
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(&FarsConfig::default())
    }
}

impl DataLoader {
    pub fn new(config: &FarsConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            infer_schema_length: config.infer_schema_length,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of the archive for `year` inside the data directory.
    pub fn path_for_year(&self, year: i32) -> PathBuf {
        self.data_dir.join(resolve_filename(year))
    }

    /// Read the untagged archive for `year`.
    pub fn read_year(&self, year: i32) -> Result<DataFrame> {
        read_table_with(&self.path_for_year(year), self.infer_schema_length)
    }

    /// Read the archive for `year` and add the `year` column.
    pub fn load_year(&self, year: i32) -> Result<DataFrame> {
        let df = self
            .read_year(year)?
            .lazy()
            .with_column(lit(year).cast(DataType::Int32).alias(YEAR_COLUMN))
            .collect()?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    fn write_bz2(path: &Path, csv: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = BzEncoder::new(file, Compression::default());
        encoder.write_all(csv.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn filename_embeds_year_and_extension() {
        for year in [1975, 2013, 2014, 2015, 9999] {
            let name = resolve_filename(year);
            assert!(name.ends_with(FILENAME_EXTENSION));
            assert!(name.starts_with(FILENAME_PREFIX));
            let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
            // the "2" of "bz2" is part of the extension
            assert_eq!(digits, format!("{year}2"));
        }
        assert_eq!(resolve_filename(2013), "accident_2013.csv.bz2");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(dir.path().join("accident_1999.csv.bz2")).unwrap_err();
        assert!(matches!(err, FarsError::NotFound { .. }));
        assert!(err.to_string().contains("accident_1999.csv.bz2"));
    }

    #[test]
    fn reads_compressed_and_plain_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "STATE,MONTH,LONGITUD,LATITUDE\n1,1,-86.5,32.6\n1,2,-87.1,33.0\n";

        let compressed = dir.path().join("a.csv.bz2");
        write_bz2(&compressed, csv);
        let df = read_table(&compressed).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 4);

        let plain = dir.path().join("b.csv");
        std::fs::write(&plain, csv).unwrap();
        assert_eq!(read_table(&plain).unwrap().height(), 2);
    }

    #[test]
    fn load_year_tags_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_bz2(
            &dir.path().join(resolve_filename(2013)),
            "STATE,MONTH\n1,1\n2,5\n",
        );
        let loader = DataLoader::new(&FarsConfig::default().with_data_dir(dir.path()));

        let df = loader.load_year(2013).unwrap();
        let years: Vec<Option<i32>> = df
            .column(YEAR_COLUMN)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(years, vec![Some(2013), Some(2013)]);
    }

    #[test]
    fn require_columns_names_the_gap() {
        let df = df!("STATE" => [1i64]).unwrap();
        assert!(require_columns(&df, &["STATE"]).is_ok());
        let err = require_columns(&df, &["STATE", "MONTH"]).unwrap_err();
        assert!(matches!(err, FarsError::MissingColumn(name) if name == "MONTH"));
    }
}
