//! FARS - Yearly Traffic-Accident Archive Analysis
//!
//! Reads per-year `accident_<year>.csv.bz2` archives, summarizes accident
//! counts by month and year, and plots the accident locations of one state.

pub mod charts;
pub mod config;
pub mod data;
pub mod error;
mod logging;

pub use charts::{MapOutcome, StateMap};
pub use config::{FarsConfig, MapStyle};
pub use data::{
    read_table, resolve_filename, DataLoader, SummaryRow, SummaryTable, YearLoad, YearOutcome,
};
pub use error::{FarsError, Result};
pub use logging::init_tracing;

/// Entry point bundling a data directory and map style.
#[derive(Debug, Clone, Default)]
pub struct Fars {
    loader: DataLoader,
    style: MapStyle,
}

impl Fars {
    pub fn new(config: FarsConfig) -> Self {
        Self {
            loader: DataLoader::new(&config),
            style: config.map,
        }
    }

    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    /// Load each year's `MONTH`/`year` table; failures are kept per year.
    pub fn load_years(&self, years: &[i32]) -> Vec<YearLoad> {
        data::load_years(&self.loader, years)
    }

    /// Monthly accident counts, one column per year that could be loaded.
    pub fn summarize_years(&self, years: &[i32]) -> Result<SummaryTable> {
        data::summarize_years(&self.loader, years)
    }

    /// Plot the accidents of `state` in `year`.
    pub fn map_state(&self, state: i32, year: i32) -> Result<MapOutcome> {
        charts::map_state(&self.loader, &self.style, state, year)
    }
}

/// [`Fars::summarize_years`] over archives in the working directory.
pub fn summarize_years(years: &[i32]) -> Result<SummaryTable> {
    Fars::default().summarize_years(years)
}

/// [`Fars::map_state`] over archives in the working directory.
pub fn map_state(state: i32, year: i32) -> Result<MapOutcome> {
    Fars::default().map_state(state, year)
}
