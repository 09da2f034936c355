//! Data module - archive loading and monthly aggregation

pub mod aggregator;
pub mod loader;

pub use aggregator::{
    load_years, summarize, summarize_years, SummaryRow, SummaryTable, YearLoad, YearOutcome,
};
pub use loader::{read_table, resolve_filename, DataLoader};
