//! Accident Aggregator Module
//! Multi-year loading and the month-by-year pivot.

use crate::data::loader::{require_columns, DataLoader, YEAR_COLUMN};
use crate::error::{FarsError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub const MONTH_COLUMN: &str = "MONTH";

/// Result of loading a single requested year.
#[derive(Debug)]
pub enum YearOutcome {
    /// `MONTH` and `year` columns only.
    Loaded(DataFrame),
    Failed(FarsError),
}

#[derive(Debug)]
pub struct YearLoad {
    pub year: i32,
    pub outcome: YearOutcome,
}

impl YearLoad {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, YearOutcome::Loaded(_))
    }

    pub fn table(&self) -> Option<&DataFrame> {
        match &self.outcome {
            YearOutcome::Loaded(df) => Some(df),
            YearOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FarsError> {
        match &self.outcome {
            YearOutcome::Loaded(_) => None,
            YearOutcome::Failed(err) => Some(err),
        }
    }

    pub fn into_table(self) -> Option<DataFrame> {
        match self.outcome {
            YearOutcome::Loaded(df) => Some(df),
            YearOutcome::Failed(_) => None,
        }
    }
}

/// One month of a [`SummaryTable`]; `counts` lines up with the table's years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub month: i32,
    pub counts: Vec<Option<u32>>,
}

/// Accident counts, one row per month and one column per year.
///
/// A month with no accidents in a given year holds `None`, not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    years: Vec<i32>,
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn months(&self) -> Vec<i32> {
        self.rows.iter().map(|row| row.month).collect()
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, month: i32, year: i32) -> Option<u32> {
        let col = self.years.iter().position(|&y| y == year)?;
        self.rows
            .iter()
            .find(|row| row.month == month)
            .and_then(|row| row.counts[col])
    }

    /// Wide DataFrame: `MONTH` followed by one nullable count column per year.
    pub fn as_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.years.len() + 1);
        columns.push(Column::new(MONTH_COLUMN.into(), self.months()));

        for (idx, year) in self.years.iter().enumerate() {
            let counts: Vec<Option<u32>> = self.rows.iter().map(|row| row.counts[idx]).collect();
            columns.push(Column::new(year.to_string().into(), counts));
        }

        Ok(DataFrame::new(columns)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Load every requested year, keeping only `MONTH` and `year`.
///
/// A year that fails to load is logged and kept as [`YearOutcome::Failed`];
/// results come back in request order. Warnings are emitted on the calling
/// thread once every year has been attempted.
pub fn load_years(loader: &DataLoader, years: &[i32]) -> Vec<YearLoad> {
    let loads: Vec<YearLoad> = years
        .par_iter()
        .map(|&year| {
            let outcome = match load_month_year(loader, year) {
                Ok(df) => YearOutcome::Loaded(df),
                Err(err) => YearOutcome::Failed(err),
            };
            YearLoad { year, outcome }
        })
        .collect();

    for load in &loads {
        match &load.outcome {
            YearOutcome::Loaded(df) => debug!(year = load.year, rows = df.height(), "loaded year"),
            YearOutcome::Failed(err) => {
                warn!(year = load.year, error = %err, "invalid year: {}", load.year)
            }
        }
    }
    loads
}

fn load_month_year(loader: &DataLoader, year: i32) -> Result<DataFrame> {
    let df = loader.load_year(year)?;
    require_columns(&df, &[MONTH_COLUMN])?;
    let df = df
        .lazy()
        .select([col(MONTH_COLUMN).cast(DataType::Int32), col(YEAR_COLUMN)])
        .collect()?;
    Ok(df)
}

/// Load `years` and pivot their monthly accident counts.
pub fn summarize_years(loader: &DataLoader, years: &[i32]) -> Result<SummaryTable> {
    summarize(load_years(loader, years))
}

/// Combine the loaded years and pivot month × year counts. Failed years are skipped.
pub fn summarize(loads: Vec<YearLoad>) -> Result<SummaryTable> {
    let mut tables = loads.into_iter().filter_map(YearLoad::into_table);
    let Some(mut combined) = tables.next() else {
        return Ok(SummaryTable::default());
    };
    for df in tables {
        combined.vstack_mut(&df)?;
    }

    let counts = combined
        .lazy()
        .filter(
            col(MONTH_COLUMN)
                .gt_eq(lit(1))
                .and(col(MONTH_COLUMN).lt_eq(lit(12))),
        )
        .group_by([col(YEAR_COLUMN), col(MONTH_COLUMN)])
        .agg([len().alias("n")])
        .collect()?;

    let year_ca = counts.column(YEAR_COLUMN)?.i32()?;
    let month_ca = counts.column(MONTH_COLUMN)?.i32()?;
    let n_col = counts.column("n")?.cast(&DataType::UInt32)?;
    let n_ca = n_col.u32()?;

    let mut years: BTreeSet<i32> = BTreeSet::new();
    let mut cells: BTreeMap<i32, BTreeMap<i32, u32>> = BTreeMap::new();
    for ((year, month), n) in year_ca.into_iter().zip(month_ca).zip(n_ca) {
        if let (Some(year), Some(month), Some(n)) = (year, month, n) {
            years.insert(year);
            cells.entry(month).or_default().insert(year, n);
        }
    }

    let years: Vec<i32> = years.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|(month, by_year)| SummaryRow {
            month,
            counts: years.iter().map(|year| by_year.get(year).copied()).collect(),
        })
        .collect();

    Ok(SummaryTable { years, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year_frame(year: i32, months: &[i32]) -> YearLoad {
        let df = df!(
            MONTH_COLUMN => months,
            YEAR_COLUMN => vec![year; months.len()],
        )
        .unwrap();
        YearLoad {
            year,
            outcome: YearOutcome::Loaded(df),
        }
    }

    #[test]
    fn pivot_orders_months_and_years() {
        let loads = vec![
            year_frame(2014, &[3, 1, 1]),
            year_frame(2013, &[1, 2, 2, 2]),
        ];
        let table = summarize(loads).unwrap();

        assert_eq!(table.years(), &[2013, 2014]);
        assert_eq!(table.months(), vec![1, 2, 3]);
        assert_eq!(table.count(1, 2013), Some(1));
        assert_eq!(table.count(1, 2014), Some(2));
        assert_eq!(table.count(2, 2013), Some(3));
    }

    #[test]
    fn absent_month_is_null_not_zero() {
        let table = summarize(vec![year_frame(2013, &[1, 2]), year_frame(2014, &[1])]).unwrap();
        assert_eq!(table.count(2, 2014), None);

        let wide = table.as_dataframe().unwrap();
        assert_eq!(wide.height(), 2);
        assert_eq!(wide.column("2014").unwrap().null_count(), 1);
    }

    #[test]
    fn out_of_range_months_are_dropped() {
        let table = summarize(vec![year_frame(2013, &[0, 1, 12, 13, 99])]).unwrap();
        assert_eq!(table.months(), vec![1, 12]);
    }

    #[test]
    fn failed_years_are_skipped() {
        let failed = YearLoad {
            year: 2020,
            outcome: YearOutcome::Failed(FarsError::InvalidState(0)),
        };
        let table = summarize(vec![year_frame(2013, &[4]), failed]).unwrap();
        assert_eq!(table.years(), &[2013]);

        let empty = summarize(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.years().is_empty());
    }

    #[test]
    fn json_carries_years_and_rows() {
        let table = summarize(vec![year_frame(2015, &[7])]).unwrap();
        let json = table.to_json().unwrap();
        assert!(json.contains("\"years\""));
        assert!(json.contains("2015"));
        assert!(json.contains("\"month\": 7"));
    }
}
