//! Market data sources

use crate::error::{PipelineError, Result};
use crate::normalize::{canonical_name, detect_time_column};
use crate::table::{Cell, CsvLayout, RawTable};
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Half-open `[start, end)` range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a new range; `start` must be before `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(PipelineError::InvalidParameter(format!(
                "Date range start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Supplier of daily records for an instrument
pub trait DataSource: Send + Sync {
    /// Fetch the rows for `instrument` within `range`.
    ///
    /// An unknown or delisted instrument yields an empty table, not an error.
    fn fetch(&self, instrument: &str, range: &DateRange) -> Result<RawTable>;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn fetch(&self, instrument: &str, range: &DateRange) -> Result<RawTable> {
        (**self).fetch(instrument, range)
    }
}

/// Reads `<dir>/<INSTRUMENT>.csv` exports
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    dir: PathBuf,
    layout: CsvLayout,
}

impl CsvDataSource {
    /// Create a source over a directory of CSV exports
    pub fn new<P: AsRef<Path>>(dir: P, layout: CsvLayout) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            layout,
        }
    }

    /// Path of the export for `instrument`
    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", instrument))
    }
}

impl DataSource for CsvDataSource {
    fn fetch(&self, instrument: &str, range: &DateRange) -> Result<RawTable> {
        let path = self.path_for(instrument);
        if !path.exists() {
            info!("No export for {} at {}", instrument, path.display());
            return Ok(RawTable::default());
        }

        let file = File::open(&path)?;
        let table = RawTable::from_csv_reader(file, self.layout)?;
        let table = filter_to_range(table, range)?;
        info!(
            "Loaded {} rows for {} from {}",
            table.len(),
            instrument,
            path.display()
        );
        Ok(table)
    }
}

/// Fixed tables held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    tables: HashMap<String, RawTable>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, instrument: impl Into<String>, table: RawTable) -> Self {
        self.tables.insert(instrument.into(), table);
        self
    }
}

impl DataSource for InMemoryDataSource {
    fn fetch(&self, instrument: &str, _range: &DateRange) -> Result<RawTable> {
        Ok(self.tables.get(instrument).cloned().unwrap_or_default())
    }
}

/// Drop rows whose date parses and falls outside the range. Rows whose date
/// does not parse are kept so validation can report them. The date comes
/// from the index when there is one, else from the detected time column.
fn filter_to_range(table: RawTable, range: &DateRange) -> Result<RawTable> {
    let keep: Vec<bool> = match table.index() {
        Some(index) => index.values.iter().map(|c| in_range(date_of(c), range)).collect(),
        None => {
            let names: Vec<String> = table
                .headers()
                .iter()
                .map(|h| canonical_name(h.top()))
                .collect();
            let Some(idx) = detect_time_column(&names) else {
                debug!("No date column to filter on; keeping all {} rows", table.len());
                return Ok(table);
            };
            table
                .rows()
                .iter()
                .map(|row| in_range(row.get(idx).and_then(date_of), range))
                .collect()
        }
    };
    if keep.iter().all(|k| *k) {
        return Ok(table);
    }

    let rows: Vec<Vec<Cell>> = table
        .rows()
        .iter()
        .zip(keep.iter())
        .filter(|(_, k)| **k)
        .map(|(row, _)| row.clone())
        .collect();
    let filtered = RawTable::new(table.headers().to_vec(), rows)?;

    match table.index() {
        Some(index) => {
            let mut index = index.clone();
            index.values = index
                .values
                .into_iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(v, _)| v)
                .collect();
            filtered.with_index(index)
        }
        None => Ok(filtered),
    }
}

fn date_of(cell: &Cell) -> Option<NaiveDate> {
    cell.to_timestamp().map(|ts| ts.date())
}

fn in_range(date: Option<NaiveDate>, range: &DateRange) -> bool {
    date.map_or(true, |d| range.contains(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_is_half_open() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        assert!(range.contains(date(2024, 1, 1)));
        assert!(range.contains(date(2024, 1, 2)));
        assert!(!range.contains(date(2024, 1, 3)));
        assert!(DateRange::new(date(2024, 1, 3), date(2024, 1, 3)).is_err());
    }

    #[test]
    fn test_filter_keeps_unparsable_rows() {
        let table = RawTable::from_columns(
            vec!["Date", "Close"],
            vec![
                vec![Cell::Text("2023-12-31".to_string()), Cell::Number(1.0)],
                vec![Cell::Text("2024-01-01".to_string()), Cell::Number(2.0)],
                vec![Cell::Text("garbage".to_string()), Cell::Number(3.0)],
            ],
        )
        .unwrap();
        let range = DateRange::new(date(2024, 1, 1), date(2024, 2, 1)).unwrap();
        let filtered = filter_to_range(table, &range).unwrap();

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.rows()[1][0], Cell::Text("garbage".to_string()));
    }

    #[test]
    fn test_in_memory_unknown_instrument_is_empty() {
        let source = InMemoryDataSource::new();
        let range = DateRange::new(date(2024, 1, 1), date(2024, 2, 1)).unwrap();
        assert!(source.fetch("NOPE", &range).unwrap().is_empty());
    }
}
