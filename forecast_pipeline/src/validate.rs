//! Data-quality gating of normalized tables

use crate::error::{PipelineError, Result};
use crate::normalize::{NormalizedTable, TIME_COLUMN};
use crate::table::Cell;
use chrono::NaiveDateTime;
use log::{debug, warn};
use polars::prelude::*;

/// Default target column
pub const DEFAULT_TARGET_COLUMN: &str = "close";

/// Number of offending values quoted in diagnostics
const SAMPLE_SIZE: usize = 5;

/// One historical row with a valid timestamp.
///
/// `value` is the coerced target column; `None` marks a missing value that
/// the training-set builder will drop. The price fields are coerced
/// leniently for display and are `None` when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Normalized table after coercion, with missing markers preserved
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTable {
    target_column: String,
    columns: Vec<String>,
    records: Vec<PriceRecord>,
    missing_rows: Vec<usize>,
}

impl ValidatedTable {
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Columns present in the normalized input
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    /// Rows whose target value is missing after coercion
    pub fn missing_rows(&self) -> &[usize] {
        &self.missing_rows
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `n` records
    pub fn tail(&self, n: usize) -> &[PriceRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Historical rows as a DataFrame for presentation
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let millis: Vec<i64> = self
            .records
            .iter()
            .map(|r| r.timestamp.and_utc().timestamp_millis())
            .collect();
        let date = Series::new(TIME_COLUMN, millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        let records = &self.records;
        let mut columns = vec![
            date,
            Series::new("open", project(records, |r| r.open)),
            Series::new("high", project(records, |r| r.high)),
            Series::new("low", project(records, |r| r.low)),
            Series::new("close", project(records, |r| r.close)),
            Series::new("volume", project(records, |r| r.volume)),
        ];
        if !["open", "high", "low", "close", "volume"].contains(&self.target_column.as_str()) {
            columns.push(Series::new(
                self.target_column.as_str(),
                project(records, |r| r.value),
            ));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Enforces non-emptiness, required columns and numeric coercion
#[derive(Debug, Clone)]
pub struct DataValidator {
    target_column: String,
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_COLUMN)
    }
}

impl DataValidator {
    /// Create a validator for the given canonical target column
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Validate a normalized table fetched for `instrument`
    pub fn validate(&self, instrument: &str, table: &NormalizedTable) -> Result<ValidatedTable> {
        if table.is_empty() {
            return Err(PipelineError::EmptySource {
                instrument: instrument.to_string(),
            });
        }

        let target_idx = self.require_column(table, &self.target_column)?;
        let time_idx = match table.time_column() {
            Some(idx) => idx,
            None => return Err(missing_column(table, TIME_COLUMN)),
        };

        let text_sample: Vec<String> = table
            .rows()
            .iter()
            .map(|row| &row[target_idx])
            .filter(|cell| cell.is_text())
            .take(SAMPLE_SIZE)
            .map(Cell::display_value)
            .collect();
        if !text_sample.is_empty() {
            warn!(
                "'{}' column contains text values. Sample: {:?}",
                self.target_column, text_sample
            );
        }

        let values: Vec<Option<f64>> = table
            .rows()
            .iter()
            .map(|row| row[target_idx].to_number())
            .collect();

        if values.iter().all(Option::is_none) {
            let sample = table
                .rows()
                .iter()
                .take(SAMPLE_SIZE)
                .map(|row| row[target_idx].display_value())
                .collect();
            return Err(PipelineError::AllValuesInvalid {
                column: self.target_column.clone(),
                sample,
            });
        }

        let mut timestamps = Vec::with_capacity(table.len());
        let mut bad_rows = Vec::new();
        let mut bad_sample = Vec::new();
        for (i, row) in table.rows().iter().enumerate() {
            match &row[time_idx] {
                Cell::Timestamp(ts) => timestamps.push(*ts),
                other => {
                    bad_rows.push(i);
                    if bad_sample.len() < SAMPLE_SIZE {
                        bad_sample.push(other.display_value());
                    }
                }
            }
        }
        if !bad_rows.is_empty() {
            return Err(PipelineError::InvalidTimestamp {
                rows: bad_rows,
                sample: bad_sample,
            });
        }

        let lookup = |name: &str| table.column_index(name);
        let (open, high, low, close, volume) = (
            lookup("open"),
            lookup("high"),
            lookup("low"),
            lookup("close"),
            lookup("volume"),
        );
        let records: Vec<PriceRecord> = table
            .rows()
            .iter()
            .zip(timestamps)
            .zip(values.iter())
            .map(|((row, timestamp), value)| PriceRecord {
                timestamp,
                value: *value,
                open: coerce(row, open),
                high: coerce(row, high),
                low: coerce(row, low),
                close: coerce(row, close),
                volume: coerce(row, volume),
            })
            .collect();

        let missing_rows: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
            .collect();

        debug!(
            "Validated {} rows for {} ({} missing '{}' values)",
            records.len(),
            instrument,
            missing_rows.len(),
            self.target_column
        );

        Ok(ValidatedTable {
            target_column: self.target_column.clone(),
            columns: table.columns().to_vec(),
            records,
            missing_rows,
        })
    }

    fn require_column(&self, table: &NormalizedTable, name: &str) -> Result<usize> {
        table
            .column_index(name)
            .ok_or_else(|| missing_column(table, name))
    }
}

fn project(records: &[PriceRecord], f: impl Fn(&PriceRecord) -> Option<f64>) -> Vec<Option<f64>> {
    records.iter().map(f).collect()
}

fn coerce(row: &[Cell], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| row[i].to_number())
}

fn missing_column(table: &NormalizedTable, name: &str) -> PipelineError {
    PipelineError::MissingColumn {
        column: name.to_string(),
        available: table.columns().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RawTableNormalizer;
    use crate::table::RawTable;

    fn normalized(rows: Vec<Vec<Cell>>) -> NormalizedTable {
        let raw = RawTable::from_columns(vec!["Date", "Open", "Close"], rows).unwrap();
        RawTableNormalizer::normalize(&raw)
    }

    fn row(date: &str, open: f64, close: Cell) -> Vec<Cell> {
        vec![Cell::Text(date.to_string()), Cell::Number(open), close]
    }

    #[test]
    fn test_missing_values_are_kept_as_markers() {
        let table = normalized(vec![
            row("2024-01-01", 1.0, Cell::Number(10.0)),
            row("2024-01-02", 1.0, Cell::Text("n/a".to_string())),
        ]);
        let validated = DataValidator::default().validate("TEST", &table).unwrap();

        assert_eq!(validated.len(), 2);
        assert_eq!(validated.records()[1].value, None);
        assert_eq!(validated.records()[0].open, Some(1.0));
        assert_eq!(validated.missing_rows(), &[1]);
    }

    #[test]
    fn test_invalid_timestamp_reports_rows() {
        let table = normalized(vec![
            row("2024-01-01", 1.0, Cell::Number(10.0)),
            row("yesterday", 1.0, Cell::Number(11.0)),
        ]);
        let err = DataValidator::default()
            .validate("TEST", &table)
            .unwrap_err();

        match err {
            PipelineError::InvalidTimestamp { rows, sample } => {
                assert_eq!(rows, vec![1]);
                assert_eq!(sample, vec!["yesterday".to_string()]);
            }
            other => panic!("Expected InvalidTimestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_target_column() {
        let table = normalized(vec![row("2024-01-01", 1.0, Cell::Number(10.0))]);
        let validated = DataValidator::new("open").validate("TEST", &table).unwrap();
        assert_eq!(validated.records()[0].value, Some(1.0));
    }

    #[test]
    fn test_to_dataframe_has_presentation_columns() {
        let table = normalized(vec![row("2024-01-01", 1.0, Cell::Number(10.0))]);
        let df = DataValidator::default()
            .validate("TEST", &table)
            .unwrap()
            .to_dataframe()
            .unwrap();

        assert_eq!(df.height(), 1);
        assert_eq!(
            df.get_column_names(),
            vec!["date", "open", "high", "low", "close", "volume"]
        );
    }
}
