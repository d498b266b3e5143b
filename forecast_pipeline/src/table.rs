//! Loosely-typed tabular input as returned by a data source

use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;

/// Date and datetime layouts accepted when coercing text to a timestamp
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Whole numbers in a date column are compact `YYYYMMDD` dates
const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// A single loosely-typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// No value at all
    Empty,
    /// Free text
    Text(String),
    /// Numeric value
    Number(f64),
    /// Temporal value
    Timestamp(NaiveDateTime),
    /// A temporal field that failed coercion, holding the original text.
    /// Only produced by normalization.
    Invalid(String),
}

impl Cell {
    /// Infer a cell from raw text: blank is empty, numeric text is a number,
    /// anything else stays text
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    /// Numeric coercion. `None` is the missing marker.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(v) => *v,
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Temporal coercion. Numbers are only accepted as compact `YYYYMMDD`
    /// dates; any other number is not a timestamp.
    pub fn to_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => parse_timestamp(s),
            Cell::Number(v) if v.is_finite() && v.fract() == 0.0 && *v >= 0.0 => {
                let digits = format!("{:.0}", v);
                if digits.len() != 8 {
                    return None;
                }
                NaiveDate::parse_from_str(&digits, COMPACT_DATE_FORMAT)
                    .ok()?
                    .and_hms_opt(0, 0, 0)
            }
            _ => None,
        }
    }

    /// Whether the cell holds free text
    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// Human-readable rendering used in diagnostics
    pub fn display_value(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) | Cell::Invalid(s) => s.clone(),
            Cell::Number(v) => v.to_string(),
            Cell::Timestamp(ts) => ts.to_string(),
        }
    }
}

/// Parse a date or datetime string.
///
/// RFC 3339 values with an offset are converted to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// A column header, possibly spanning several naming levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    levels: Vec<String>,
}

impl ColumnHeader {
    /// Single-level header
    pub fn flat(name: impl Into<String>) -> Self {
        Self {
            levels: vec![name.into()],
        }
    }

    /// Multi-level header, outermost level first
    pub fn composite<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// The outermost level
    pub fn top(&self) -> &str {
        self.levels.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_composite(&self) -> bool {
        self.levels.len() > 1
    }
}

/// An implicit row index carried beside the columns (e.g. a date index)
#[derive(Debug, Clone, PartialEq)]
pub struct RawIndex {
    pub name: Option<String>,
    pub values: Vec<Cell>,
}

/// Layout of a CSV export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    /// Number of header lines; more than one yields composite headers
    pub header_rows: usize,
    /// Treat the first column as the row index
    pub index_column: bool,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            header_rows: 1,
            index_column: false,
        }
    }
}

/// Raw tabular response from a data source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    headers: Vec<ColumnHeader>,
    index: Option<RawIndex>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Create a table from headers and row-major cells
    pub fn new(headers: Vec<ColumnHeader>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(PipelineError::InvalidParameter(format!(
                "Row {} has {} cells but the table has {} columns",
                i,
                row.len(),
                headers.len()
            )));
        }

        Ok(Self {
            headers,
            index: None,
            rows,
        })
    }

    /// Create a table with single-level headers
    pub fn from_columns<S: Into<String>>(names: Vec<S>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        Self::new(names.into_iter().map(ColumnHeader::flat).collect(), rows)
    }

    /// Attach an implicit row index
    pub fn with_index(mut self, index: RawIndex) -> Result<Self> {
        if index.values.len() != self.rows.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "Index has {} values but the table has {} rows",
                index.values.len(),
                self.rows.len()
            )));
        }
        self.index = Some(index);
        Ok(self)
    }

    /// Parse a CSV export
    pub fn from_csv_reader<R: Read>(reader: R, layout: CsvLayout) -> Result<Self> {
        if layout.header_rows == 0 {
            return Err(PipelineError::InvalidParameter(
                "CSV input needs at least one header row".to_string(),
            ));
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut header_lines: Vec<Vec<String>> = Vec::with_capacity(layout.header_rows);
        let mut rows = Vec::new();
        let mut index_values = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            if header_lines.len() < layout.header_rows {
                header_lines.push(record.iter().map(str::to_string).collect());
                continue;
            }

            let mut cells: Vec<Cell> = record.iter().map(Cell::from_text).collect();
            if layout.index_column && !cells.is_empty() {
                index_values.push(cells.remove(0));
            }
            rows.push(cells);
        }

        let width = header_lines.first().map(Vec::len).unwrap_or(0);
        let mut headers: Vec<ColumnHeader> = (0..width)
            .map(|col| {
                ColumnHeader::composite(
                    header_lines
                        .iter()
                        .map(|line| line.get(col).cloned().unwrap_or_default()),
                )
            })
            .collect();

        if !layout.index_column {
            return Self::new(headers, rows);
        }

        // The index name sits on the innermost non-blank header level
        let index_name = if headers.is_empty() {
            None
        } else {
            headers
                .remove(0)
                .levels()
                .iter()
                .rev()
                .find(|level| !level.is_empty())
                .cloned()
        };

        Self::new(headers, rows)?.with_index(RawIndex {
            name: index_name,
            values: index_values,
        })
    }

    pub fn headers(&self) -> &[ColumnHeader] {
        &self.headers
    }

    pub fn index(&self) -> Option<&RawIndex> {
        self.index.as_ref()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Whether any header spans more than one level
    pub fn has_composite_headers(&self) -> bool {
        self.headers.iter().any(ColumnHeader::is_composite)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
