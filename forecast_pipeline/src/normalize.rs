//! Shape normalization of raw tabular responses

use crate::table::{Cell, ColumnHeader, RawTable};
use log::debug;

/// Canonical name of the temporal column
pub const TIME_COLUMN: &str = "date";

const TIME_PREFIXES: [&str; 2] = ["date", "time"];

/// Raw table with flat, canonical column names and a coerced temporal column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    time_column: Option<usize>,
}

impl NormalizedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Position of the temporal column, if one was found
    pub fn time_column(&self) -> Option<usize> {
        self.time_column
    }

    /// Position of the first column with the given canonical name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// View this table as a raw table again, with flat headers and no index
    pub fn to_raw(&self) -> RawTable {
        RawTable::new(
            self.columns.iter().cloned().map(ColumnHeader::flat).collect(),
            self.rows.clone(),
        )
        .unwrap_or_default()
    }
}

/// Flattens headers, canonicalizes names and coerces the temporal column
#[derive(Debug)]
pub struct RawTableNormalizer;

impl RawTableNormalizer {
    /// Normalize a raw table. The input is left untouched.
    pub fn normalize(raw: &RawTable) -> NormalizedTable {
        if raw.has_composite_headers() {
            debug!(
                "Collapsing {} composite headers to their top level",
                raw.headers().len()
            );
        }

        let mut columns: Vec<String> = raw
            .headers()
            .iter()
            .map(|h| canonical_name(h.top()))
            .collect();
        let mut rows: Vec<Vec<Cell>> = raw.rows().to_vec();

        // Promote an implicit index to a regular leading column
        if let Some(index) = raw.index() {
            let name = index
                .name
                .as_deref()
                .map(canonical_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| TIME_COLUMN.to_string());
            columns.insert(0, name);
            for (row, value) in rows.iter_mut().zip(index.values.iter()) {
                row.insert(0, value.clone());
            }
        }

        let time_column = detect_time_column(&columns);
        if let Some(idx) = time_column {
            columns[idx] = TIME_COLUMN.to_string();
            for row in rows.iter_mut() {
                row[idx] = coerce_timestamp(&row[idx]);
            }
        } else {
            debug!("No temporal column among {:?}", columns);
        }

        NormalizedTable {
            columns,
            rows,
            time_column,
        }
    }
}

/// Position of the temporal column among canonical names.
///
/// Exact `date` wins; otherwise the first name that starts with `date` or
/// `time` (`datetime`, `date_utc`, `timestamp`, `time`).
pub fn detect_time_column(columns: &[String]) -> Option<usize> {
    columns.iter().position(|c| c == TIME_COLUMN).or_else(|| {
        columns
            .iter()
            .position(|c| TIME_PREFIXES.iter().any(|p| c.starts_with(p)))
    })
}

/// Lower-case with spaces replaced by underscores
pub fn canonical_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn coerce_timestamp(cell: &Cell) -> Cell {
    match cell.to_timestamp() {
        Some(ts) => Cell::Timestamp(ts),
        None => Cell::Invalid(cell.display_value()),
    }
}
