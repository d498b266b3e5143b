//! Projection of validated history onto model training pairs

use crate::error::{PipelineError, Result};
use crate::validate::ValidatedTable;
use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};

/// Fewest observations a forecasting fit is defined for
pub const MIN_TRAINING_POINTS: usize = 2;

/// One (timestamp, value) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingPoint {
    pub ds: NaiveDateTime,
    pub y: f64,
}

/// Ordered training observations. Duplicated timestamps are kept as-is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSet {
    points: Vec<TrainingPoint>,
    dropped_rows: Vec<usize>,
}

impl TrainingSet {
    /// Build a training set directly from pairs, enforcing the size gate
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDateTime, f64)>) -> Result<Self> {
        let points: Vec<TrainingPoint> = pairs
            .into_iter()
            .map(|(ds, y)| TrainingPoint { ds, y })
            .collect();
        check_size(points.len())?;
        Ok(Self {
            points,
            dropped_rows: Vec::new(),
        })
    }

    pub fn points(&self) -> &[TrainingPoint] {
        &self.points
    }

    /// Rows of the validated table that were dropped for a missing value
    pub fn dropped_rows(&self) -> &[usize] {
        &self.dropped_rows
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.ds).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Latest timestamp in the set
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.points.iter().map(|p| p.ds).max()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Builds a [`TrainingSet`] from a [`ValidatedTable`]
#[derive(Debug)]
pub struct TrainingSetBuilder;

impl TrainingSetBuilder {
    /// Project to (timestamp, value) pairs and drop missing values
    pub fn build(table: &ValidatedTable) -> Result<TrainingSet> {
        let mut points = Vec::with_capacity(table.len());
        let mut dropped_rows = Vec::new();

        for (i, record) in table.records().iter().enumerate() {
            match record.value {
                Some(y) => points.push(TrainingPoint {
                    ds: record.timestamp,
                    y,
                }),
                None => dropped_rows.push(i),
            }
        }

        if !dropped_rows.is_empty() {
            warn!(
                "Some '{}' values are missing or invalid. Dropping {} of {} rows.",
                table.target_column(),
                dropped_rows.len(),
                table.len()
            );
        }

        check_size(points.len())?;

        Ok(TrainingSet {
            points,
            dropped_rows,
        })
    }
}

fn check_size(found: usize) -> Result<()> {
    if found < MIN_TRAINING_POINTS {
        return Err(PipelineError::InsufficientData {
            required: MIN_TRAINING_POINTS,
            found,
        });
    }
    Ok(())
}
