//! recorded sensor dataset served as history and simulated serial data

use crate::domain::{EmergencyState, Reading};
use crate::payload::BulkPayload;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is empty")]
    Empty,
}

/// one csv row
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DatasetRow {
    pub temperature: f64,
    pub humidity: f64,
    pub feels_like: f64,
    pub air_quality: f64,
    pub gas_adc: f64,
    #[serde(default)]
    pub fire: bool,
    #[serde(default)]
    pub gas: bool,
}

impl DatasetRow {
    pub fn reading(&self) -> Reading {
        Reading {
            temperature: self.temperature,
            humidity: self.humidity,
            feels_like: self.feels_like,
            air_quality: self.air_quality,
            gas_adc: self.gas_adc,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        let rows = reader.deserialize().collect::<Result<Vec<DatasetRow>, _>>()?;
        Self::from_rows(rows)
    }

    pub fn from_rows(rows: Vec<DatasetRow>) -> Result<Self, DatasetError> {
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// the first `count` rows, count clamped to [1, len]; alarm flags come
    /// from the last row of the window
    pub fn window(&self, count: u64) -> BulkPayload {
        let count = (count as usize).clamp(1, self.rows.len());
        let rows = &self.rows[..count];
        let readings: Vec<Reading> = rows.iter().map(DatasetRow::reading).collect();
        let emergency = rows
            .last()
            .map(|r| EmergencyState::new(r.fire, r.gas))
            .unwrap_or_default();
        BulkPayload::from_readings(&readings, emergency)
    }
}
