//! Feature extraction from joined attendance rows.
//!
//! Two schemas are produced: one vector per complete attendance day (anomaly model input)
//! and one vector per employee (clustering input). Column order and units are fixed by
//! [`DAILY_SCHEMA`] and [`EMPLOYEE_SCHEMA`]; trained artifacts record the schema they were
//! fitted on and refuse to load under a different one.

mod behavioral;
mod pipeline;

pub use behavioral::EmployeeStats;
pub use pipeline::FeatureExtractor;

use crate::error::ModelError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Bumped whenever a schema below changes order, units or membership.
pub const SCHEMA_VERSION: &str = "v1";

/// Ordered set of named numeric model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSchema {
    pub version: &'static str,
    pub names: &'static [&'static str],
}

impl FeatureSchema {
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Compact identity string stored in artifacts, e.g. `v1:checkin_hour,checkin_minute,...`
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.version, self.names.join(","))
    }
}

pub const DAILY_SCHEMA: FeatureSchema = FeatureSchema {
    version: SCHEMA_VERSION,
    names: &["checkin_hour", "checkin_minute", "work_duration_hours"],
};

pub const EMPLOYEE_SCHEMA: FeatureSchema = FeatureSchema {
    version: SCHEMA_VERSION,
    names: &["avg_checkin_hour", "avg_work_duration", "total_lates"],
};

/// Features of one complete attendance day. Hour and minute are local to the configured
/// offset; duration is in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeatureVector {
    pub record_id: String,
    pub user_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub date: String,
    pub checkin_hour: u32,
    pub checkin_minute: u32,
    pub work_duration_hours: f64,
}

impl DailyFeatureVector {
    /// Model input in [`DAILY_SCHEMA`] order.
    pub fn to_row(&self) -> [f64; 3] {
        [
            f64::from(self.checkin_hour),
            f64::from(self.checkin_minute),
            self.work_duration_hours,
        ]
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.checkin_hour >= 24 {
            return Err(self.malformed("checkin_hour", self.checkin_hour.to_string()));
        }
        if self.checkin_minute >= 60 {
            return Err(self.malformed("checkin_minute", self.checkin_minute.to_string()));
        }
        if !self.work_duration_hours.is_finite() || self.work_duration_hours < 0.0 {
            return Err(self.malformed(
                "work_duration_hours",
                self.work_duration_hours.to_string(),
            ));
        }
        Ok(())
    }

    fn malformed(&self, field: &'static str, value: String) -> ModelError {
        ModelError::MalformedFeature {
            id: self.record_id.clone(),
            field,
            value,
        }
    }
}

/// Per-employee behavior summary. Averages are absent when no qualifying record could
/// supply them; the clustering imputer fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeAggregateFeatureVector {
    pub user_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub avg_checkin_hour: Option<f64>,
    pub avg_work_duration: Option<f64>,
    pub total_lates: u32,
}

impl EmployeeAggregateFeatureVector {
    /// Model input in [`EMPLOYEE_SCHEMA`] order, `None` marking a missing value.
    pub fn to_row(&self) -> [Option<f64>; 3] {
        [
            self.avg_checkin_hour,
            self.avg_work_duration,
            Some(f64::from(self.total_lates)),
        ]
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(h) = self.avg_checkin_hour {
            if !h.is_finite() || !(0.0..24.0).contains(&h) {
                return Err(self.malformed("avg_checkin_hour", h));
            }
        }
        if let Some(d) = self.avg_work_duration {
            if !d.is_finite() || d < 0.0 {
                return Err(self.malformed("avg_work_duration", d));
            }
        }
        Ok(())
    }

    fn malformed(&self, field: &'static str, value: f64) -> ModelError {
        ModelError::MalformedFeature {
            id: self.user_id.clone(),
            field,
            value: value.to_string(),
        }
    }
}

/// Validate every vector and stack them into an `n x 3` matrix.
/// Fails on the first malformed row; nothing reaches a model until all rows pass.
pub fn daily_matrix(vectors: &[DailyFeatureVector]) -> Result<Array2<f64>, ModelError> {
    let mut values = Vec::with_capacity(vectors.len() * DAILY_SCHEMA.width());
    for v in vectors {
        v.validate()?;
        values.extend_from_slice(&v.to_row());
    }
    Array2::from_shape_vec((vectors.len(), DAILY_SCHEMA.width()), values).map_err(|_| {
        ModelError::DimensionMismatch {
            expected: DAILY_SCHEMA.width(),
            found: 0,
        }
    })
}

/// Validate every aggregate and return rows with missing values preserved.
pub fn employee_rows(
    vectors: &[EmployeeAggregateFeatureVector],
) -> Result<Vec<[Option<f64>; 3]>, ModelError> {
    vectors
        .iter()
        .map(|v| v.validate().map(|_| v.to_row()))
        .collect()
}
