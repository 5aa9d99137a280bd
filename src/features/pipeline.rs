//! Feature extraction pipeline: joined rows → complete days → daily or per-employee vectors.

use super::{DailyFeatureVector, EmployeeAggregateFeatureVector, EmployeeStats};
use crate::config::FeaturesConfig;
use crate::error::ModelError;
use crate::source::AttendanceEntry;
use chrono::{FixedOffset, Timelike};
use std::collections::BTreeMap;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeaturesConfig,
    offset: FixedOffset,
}

impl FeatureExtractor {
    pub fn new(config: FeaturesConfig) -> Result<Self, ModelError> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            ModelError::InvalidParameter {
                name: "utc_offset_minutes",
                reason: format!("{} is not a valid offset", config.utc_offset_minutes),
            }
        })?;
        Ok(Self { config, offset })
    }

    pub fn config(&self) -> &FeaturesConfig {
        &self.config
    }

    /// Features of one row, or `None` unless both check-in and check-out are present.
    pub fn daily_one(&self, entry: &AttendanceEntry) -> Option<DailyFeatureVector> {
        let record = &entry.record;
        let (check_in, check_out) = (record.check_in?, record.check_out?);
        let local = check_in.with_timezone(&self.offset);
        let millis = (check_out - check_in).num_milliseconds();
        Some(DailyFeatureVector {
            record_id: record.record_id.clone(),
            user_id: record.user_id.clone(),
            full_name: entry.user.full_name.clone(),
            date: record.date.clone(),
            checkin_hour: local.hour(),
            checkin_minute: local.minute(),
            work_duration_hours: millis as f64 / MILLIS_PER_HOUR,
        })
    }

    /// Every complete day in `entries`, in input order.
    pub fn daily(&self, entries: &[AttendanceEntry]) -> Vec<DailyFeatureVector> {
        entries.iter().filter_map(|e| self.daily_one(e)).collect()
    }

    /// Complete days of users whose employee type feeds anomaly training.
    pub fn daily_for_training(&self, entries: &[AttendanceEntry]) -> Vec<DailyFeatureVector> {
        entries
            .iter()
            .filter(|e| e.user.employee_type == self.config.training_employee_type)
            .filter_map(|e| self.daily_one(e))
            .collect()
    }

    /// One aggregate per user holding the clustering role, ordered by user id.
    pub fn employee_aggregates(
        &self,
        entries: &[AttendanceEntry],
    ) -> Vec<EmployeeAggregateFeatureVector> {
        let mut per_user: BTreeMap<&str, EmployeeStats> = BTreeMap::new();
        for entry in entries {
            if !entry.user.has_role(&self.config.clustering_role) {
                continue;
            }
            let Some(day) = self.daily_one(entry) else {
                continue;
            };
            let late = entry.record.status == self.config.late_status;
            per_user
                .entry(entry.user.user_id.as_str())
                .or_insert_with(|| EmployeeStats::new(entry.user.full_name.clone()))
                .push(&day, late);
        }
        per_user
            .into_iter()
            .map(|(user_id, stats)| stats.finish(user_id.to_string()))
            .collect()
    }
}
