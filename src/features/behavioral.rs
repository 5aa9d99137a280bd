//! Per-employee behavioral statistics accumulated over complete attendance days.

use super::{DailyFeatureVector, EmployeeAggregateFeatureVector};

#[derive(Debug, Clone, Default)]
pub struct EmployeeStats {
    pub full_name: String,
    checkin_hour_sum: f64,
    days: u32,
    duration_sum: f64,
    /// Days with a usable (non-negative) duration
    duration_days: u32,
    pub lates: u32,
}

impl EmployeeStats {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    /// Fold one complete day in. A check-out before the check-in still counts toward the
    /// check-in average and lateness but not toward the duration average.
    pub fn push(&mut self, day: &DailyFeatureVector, late: bool) {
        self.days += 1;
        self.checkin_hour_sum += f64::from(day.checkin_hour);
        if day.work_duration_hours.is_finite() && day.work_duration_hours >= 0.0 {
            self.duration_sum += day.work_duration_hours;
            self.duration_days += 1;
        }
        if late {
            self.lates += 1;
        }
    }

    pub fn finish(self, user_id: String) -> EmployeeAggregateFeatureVector {
        let mean = |sum: f64, n: u32| (n > 0).then(|| sum / f64::from(n));
        EmployeeAggregateFeatureVector {
            user_id,
            full_name: self.full_name,
            avg_checkin_hour: mean(self.checkin_hour_sum, self.days),
            avg_work_duration: mean(self.duration_sum, self.duration_days),
            total_lates: self.lates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(hour: u32, duration: f64) -> DailyFeatureVector {
        DailyFeatureVector {
            record_id: "r".into(),
            user_id: "u".into(),
            full_name: "n".into(),
            date: "d".into(),
            checkin_hour: hour,
            checkin_minute: 0,
            work_duration_hours: duration,
        }
    }

    #[test]
    fn averages_and_lates() {
        let mut s = EmployeeStats::new("Reza");
        s.push(&day(8, 8.0), false);
        s.push(&day(9, 6.0), true);
        s.push(&day(10, -2.0), true);
        let v = s.finish("u1".into());
        assert_relative_eq!(v.avg_checkin_hour.unwrap(), 9.0);
        assert_relative_eq!(v.avg_work_duration.unwrap(), 7.0);
        assert_eq!(v.total_lates, 2);
    }

    #[test]
    fn no_usable_duration_leaves_gap() {
        let mut s = EmployeeStats::new("Reza");
        s.push(&day(8, -0.5), false);
        let v = s.finish("u1".into());
        assert_eq!(v.avg_work_duration, None);
        assert_eq!(v.avg_checkin_hour, Some(8.0));
    }
}
