//! Synthetic attendance generator for demos and local model training.

use super::{AttendanceRecord, UserProfile};
use chrono::{Duration, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PRESENCE_RATE: f64 = 0.8;
const CHECKOUT_RATE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub officers: usize,
    pub staff: usize,
    pub faculty: usize,
    /// Days generated, counting back from `end_date`
    pub days: u32,
    pub end_date: NaiveDate,
    pub seed: u64,
    pub utc_offset_minutes: i32,
    pub late_status: String,
    pub employee_type: String,
    pub employee_role: String,
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticDataset {
    pub users: Vec<UserProfile>,
    pub records: Vec<AttendanceRecord>,
}

impl SyntheticDataset {
    /// Officers carry the employee role plus "officer" and get no attendance of their own;
    /// staff and faculty get one record per present day. Check-ins fall between 07:30 and
    /// 09:30 local time and about 30% of days never check out.
    pub fn generate(config: &SeedConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());

        let mut users = Vec::new();
        for i in 1..=config.officers {
            users.push(UserProfile {
                user_id: format!("officer-{i}"),
                full_name: format!("Officer {i}"),
                employee_type: config.employee_type.clone(),
                roles: vec![config.employee_role.clone(), "officer".to_string()],
            });
        }
        for i in 1..=config.staff {
            users.push(UserProfile {
                user_id: format!("staff-{i}"),
                full_name: format!("Staff {i}"),
                employee_type: config.employee_type.clone(),
                roles: vec![config.employee_role.clone()],
            });
        }
        for i in 1..=config.faculty {
            users.push(UserProfile {
                user_id: format!("faculty-{i}"),
                full_name: format!("Faculty {i}"),
                employee_type: "faculty".to_string(),
                roles: vec!["faculty".to_string()],
            });
        }

        let mut records = Vec::new();
        for day in 0..config.days {
            let date = config.end_date - Duration::days(i64::from(day));
            let key = date.format("%Y-%m-%d").to_string();
            let Some(opening) = date
                .and_hms_opt(7, 30, 0)
                .and_then(|t| offset.from_local_datetime(&t).single())
            else {
                continue;
            };

            for user in users.iter().filter(|u| !u.has_role("officer")) {
                if !rng.gen_bool(PRESENCE_RATE) {
                    continue;
                }
                let check_in = opening + Duration::seconds(rng.gen_range(0..120 * 60));
                let check_out = rng
                    .gen_bool(CHECKOUT_RATE)
                    .then(|| check_in + Duration::seconds(rng.gen_range(4 * 3600..8 * 3600)));

                let is_staff = user.has_role(&config.employee_role);
                let status = if is_staff && check_in.hour() >= 8 && check_in.minute() > 30 {
                    config.late_status.clone()
                } else {
                    "present".to_string()
                };

                records.push(AttendanceRecord {
                    record_id: format!("{}-{}", user.user_id, key),
                    user_id: user.user_id.clone(),
                    date: key.clone(),
                    check_in: Some(check_in.with_timezone(&Utc)),
                    check_out: check_out.map(|t| t.with_timezone(&Utc)),
                    status,
                });
            }
        }

        Self { users, records }
    }
}
