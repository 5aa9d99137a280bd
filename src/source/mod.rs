//! Attendance data sources: shared record types and the provider trait.
//! The SQLite source is the production provider; the in-memory one backs tests and benches.

mod memory;
mod seed;
mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemorySource;
pub use seed::{SeedConfig, SyntheticDataset};
pub use sqlite::SqliteSource;

use crate::error::SourceError;

/// One attendance fact as stored. Timestamps are optional: an open day has no check-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub record_id: String,
    pub user_id: String,
    /// Opaque date key (e.g. a Jalali date string); matched verbatim, never parsed
    pub date: String,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub full_name: String,
    pub employee_type: String,
    pub roles: Vec<String>,
}

impl UserProfile {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A record joined with the profile of its user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub record: AttendanceRecord,
    pub user: UserProfile,
}

/// Provider of joined attendance rows. Records whose user is unknown are never returned.
pub trait AttendanceSource: Send + Sync {
    /// All entries whose date key equals `date` exactly.
    fn entries_for_date(&self, date: &str) -> Result<Vec<AttendanceEntry>, SourceError>;

    /// The whole population, for training and clustering.
    fn all_entries(&self) -> Result<Vec<AttendanceEntry>, SourceError>;
}
