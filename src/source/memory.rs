use super::{AttendanceEntry, AttendanceRecord, AttendanceSource, UserProfile};
use crate::error::SourceError;
use std::collections::HashMap;

/// In-memory attendance source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    users: HashMap<String, UserProfile>,
    records: Vec<AttendanceRecord>,
}

impl MemorySource {
    pub fn new(users: Vec<UserProfile>, records: Vec<AttendanceRecord>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.user_id.clone(), u)).collect(),
            records,
        }
    }

    fn join<'a>(
        &'a self,
        records: impl Iterator<Item = &'a AttendanceRecord>,
    ) -> Vec<AttendanceEntry> {
        records
            .filter_map(|r| {
                self.users.get(&r.user_id).map(|u| AttendanceEntry {
                    record: r.clone(),
                    user: u.clone(),
                })
            })
            .collect()
    }
}

impl AttendanceSource for MemorySource {
    fn entries_for_date(&self, date: &str) -> Result<Vec<AttendanceEntry>, SourceError> {
        Ok(self.join(self.records.iter().filter(|r| r.date == date)))
    }

    fn all_entries(&self) -> Result<Vec<AttendanceEntry>, SourceError> {
        Ok(self.join(self.records.iter()))
    }
}
