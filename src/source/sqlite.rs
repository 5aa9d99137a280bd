//! SQLite-backed attendance source. Each call opens its own connection and drops it before
//! returning, so no handle outlives a query on any exit path.

use super::{AttendanceEntry, AttendanceRecord, AttendanceSource, UserProfile};
use crate::error::SourceError;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        employee_type TEXT NOT NULL,
        roles TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS attendances (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        date TEXT NOT NULL,
        check_in INTEGER,
        check_out INTEGER,
        status TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_attendances_user_date ON attendances(user_id, date);
    CREATE INDEX IF NOT EXISTS idx_attendances_date ON attendances(date);
"#;

const SELECT_JOINED: &str = "SELECT a.id, a.user_id, a.date, a.check_in, a.check_out, a.status, \
     u.full_name, u.employee_type, u.roles \
     FROM attendances a JOIN users u ON u.id = a.user_id";

/// Columns as stored, before timestamp and role decoding.
struct RawRow {
    id: String,
    user_id: String,
    date: String,
    check_in: Option<i64>,
    check_out: Option<i64>,
    status: String,
    full_name: String,
    employee_type: String,
    roles: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            check_in: row.get(3)?,
            check_out: row.get(4)?,
            status: row.get(5)?,
            full_name: row.get(6)?,
            employee_type: row.get(7)?,
            roles: row.get(8)?,
        })
    }

    fn decode(self) -> Result<AttendanceEntry, SourceError> {
        let roles: Vec<String> =
            serde_json::from_str(&self.roles).map_err(|e| SourceError::CorruptRow {
                id: self.id.clone(),
                reason: format!("roles: {e}"),
            })?;
        let check_in = decode_ts(&self.id, self.check_in)?;
        let check_out = decode_ts(&self.id, self.check_out)?;
        Ok(AttendanceEntry {
            record: AttendanceRecord {
                record_id: self.id,
                user_id: self.user_id.clone(),
                date: self.date,
                check_in,
                check_out,
                status: self.status,
            },
            user: UserProfile {
                user_id: self.user_id,
                full_name: self.full_name,
                employee_type: self.employee_type,
                roles,
            },
        })
    }
}

fn decode_ts(id: &str, ms: Option<i64>) -> Result<Option<DateTime<Utc>>, SourceError> {
    match ms {
        None => Ok(None),
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| SourceError::CorruptRow {
                id: id.to_string(),
                reason: format!("timestamp {ms} out of range"),
            }),
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a read-only connection that is closed when `f` returns.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SourceError::Connectivity {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(self.busy_timeout)?;
        f(&conn)
    }

    fn query(&self, sql: &str, date: Option<&str>) -> Result<Vec<AttendanceEntry>, SourceError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = match date {
                Some(d) => stmt
                    .query_map(params![d], RawRow::read)?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
                None => stmt
                    .query_map([], RawRow::read)?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
            };
            rows.into_iter().map(RawRow::decode).collect()
        })
    }

    /// Create the schema if needed and upsert `users` and `records` in one transaction.
    pub fn write_dataset(
        &self,
        users: &[UserProfile],
        records: &[AttendanceRecord],
    ) -> Result<(), SourceError> {
        let mut conn =
            Connection::open(&self.path).map_err(|source| SourceError::Connectivity {
                path: self.path.clone(),
                source,
            })?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;

        let tx = conn.transaction()?;
        {
            let mut insert_user = tx.prepare(
                "INSERT OR REPLACE INTO users (id, full_name, employee_type, roles) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for u in users {
                let roles = serde_json::to_string(&u.roles).map_err(|e| SourceError::CorruptRow {
                    id: u.user_id.clone(),
                    reason: e.to_string(),
                })?;
                insert_user.execute(params![u.user_id, u.full_name, u.employee_type, roles])?;
            }

            let mut insert_record = tx.prepare(
                "INSERT OR REPLACE INTO attendances (id, user_id, date, check_in, check_out, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in records {
                insert_record.execute(params![
                    r.record_id,
                    r.user_id,
                    r.date,
                    r.check_in.map(|t| t.timestamp_millis()),
                    r.check_out.map(|t| t.timestamp_millis()),
                    r.status,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl AttendanceSource for SqliteSource {
    fn entries_for_date(&self, date: &str) -> Result<Vec<AttendanceEntry>, SourceError> {
        let sql = format!("{SELECT_JOINED} WHERE a.date = ?1 ORDER BY a.user_id, a.id");
        self.query(&sql, Some(date))
    }

    fn all_entries(&self) -> Result<Vec<AttendanceEntry>, SourceError> {
        let sql = format!("{SELECT_JOINED} ORDER BY a.user_id, a.date, a.id");
        self.query(&sql, None)
    }
}
