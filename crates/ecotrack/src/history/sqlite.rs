use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::{
    effective_limit, next_timestamp, CalculationRecord, HistoryStore, RecordId, StoreError,
    UserId,
};
use crate::emissions::EmissionCategory;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calculations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    category TEXT NOT NULL,
    input_value REAL NOT NULL,
    co2_result REAL NOT NULL,
    calculated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_calculations_user_time
    ON calculations (user_id, calculated_at);
";

struct Connected {
    conn: Connection,
    last_assigned: Option<DateTime<Utc>>,
}

/// SQLite-backed history. One connection guarded by a mutex.
pub struct SqliteHistoryStore {
    state: Mutex<Connected>,
}

impl SqliteHistoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening calculation history database");
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;

        let latest: Option<String> =
            conn.query_row("SELECT MAX(calculated_at) FROM calculations", [], |row| {
                row.get(0)
            })?;
        let last_assigned = latest.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self {
            state: Mutex::new(Connected {
                conn,
                last_assigned,
            }),
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, mut record: CalculationRecord) -> Result<CalculationRecord, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;

        let calculated_at = next_timestamp(&mut state.last_assigned);
        state.conn.execute(
            "INSERT INTO calculations (user_id, category, input_value, co2_result, calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id.0,
                record.category.as_str(),
                record.input_value,
                record.co2_result,
                format_timestamp(calculated_at),
            ],
        )?;

        record.id = Some(RecordId(state.conn.last_insert_rowid()));
        record.created_at = calculated_at;
        debug!(user_id = %record.user_id, id = ?record.id, "calculation persisted");
        Ok(record)
    }

    fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;

        let mut stmt = state.conn.prepare(
            "SELECT id, category, input_value, co2_result, calculated_at
             FROM calculations
             WHERE user_id = ?1
             ORDER BY calculated_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows: Vec<StoredRow> = stmt
            .query_map(params![user_id.0, effective_limit(limit) as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| decode_row(user_id, row))
            .collect()
    }
}

type StoredRow = (i64, String, f64, f64, String);

fn decode_row(user_id: &UserId, row: StoredRow) -> Result<CalculationRecord, StoreError> {
    let (id, category, input_value, co2_result, calculated_at) = row;
    let category = category
        .parse::<EmissionCategory>()
        .map_err(|err| StoreError::Corrupt(err.to_string()))?;

    Ok(CalculationRecord {
        id: Some(RecordId(id)),
        user_id: user_id.clone(),
        category,
        input_value,
        co2_result,
        created_at: parse_timestamp(&calculated_at)?,
    })
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("bad calculated_at '{raw}': {err}")))
}
