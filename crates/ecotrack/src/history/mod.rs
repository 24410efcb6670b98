//! Append-only per-user ledger of completed calculations.

mod memory;
mod sqlite;

pub use memory::MemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::emissions::EmissionCategory;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Hard cap on records returned by a single query.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Opaque identifier of the user a calculation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned identifier of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

/// One completed emission estimate. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub user_id: UserId,
    pub category: EmissionCategory,
    pub input_value: f64,
    pub co2_result: f64,
    #[serde(rename = "calculated_at")]
    pub created_at: DateTime<Utc>,
}

/// Storage abstraction for calculation history.
pub trait HistoryStore: Send + Sync {
    /// Persist a record as a single atomic insert, returning it with the
    /// store-assigned id and timestamp.
    fn append(&self, record: CalculationRecord) -> Result<CalculationRecord, StoreError>;

    /// Most recent records for a user, newest first, capped at
    /// [`MAX_HISTORY_LIMIT`].
    fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
    #[error("history store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("history store returned a malformed record: {0}")]
    Corrupt(String),
}

pub(crate) fn effective_limit(limit: usize) -> usize {
    limit.min(MAX_HISTORY_LIMIT)
}

/// Next insertion timestamp at microsecond precision, never earlier than the
/// previous one handed out by the same store.
pub(crate) fn next_timestamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    let assigned = match *last {
        Some(previous) if previous > now => previous,
        _ => now,
    };
    *last = Some(assigned);
    assigned
}
