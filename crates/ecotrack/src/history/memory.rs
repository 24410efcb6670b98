use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::{
    effective_limit, next_timestamp, CalculationRecord, HistoryStore, RecordId, StoreError,
    UserId,
};

#[derive(Default)]
struct Ledger {
    records: Vec<CalculationRecord>,
    last_assigned: Option<DateTime<Utc>>,
}

/// Process-local history, used when no database is configured and in tests.
#[derive(Default, Clone)]
pub struct MemoryHistoryStore {
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryHistoryStore {
    /// Number of stored records. Still counts after a panic poisoned the
    /// lock, since an append either pushed its record or did not.
    pub fn len(&self) -> usize {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, mut record: CalculationRecord) -> Result<CalculationRecord, StoreError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| StoreError::Unavailable("history mutex poisoned".to_string()))?;

        record.id = Some(RecordId(ledger.records.len() as i64 + 1));
        record.created_at = next_timestamp(&mut ledger.last_assigned);
        ledger.records.push(record.clone());
        Ok(record)
    }

    fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| StoreError::Unavailable("history mutex poisoned".to_string()))?;

        Ok(ledger
            .records
            .iter()
            .rev()
            .filter(|record| &record.user_id == user_id)
            .take(effective_limit(limit))
            .cloned()
            .collect())
    }
}
