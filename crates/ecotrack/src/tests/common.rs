use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::emissions::{CalculationObserver, EmissionCalculator, Estimate};
use crate::history::{CalculationRecord, HistoryStore, MemoryHistoryStore, StoreError, UserId};
use crate::router::calculator_router;
use crate::service::CalculatorService;

pub(super) fn user() -> UserId {
    UserId::from("user-42")
}

pub(super) fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) fn build_service() -> (
    Arc<CalculatorService<MemoryHistoryStore>>,
    Arc<MemoryHistoryStore>,
) {
    let store = Arc::new(MemoryHistoryStore::default());
    let service = Arc::new(CalculatorService::new(store.clone()));
    (service, store)
}

pub(super) fn router_with_memory_store() -> (axum::Router, Arc<MemoryHistoryStore>) {
    let (service, store) = build_service();
    (calculator_router(service), store)
}

/// Store whose writes always fail but whose reads succeed.
pub(super) struct ReadOnlyStore;

impl HistoryStore for ReadOnlyStore {
    fn append(&self, _record: CalculationRecord) -> Result<CalculationRecord, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn list_recent(
        &self,
        _user_id: &UserId,
        _limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableStore;

impl HistoryStore for UnavailableStore {
    fn append(&self, _record: CalculationRecord) -> Result<CalculationRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_recent(
        &self,
        _user_id: &UserId,
        _limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct CountingObserver {
    calls: AtomicUsize,
}

impl CountingObserver {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CalculationObserver for CountingObserver {
    fn on_calculated(&self, _estimate: &Estimate) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub(super) fn observed_service(
    observer: Arc<CountingObserver>,
) -> CalculatorService<MemoryHistoryStore> {
    let calculator = EmissionCalculator::default().with_observer(observer);
    CalculatorService::with_calculator(calculator, Arc::new(MemoryHistoryStore::default()))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
