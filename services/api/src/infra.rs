use ecotrack::config::{DatabaseLocation, StorageConfig};
use ecotrack::emissions::{CalculationObserver, EmissionCalculator, Estimate};
use ecotrack::history::{
    CalculationRecord, HistoryStore, MemoryHistoryStore, SqliteHistoryStore, StoreError, UserId,
};
use ecotrack::service::CalculatorService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// History store chosen at startup from `ECOTRACK_DATABASE`.
pub(crate) enum HistoryBackend {
    Memory(MemoryHistoryStore),
    Sqlite(SqliteHistoryStore),
}

impl HistoryBackend {
    pub(crate) fn open(location: &DatabaseLocation) -> Result<Self, StoreError> {
        match location {
            DatabaseLocation::InMemory => Ok(Self::Memory(MemoryHistoryStore::default())),
            DatabaseLocation::File(path) => SqliteHistoryStore::open(path).map(Self::Sqlite),
        }
    }
}

impl HistoryStore for HistoryBackend {
    fn append(&self, record: CalculationRecord) -> Result<CalculationRecord, StoreError> {
        match self {
            HistoryBackend::Memory(store) => store.append(record),
            HistoryBackend::Sqlite(store) => store.append(record),
        }
    }

    fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<CalculationRecord>, StoreError> {
        match self {
            HistoryBackend::Memory(store) => store.list_recent(user_id, limit),
            HistoryBackend::Sqlite(store) => store.list_recent(user_id, limit),
        }
    }
}

/// Writes one structured log line per completed calculation.
#[derive(Default)]
pub(crate) struct LoggingObserver;

impl CalculationObserver for LoggingObserver {
    fn on_calculated(&self, estimate: &Estimate) {
        info!(
            category = %estimate.category,
            input_value = estimate.input_value,
            co2_result = estimate.co2_result,
            "emission estimate computed"
        );
    }
}

pub(crate) fn build_service(
    storage: &StorageConfig,
) -> Result<CalculatorService<HistoryBackend>, StoreError> {
    let store = Arc::new(HistoryBackend::open(&storage.database)?);
    let calculator = EmissionCalculator::default().with_observer(Arc::new(LoggingObserver));
    Ok(CalculatorService::with_calculator(calculator, store)
        .with_history_limit(storage.history_limit))
}
