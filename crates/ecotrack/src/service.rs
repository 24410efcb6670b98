use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::emissions::{
    check_bounds, validate_with, ConfigurationError, EmissionCalculator, EmissionCategory,
    Estimate, UserInputError, ValueBounds,
};
use crate::history::{
    effective_limit, CalculationRecord, HistoryStore, RecordId, StoreError, UserId,
    DEFAULT_HISTORY_LIMIT,
};

/// Service composing validation, calculation, and history persistence.
pub struct CalculatorService<S> {
    calculator: EmissionCalculator,
    store: Arc<S>,
    history_limit: usize,
}

/// Whether the computed estimate made it into the user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveStatus {
    Saved { id: RecordId },
    NotSaved { reason: String },
    /// No user was attached to the request.
    Skipped,
}

impl SaveStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOutcome {
    pub estimate: Estimate,
    pub saved: SaveStatus,
}

impl<S> CalculatorService<S>
where
    S: HistoryStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_calculator(EmissionCalculator::default(), store)
    }

    pub fn with_calculator(calculator: EmissionCalculator, store: Arc<S>) -> Self {
        Self {
            calculator,
            store,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Page size used by [`CalculatorService::history`] when none is given.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = effective_limit(limit.max(1));
        self
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Validate free text, compute the estimate, and try to save it.
    pub fn calculate_text(
        &self,
        user_id: Option<&UserId>,
        category: EmissionCategory,
        raw: &str,
    ) -> Result<CalculationOutcome, CalculatorServiceError> {
        let bounds = self.bounds_for(category)?;
        let value = validate_with(raw, bounds).into_result()?;
        self.compute_and_store(user_id, category, value)
    }

    /// Same as [`CalculatorService::calculate_text`] for input that arrived as
    /// a number.
    pub fn calculate_number(
        &self,
        user_id: Option<&UserId>,
        category: EmissionCategory,
        value: f64,
    ) -> Result<CalculationOutcome, CalculatorServiceError> {
        let bounds = self.bounds_for(category)?;
        let value = check_bounds(value, bounds).into_result()?;
        self.compute_and_store(user_id, category, value)
    }

    /// Most recent calculations for a user, newest first.
    pub fn history(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<CalculationRecord>, CalculatorServiceError> {
        let limit = limit.map_or(self.history_limit, effective_limit);
        self.store.list_recent(user_id, limit).map_err(|err| {
            error!(%user_id, error = %err, "history retrieval failed");
            CalculatorServiceError::Store(err)
        })
    }

    fn bounds_for(&self, category: EmissionCategory) -> Result<ValueBounds, ConfigurationError> {
        Ok(self.calculator.entry(category)?.bounds)
    }

    fn compute_and_store(
        &self,
        user_id: Option<&UserId>,
        category: EmissionCategory,
        value: f64,
    ) -> Result<CalculationOutcome, CalculatorServiceError> {
        let estimate = self.calculator.calculate(category, value)?;

        let saved = match user_id {
            Some(user_id) => self.persist(user_id, &estimate),
            None => SaveStatus::Skipped,
        };

        Ok(CalculationOutcome { estimate, saved })
    }

    // A failed write never fails the calculation itself.
    fn persist(&self, user_id: &UserId, estimate: &Estimate) -> SaveStatus {
        match self.store.append(estimate.record_for(user_id)) {
            Ok(CalculationRecord { id: Some(id), .. }) => {
                info!(%user_id, category = %estimate.category, "calculation saved to history");
                SaveStatus::Saved { id }
            }
            Ok(CalculationRecord { id: None, .. }) => {
                warn!(%user_id, "history store did not assign a record id");
                SaveStatus::NotSaved {
                    reason: "history store did not assign a record id".to_string(),
                }
            }
            Err(err) => {
                error!(%user_id, error = %err, "error saving calculation");
                SaveStatus::NotSaved {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Error raised by the calculator service.
#[derive(Debug, thiserror::Error)]
pub enum CalculatorServiceError {
    #[error(transparent)]
    Input(#[from] UserInputError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
