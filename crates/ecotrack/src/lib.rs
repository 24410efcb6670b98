//! Carbon footprint calculator: validates consumption figures, converts them
//! to kg CO2e with fixed emission factors, and keeps a per-user history.

pub mod config;
pub mod emissions;
pub mod error;
pub mod history;
pub mod router;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use emissions::{
    validate, EmissionCalculator, EmissionCategory, EmissionFactorTable, Estimate,
    ValidationOutcome,
};
pub use history::{
    CalculationRecord, HistoryStore, MemoryHistoryStore, SqliteHistoryStore, UserId,
};
pub use router::calculator_router;
pub use service::{CalculationOutcome, CalculatorService, CalculatorServiceError, SaveStatus};
