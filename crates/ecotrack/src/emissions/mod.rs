//! Validation and emission-factor calculation for consumption figures.

pub mod calculator;
pub mod category;
pub mod validation;

pub use calculator::{CalculationObserver, EmissionCalculator, Estimate, EMISSION_UNIT};
pub use category::{
    ConfigurationError, ConsumptionUnit, EmissionCategory, EmissionFactorTable, FactorEntry,
    ValueBounds,
};
pub use validation::{
    check_bounds, validate, validate_with, RejectionReason, UserInputError, ValidationOutcome,
};
