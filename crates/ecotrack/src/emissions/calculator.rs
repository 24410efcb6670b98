use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::category::{
    ConfigurationError, ConsumptionUnit, EmissionCategory, EmissionFactorTable, FactorEntry,
};
use crate::history::{CalculationRecord, UserId};

pub const EMISSION_UNIT: &str = "kg CO2e";

/// Hook invoked after every successful computation.
pub trait CalculationObserver: Send + Sync {
    fn on_calculated(&self, estimate: &Estimate);
}

/// Pure result of applying a category factor to an accepted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub category: EmissionCategory,
    pub input_value: f64,
    /// kg CO2e, unrounded.
    pub co2_result: f64,
    pub unit: ConsumptionUnit,
    pub computed_at: DateTime<Utc>,
}

impl Estimate {
    /// Result rounded to two decimals for display.
    pub fn co2_rounded(&self) -> f64 {
        (self.co2_result * 100.0).round() / 100.0
    }

    /// Record to append to the user's history. The store assigns the id and
    /// the final timestamp.
    pub fn record_for(&self, user_id: &UserId) -> CalculationRecord {
        CalculationRecord {
            id: None,
            user_id: user_id.clone(),
            category: self.category,
            input_value: self.input_value,
            co2_result: self.co2_result,
            created_at: self.computed_at,
        }
    }
}

/// Stateless calculator over an emission factor table.
#[derive(Clone, Default)]
pub struct EmissionCalculator {
    table: Arc<EmissionFactorTable>,
    observer: Option<Arc<dyn CalculationObserver>>,
}

impl EmissionCalculator {
    pub fn new(table: EmissionFactorTable) -> Self {
        Self {
            table: Arc::new(table),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CalculationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Factor entry for a category, logging when the table has no entry.
    pub fn entry(&self, category: EmissionCategory) -> Result<&FactorEntry, ConfigurationError> {
        self.table.lookup(category).map_err(|err| {
            error!(%category, "emission factor table is missing a category");
            err
        })
    }

    /// Multiply an already-validated value by the category factor.
    pub fn calculate(
        &self,
        category: EmissionCategory,
        value: f64,
    ) -> Result<Estimate, ConfigurationError> {
        let entry = self.entry(category)?;
        let co2_result = value * entry.factor;
        debug!(%category, value, co2_result, "emission calculated");

        let estimate = Estimate {
            category,
            input_value: value,
            co2_result,
            unit: entry.unit,
            computed_at: Utc::now(),
        };

        if let Some(observer) = &self.observer {
            observer.on_calculated(&estimate);
        }

        Ok(estimate)
    }

    /// Twelve months of a monthly figure.
    pub fn annual_estimate(
        &self,
        category: EmissionCategory,
        monthly_value: f64,
    ) -> Result<f64, ConfigurationError> {
        Ok(self.calculate(category, monthly_value)?.co2_result * 12.0)
    }
}

impl std::fmt::Debug for EmissionCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionCalculator")
            .field("table", &self.table)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EmissionCategory>>,
    }

    impl CalculationObserver for Recorder {
        fn on_calculated(&self, estimate: &Estimate) {
            self.seen
                .lock()
                .expect("recorder mutex poisoned")
                .push(estimate.category);
        }
    }

    #[test]
    fn electricity_uses_point_three_seven() {
        let calculator = EmissionCalculator::default();
        approx(
            calculator
                .calculate(EmissionCategory::Electricity, 100.0)
                .expect("calculates")
                .co2_result,
            37.0,
        );
        approx(
            calculator
                .calculate(EmissionCategory::Electricity, 123.45)
                .expect("calculates")
                .co2_result,
            45.6765,
        );
        approx(
            calculator
                .calculate(EmissionCategory::Electricity, 500.0)
                .expect("calculates")
                .co2_result,
            185.0,
        );
    }

    #[test]
    fn category_factors_apply() {
        let calculator = EmissionCalculator::default();
        let cases = [
            (EmissionCategory::Water, 1000.0, 1.5),
            (EmissionCategory::TransportCar, 100.0, 21.0),
            (EmissionCategory::TransportBus, 100.0, 8.9),
            (EmissionCategory::TransportTrain, 100.0, 4.1),
            (EmissionCategory::TransportBike, 100.0, 0.0),
            (EmissionCategory::TransportElectricCar, 100.0, 5.0),
        ];
        for (category, value, expected) in cases {
            let estimate = calculator.calculate(category, value).expect("calculates");
            approx(estimate.co2_result, expected);
            assert_eq!(estimate.unit, category.unit());
        }
    }

    #[test]
    fn results_are_not_rounded_until_display() {
        let estimate = EmissionCalculator::default()
            .calculate(EmissionCategory::Electricity, 123.45)
            .expect("calculates");
        assert_ne!(estimate.co2_result, estimate.co2_rounded());
        approx(estimate.co2_rounded(), 45.68);
    }

    #[test]
    fn missing_factor_is_a_configuration_error() {
        let calculator = EmissionCalculator::new(EmissionFactorTable::empty());
        assert_eq!(
            calculator.calculate(EmissionCategory::Electricity, 10.0),
            Err(ConfigurationError::MissingFactor(
                EmissionCategory::Electricity
            ))
        );
    }

    #[test]
    fn observer_sees_successful_calculations_only() {
        let recorder = Arc::new(Recorder::default());
        let table = EmissionFactorTable::empty()
            .with_entry(
                EmissionCategory::Water,
                FactorEntry {
                    factor: 0.0015,
                    bounds: crate::emissions::ValueBounds::WATER,
                    unit: ConsumptionUnit::Liter,
                },
            )
            .expect("valid entry");
        let calculator = EmissionCalculator::new(table).with_observer(recorder.clone());

        calculator
            .calculate(EmissionCategory::Water, 10.0)
            .expect("calculates");
        assert!(calculator
            .calculate(EmissionCategory::Electricity, 10.0)
            .is_err());

        let seen = recorder.seen.lock().expect("recorder mutex poisoned");
        assert_eq!(seen.as_slice(), &[EmissionCategory::Water]);
    }

    #[test]
    fn annual_estimate_is_twelve_months() {
        let annual = EmissionCalculator::default()
            .annual_estimate(EmissionCategory::Electricity, 100.0)
            .expect("calculates");
        approx(annual, 444.0);
    }

    #[test]
    fn record_for_copies_estimate_fields() {
        let estimate = EmissionCalculator::default()
            .calculate(EmissionCategory::Electricity, 500.0)
            .expect("calculates");
        let record = estimate.record_for(&UserId::from("user-1"));
        assert_eq!(record.user_id, UserId::from("user-1"));
        assert_eq!(record.category, EmissionCategory::Electricity);
        assert_eq!(record.input_value, 500.0);
        assert_eq!(record.co2_result, estimate.co2_result);
        assert!(record.id.is_none());
    }
}
