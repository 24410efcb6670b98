use super::common::*;
use std::sync::Arc;

use crate::emissions::{
    ConfigurationError, EmissionCalculator, EmissionCategory, EmissionFactorTable,
    RejectionReason, UserInputError,
};
use crate::history::{HistoryStore, UserId, MAX_HISTORY_LIMIT};
use crate::service::{CalculatorService, CalculatorServiceError, SaveStatus};

#[test]
fn submitting_five_hundred_kwh_lands_in_history() {
    let (service, store) = build_service();

    let outcome = service
        .calculate_text(Some(&user()), EmissionCategory::Electricity, "500")
        .expect("valid input");

    approx(outcome.estimate.co2_result, 185.0);
    assert!(outcome.saved.is_saved());

    let history = store.list_recent(&user(), 1).expect("history reads");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].input_value, 500.0);
    approx(history[0].co2_result, 185.0);
    assert_eq!(history[0].category, EmissionCategory::Electricity);
}

#[test]
fn rejected_input_is_not_calculated_or_saved() {
    let (service, store) = build_service();

    for (raw, reason) in [
        ("", RejectionReason::Empty),
        ("1,000", RejectionReason::InvalidNumber),
        ("0", RejectionReason::NotPositive),
        ("100000", RejectionReason::TooLarge { max: 99_999.0 }),
    ] {
        match service.calculate_text(Some(&user()), EmissionCategory::Electricity, raw) {
            Err(CalculatorServiceError::Input(UserInputError(actual))) => {
                assert_eq!(actual, reason, "input {raw:?}")
            }
            other => panic!("expected input error for {raw:?}, got {other:?}"),
        }
    }
    assert!(store.is_empty());
}

#[test]
fn store_failure_still_returns_the_estimate() {
    let service = CalculatorService::new(Arc::new(ReadOnlyStore));

    let outcome = service
        .calculate_text(Some(&user()), EmissionCategory::Electricity, "100")
        .expect("calculation succeeds despite store failure");

    approx(outcome.estimate.co2_result, 37.0);
    match outcome.saved {
        SaveStatus::NotSaved { reason } => assert!(reason.contains("disk full")),
        other => panic!("expected not saved, got {other:?}"),
    }
}

#[test]
fn anonymous_calculations_are_not_persisted() {
    let (service, store) = build_service();

    let outcome = service
        .calculate_number(None, EmissionCategory::Water, 1000.0)
        .expect("valid");

    approx(outcome.estimate.co2_result, 1.5);
    assert_eq!(outcome.saved, SaveStatus::Skipped);
    assert!(store.is_empty());
}

#[test]
fn per_category_bounds_apply_to_numbers_and_text() {
    let (service, _) = build_service();

    let trip = service
        .calculate_number(None, EmissionCategory::TransportBike, 0.0)
        .expect("zero distance is allowed");
    approx(trip.estimate.co2_result, 0.0);

    match service.calculate_number(None, EmissionCategory::TransportCar, 10_001.0) {
        Err(CalculatorServiceError::Input(err)) => {
            assert_eq!(err.to_string(), "Value cannot exceed 10,000.")
        }
        other => panic!("expected distance cap, got {other:?}"),
    }

    match service.calculate_text(None, EmissionCategory::Water, "0") {
        Err(CalculatorServiceError::Input(err)) => {
            assert_eq!(err.reason(), RejectionReason::NotPositive)
        }
        other => panic!("expected positive water volume, got {other:?}"),
    }

    // 100000 is over the electricity cap but inside the water one
    let water = service
        .calculate_text(None, EmissionCategory::Water, "100000")
        .expect("water cap is inclusive");
    approx(water.estimate.co2_result, 150.0);
}

#[test]
fn missing_factor_fails_before_validation() {
    let calculator = EmissionCalculator::new(EmissionFactorTable::empty());
    let service = CalculatorService::with_calculator(
        calculator,
        Arc::new(crate::history::MemoryHistoryStore::default()),
    );

    // even empty input reports the configuration problem first
    match service.calculate_text(Some(&user()), EmissionCategory::Electricity, "") {
        Err(CalculatorServiceError::Configuration(ConfigurationError::MissingFactor(
            EmissionCategory::Electricity,
        ))) => {}
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn history_uses_service_limit_and_cap() {
    let store = Arc::new(crate::history::MemoryHistoryStore::default());
    let service = CalculatorService::new(store.clone()).with_history_limit(3);
    assert_eq!(service.history_limit(), 3);

    for raw in ["1", "2", "3", "4", "5"] {
        service
            .calculate_text(Some(&user()), EmissionCategory::Electricity, raw)
            .expect("valid");
    }

    let page = service.history(&user(), None).expect("history");
    let values: Vec<f64> = page.iter().map(|r| r.input_value).collect();
    assert_eq!(values, vec![5.0, 4.0, 3.0]);

    let all = service.history(&user(), Some(1_000)).expect("history");
    assert_eq!(all.len(), 5);

    let capped = CalculatorService::new(store).with_history_limit(1_000);
    assert_eq!(capped.history_limit(), MAX_HISTORY_LIMIT);
}

#[test]
fn history_read_failures_propagate() {
    let service = CalculatorService::new(Arc::new(UnavailableStore));
    match service.history(&UserId::from("someone"), None) {
        Err(CalculatorServiceError::Store(_)) => {}
        other => panic!("expected store error, got {other:?}"),
    }
}

#[test]
fn observer_runs_once_per_successful_calculation() {
    let observer = Arc::new(CountingObserver::default());
    let service = observed_service(observer.clone());

    service
        .calculate_text(Some(&user()), EmissionCategory::Electricity, "10")
        .expect("valid");
    service
        .calculate_text(Some(&user()), EmissionCategory::Electricity, "abc")
        .expect_err("invalid");

    assert_eq!(observer.calls(), 1);
}

#[test]
fn timestamps_are_non_decreasing_per_user() {
    let (service, store) = build_service();
    for raw in ["1", "2", "3"] {
        service
            .calculate_text(Some(&user()), EmissionCategory::Electricity, raw)
            .expect("valid");
    }

    let history = store.list_recent(&user(), 10).expect("history");
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}
