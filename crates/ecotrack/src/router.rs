use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::emissions::{EmissionCategory, RejectionReason, EMISSION_UNIT};
use crate::error::AppError;
use crate::history::{CalculationRecord, HistoryStore, UserId};
use crate::service::{CalculationOutcome, CalculatorService, CalculatorServiceError};

pub const SAVED_MESSAGE: &str = "Calculation saved to your history!";
pub const NOT_SAVED_MESSAGE: &str = "Calculation completed but could not be saved to history.";

/// Router builder exposing the calculator form, JSON API, and history listing.
pub fn calculator_router<S>(service: Arc<CalculatorService<S>>) -> Router
where
    S: HistoryStore + 'static,
{
    Router::new()
        .route("/api/calculate", post(api_calculate_handler::<S>))
        .route(
            "/api/v1/users/:user_id/calculator",
            post(form_calculate_handler::<S>),
        )
        .route("/api/v1/users/:user_id/history", get(history_handler::<S>))
        .with_state(service)
}

/// Fields posted by the calculator form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalculatorForm {
    #[serde(default)]
    pub kwh: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Body accepted by `POST /api/calculate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCalculateRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResponse {
    pub success: bool,
    pub category: EmissionCategory,
    pub input_value: f64,
    pub co2_emission: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CalculationResponse {
    fn from_outcome(outcome: &CalculationOutcome, with_save_status: bool) -> Self {
        let saved = outcome.saved.is_saved();
        let message = if saved { SAVED_MESSAGE } else { NOT_SAVED_MESSAGE };
        Self {
            success: true,
            category: outcome.estimate.category,
            input_value: outcome.estimate.input_value,
            co2_emission: outcome.estimate.co2_rounded(),
            unit: EMISSION_UNIT.to_string(),
            saved: with_save_status.then_some(saved),
            message: with_save_status.then(|| message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: UserId,
    pub records: Vec<CalculationRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "success": false,
        "error": message.into(),
    });
    (status, Json(payload)).into_response()
}

fn invalid_category(raw: &str) -> Response {
    error!(category = %raw, "calculation requested for unknown category");
    failure(StatusCode::BAD_REQUEST, "Invalid category")
}

fn invalid_number() -> Response {
    failure(
        StatusCode::BAD_REQUEST,
        RejectionReason::InvalidNumber.to_string(),
    )
}

fn form_failure(err: CalculatorServiceError) -> Response {
    match err {
        CalculatorServiceError::Input(input) => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, input.to_string())
        }
        other => AppError::from(other).into_response(),
    }
}

pub(crate) async fn form_calculate_handler<S>(
    State(service): State<Arc<CalculatorService<S>>>,
    Path(user_id): Path<String>,
    Form(form): Form<CalculatorForm>,
) -> Response
where
    S: HistoryStore + 'static,
{
    let user_id = UserId(user_id);
    let raw_category = form.category.as_deref().unwrap_or("electricity");
    let category = match EmissionCategory::resolve(raw_category, None) {
        Ok(category) => category,
        Err(_) => return invalid_category(raw_category),
    };

    match service.calculate_text(Some(&user_id), category, &form.kwh) {
        Ok(outcome) => {
            let body = CalculationResponse::from_outcome(&outcome, true);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => form_failure(err),
    }
}

pub(crate) async fn api_calculate_handler<S>(
    State(service): State<Arc<CalculatorService<S>>>,
    payload: Result<Json<ApiCalculateRequest>, JsonRejection>,
) -> Response
where
    S: HistoryStore + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let Some(value) = request.value else {
        return failure(StatusCode::BAD_REQUEST, "Value is required");
    };

    let raw_category = request.category.as_deref().unwrap_or("electricity");
    let category = match EmissionCategory::resolve(raw_category, request.vehicle_type.as_deref())
    {
        Ok(category) => category,
        Err(_) => return invalid_category(raw_category),
    };

    let user_id = request.user_id.as_ref();
    let result = match &value {
        Value::Number(number) => match number.as_f64() {
            Some(number) => service.calculate_number(user_id, category, number),
            None => return invalid_number(),
        },
        Value::String(raw) => service.calculate_text(user_id, category, raw),
        Value::Null => return failure(StatusCode::BAD_REQUEST, "Value is required"),
        _ => return invalid_number(),
    };

    match result {
        Ok(outcome) => {
            let body = CalculationResponse::from_outcome(&outcome, user_id.is_some());
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

pub(crate) async fn history_handler<S>(
    State(service): State<Arc<CalculatorService<S>>>,
    Path(user_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Response
where
    S: HistoryStore + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let user_id = UserId(user_id);
    match service.history(&user_id, query.limit) {
        Ok(records) => {
            let body = HistoryResponse { user_id, records };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(_) => {
            let payload = json!({ "error": "Error loading history." });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
