use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use campo_core::{FarmId, LotId};
use campo_infra::{FarmStore, MovementOutcome};
use campo_resolver::ClassifiedIntent;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:farm_id/resolve", post(resolve_intent))
        .route("/:farm_id/movements", post(record_movement))
        .route("/:farm_id/lots/:lot_id/stock", get(get_lot_stock))
}

fn parse_farm_id(raw: &str) -> Result<FarmId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid farm id"))
}

/// Validate a classifier payload; malformed JSON gets the same error body as a bad intent.
fn read_intent(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<ClassifiedIntent, axum::response::Response> {
    let Json(body) = body.map_err(|rejection| {
        errors::json_error(rejection.status(), "invalid_json", rejection.body_text())
    })?;
    ClassifiedIntent::try_from(body).map_err(|e| errors::service_error_to_response(e.into()))
}

/// Resolve the slots of a classifier payload without touching stock.
pub async fn resolve_intent(
    Extension(services): Extension<Arc<AppServices>>,
    Path(farm_id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    let farm_id = match parse_farm_id(&farm_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let intent = match read_intent(body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.slots.resolve(farm_id, &intent).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Resolve and, when every slot resolved, apply a stock movement.
pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(farm_id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    let farm_id = match parse_farm_id(&farm_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let intent = match read_intent(body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.movements.execute(farm_id, &intent, Utc::now()).await {
        Ok(outcome @ MovementOutcome::Applied { .. }) => {
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_lot_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((farm_id, lot_id)): Path<(String, String)>,
) -> axum::response::Response {
    let farm_id = match parse_farm_id(&farm_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let lot_id: LotId = match lot_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid lot id"),
    };

    let lot = match services.store.get_lot(farm_id, lot_id).await {
        Ok(lot) => lot,
        Err(e) => return errors::store_error_to_response(e),
    };
    let entries = match services.store.list_stock_by_lot(farm_id, lot_id).await {
        Ok(entries) => entries,
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(dto::LotStockResponse::new(lot, entries, Utc::now())).into_response()
}
