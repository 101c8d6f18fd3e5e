use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campo_core::DomainError;
use campo_infra::{ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Intent(e) => json_error(StatusCode::BAD_REQUEST, "invalid_intent", e.to_string()),
        ServiceError::Store(e) => store_error_to_response(e),
        ServiceError::Domain(e) => domain_error_to_response(e),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::LotNotFound(_) => json_error(StatusCode::NOT_FOUND, "lot_not_found", err.to_string()),
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Conflict(msg) => retryable_conflict(msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "storage backend failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage backend failure")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", err.to_string())
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

/// 409 the bot layer may retry as-is.
fn retryable_conflict(message: String) -> axum::response::Response {
    (
        StatusCode::CONFLICT,
        axum::Json(json!({
            "error": "conflict",
            "message": message,
            "retryable": true,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn status_and_body(res: axum::response::Response) -> (StatusCode, serde_json::Value) {
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflicts_are_flagged_retryable() {
        let res = store_error_to_response(StoreError::Conflict("40001".into()));
        let (status, body) = status_and_body(res).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn backend_details_are_not_leaked() {
        let res = store_error_to_response(StoreError::Backend("password=hunter2".into()));
        let (status, body) = status_and_body(res).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "storage backend failure");
    }

    #[tokio::test]
    async fn negative_stock_is_unprocessable() {
        let err = ServiceError::Domain(DomainError::insufficient_stock("Norte", "Vacas", 2, -5));
        let (status, body) = status_and_body(service_error_to_response(err)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "insufficient_stock");
    }
}
