//! JSON response envelope shared by every API handler:
//! `{ "status": "success", "data": ... }` on success,
//! `{ "status": "error", "error": "...", "details"?: ... }` on failure.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use tradehub_core::errors::DomainError;
use tradehub_db::repositories::RepositoryError;

pub type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn success(data: impl Serialize) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

pub fn api_error(status_code: StatusCode, message: impl Into<String>) -> ApiError {
    (status_code, Json(ErrorBody { status: "error", error: message.into(), details: None }))
}

pub fn api_error_with_details(
    status_code: StatusCode,
    message: impl Into<String>,
    details: Value,
) -> ApiError {
    (
        status_code,
        Json(ErrorBody { status: "error", error: message.into(), details: Some(details) }),
    )
}

/// Map a domain guard failure: "already in state X" conflicts become 409,
/// every other rejected precondition is a 400.
pub fn domain_error(error: &DomainError) -> ApiError {
    let status_code =
        if error.is_conflict() { StatusCode::CONFLICT } else { StatusCode::BAD_REQUEST };
    api_error(status_code, error.to_string())
}

pub fn repo_error(error: RepositoryError) -> ApiError {
    error!(error = %error, "repository error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
}

pub fn db_error(error: sqlx::Error) -> ApiError {
    error!(error = %error, "database error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use tradehub_core::domain::escrow::{ConditionType, EscrowId};
    use tradehub_core::domain::transaction::TransactionStatus;
    use tradehub_core::errors::DomainError;

    use super::domain_error;

    #[test]
    fn conflicts_map_to_409() {
        let (status, body) = domain_error(&DomainError::ConditionAlreadySatisfied {
            condition: ConditionType::QualityApproved,
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.0.status, "error");

        let (status, _) =
            domain_error(&DomainError::EscrowAlreadyReleased { escrow: EscrowId("E".into()) });
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn rejected_preconditions_map_to_400() {
        let (status, body) = domain_error(&DomainError::InvalidTransactionTransition {
            from: TransactionStatus::Shipped,
            to: TransactionStatus::Completed,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("SHIPPED"));
    }
}
