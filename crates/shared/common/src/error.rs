//! Unified error handling.
//!
//! Provides a single error type for the pipeline services that can be
//! converted to Axum HTTP responses by the surrounding API layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    BadRequest(String),

    // Pipeline rules
    #[error("Not eligible for conversion: {0}")]
    NotEligible(String),

    #[error("No active pipeline type configured for {0}")]
    NoActivePipelineType(String),

    #[error("Pipeline type {0} has no stages")]
    NoStages(String),

    // External service errors
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotEligible(_) => "NOT_ELIGIBLE",
            AppError::NoActivePipelineType(_) => "NO_PIPELINE_CONFIGURED",
            AppError::NoStages(_) => "NO_STAGES",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoActivePipelineType(_) | AppError::NoStages(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected negative outcomes the caller presents as ordinary responses
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            // Show full message for client errors
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => {
                if msg.ends_with("already exists") {
                    msg.clone()
                } else {
                    format!("{} already exists", msg)
                }
            }

            // Hide details for internal errors
            #[cfg(feature = "database")]
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            // Use default message for others
            _ => self.to_string(),
        }
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::Validation(msg),
            DomainError::NotFound(_) => AppError::NotFound,
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::NotEligible(msg) => AppError::NotEligible(msg),
            DomainError::NoActivePipelineType(kind) => AppError::NoActivePipelineType(kind),
            DomainError::NoStages(name) => AppError::NoStages(name),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_eligible(reason: impl Into<String>) -> Self {
        AppError::NotEligible(reason.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_rule_errors_are_client_errors() {
        assert!(AppError::not_eligible("already converted").is_client_error());
        assert!(AppError::NoStages("standard".to_string()).is_client_error());
        assert!(!AppError::internal("boom").is_client_error());
    }

    #[test]
    fn conflict_message_is_not_duplicated() {
        assert_eq!(
            AppError::conflict("Pipeline progression").user_message(),
            "Pipeline progression already exists"
        );
        assert_eq!(
            AppError::conflict("Slug already exists").user_message(),
            "Slug already exists"
        );
    }

    #[test]
    fn domain_errors_map_onto_app_errors() {
        let err: AppError = DomainError::not_eligible("no final stage").into();
        assert_eq!(err.code(), "NOT_ELIGIBLE");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = DomainError::not_found("Invite").into();
        assert!(matches!(err, AppError::NotFound));
    }

    async fn response_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn responses_carry_code_and_message() {
        let (status, body) = response_json(AppError::NoStages("webinar".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "NO_STAGES");
        assert_eq!(body["error"]["message"], "Pipeline type webinar has no stages");

        let (status, body) = response_json(AppError::conflict("Stage")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "Stage already exists");
    }

    #[tokio::test]
    async fn internal_details_stay_out_of_responses() {
        let (status, body) = response_json(AppError::internal("pool exhausted")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
