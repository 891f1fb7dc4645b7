use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::guardrails::GuardrailError;
use crate::analysis::orchestrator::AnalysisError;
use crate::analysis::stage::Stage;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Stage failure in {stage}: {message}")]
    StageFailed { stage: Stage, message: String },

    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GuardrailError> for AppError {
    fn from(e: GuardrailError) -> Self {
        AppError::UnprocessableEntity(e.to_string())
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::InvalidInput(msg) => AppError::Validation(msg),
            AnalysisError::Stage(failure) => {
                tracing::error!(
                    "Analysis failed: {failure} (raw excerpt: {:?})",
                    failure.raw_excerpt
                );
                AppError::StageFailed {
                    stage: failure.stage,
                    message: failure.user_message(),
                }
            }
            cancelled @ AnalysisError::Cancelled { .. } => {
                AppError::Cancelled(cancelled.to_string())
            }
            AnalysisError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::StageFailed { stage, message } = &self {
            let body = Json(json!({
                "error": {
                    "code": "STAGE_FAILURE",
                    "stage": stage,
                    "message": message
                }
            }));
            return (StatusCode::BAD_GATEWAY, body).into_response();
        }

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Cancelled(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ANALYSIS_CANCELLED",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::StageFailed { .. } => unreachable!("handled above"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::guardrails::Document;
    use crate::analysis::schema::ValidationError;
    use crate::analysis::stage::{AttemptError, StageFailure};

    #[test]
    fn test_guardrail_rejection_is_unprocessable() {
        let err: AppError = GuardrailError::TooShort {
            document: Document::Resume,
            length: 10,
            minimum: 100,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_stage_failure_maps_to_bad_gateway_without_raw_output() {
        let failure = StageFailure {
            stage: Stage::Recommendation,
            call: "recommendations",
            attempts: 2,
            source: AttemptError::Validation(ValidationError::MalformedOutput {
                detail: "output is not valid JSON".to_string(),
                raw_excerpt: "SECRET MODEL OUTPUT".to_string(),
            }),
            raw_excerpt: Some("SECRET MODEL OUTPUT".to_string()),
        };
        let err: AppError = AnalysisError::Stage(failure).into();
        match &err {
            AppError::StageFailed { stage, message } => {
                assert_eq!(*stage, Stage::Recommendation);
                assert!(!message.contains("SECRET"));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_cancellation_maps_to_service_unavailable() {
        let err: AppError = AnalysisError::Cancelled {
            stage: Stage::GapAnalysis,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
