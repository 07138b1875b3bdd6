use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::compile::{CompilationFailure, FailureKind};
use crate::letter::pipeline::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Compilation failed: {0}")]
    Compilation(CompilationFailure),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::BodyUnavailable => AppError::Validation(err.to_string()),
            PipelineError::Generation(e) => AppError::Llm(e.to_string()),
            PipelineError::Compilation(failure) => AppError::Compilation(failure),
            resource @ PipelineError::Resource { .. } => AppError::Internal(resource.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, failure_detail) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::Compilation(failure) => {
                let (status, code) = match failure.kind {
                    FailureKind::TimedOut => (StatusCode::GATEWAY_TIMEOUT, "COMPILATION_TIMEOUT"),
                    FailureKind::ArtifactMissing | FailureKind::CompilerUnavailable => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "COMPILATION_FAILED")
                    }
                };
                (
                    status,
                    code,
                    failure.message.clone(),
                    Some((failure.kind, failure.diagnostic_excerpt.clone())),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The writing assistant is unavailable; try again or supply the body text"
                        .to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some((kind, excerpt)) = failure_detail {
            error["kind"] = json!(kind);
            error["diagnostic_excerpt"] = json!(excerpt);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn failure(kind: FailureKind) -> CompilationFailure {
        CompilationFailure {
            kind,
            message: "compiler did not produce a PDF".to_string(),
            diagnostic_excerpt: "! Undefined control sequence.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_compilation_failure_carries_excerpt() {
        let response = AppError::Compilation(failure(FailureKind::ArtifactMissing)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "COMPILATION_FAILED");
        assert_eq!(body["error"]["message"], "compiler did not produce a PDF");
        assert_eq!(body["error"]["diagnostic_excerpt"], "! Undefined control sequence.");
        assert_eq!(body["error"]["kind"], "artifact_missing");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_gateway_timeout() {
        let response = AppError::Compilation(failure(FailureKind::TimedOut)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["error"]["code"], "COMPILATION_TIMEOUT");
    }

    #[tokio::test]
    async fn test_validation_error_has_no_excerpt() {
        let response = AppError::from(PipelineError::BodyUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"].get("diagnostic_excerpt").is_none());
    }

    #[tokio::test]
    async fn test_resource_error_is_opaque_internal_error() {
        let err = PipelineError::Resource {
            context: "write document source",
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal server error occurred");
    }
}
