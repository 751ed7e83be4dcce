// Handler errors and their HTTP mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::engine::EngineError;
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("ingest writer is not accepting samples")]
    Unavailable,
    /// The client went away mid-query; nobody reads the response.
    #[error("aggregation cancelled")]
    Cancelled,
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cancelled | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Engine(EngineError::Cancelled) => ApiError::Cancelled,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Cancelled => tracing::debug!("query cancelled by client disconnect"),
            _ if status.is_server_error() => {
                tracing::warn!(error = %self, status = status.as_u16(), "request failed")
            }
            _ => {}
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_pipeline_is_not_an_internal_error() {
        let err = ApiError::from(PipelineError::Engine(EngineError::Cancelled));
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn source_failure_is_internal() {
        let err = ApiError::from(PipelineError::Source(anyhow::anyhow!("disk gone")));
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response = ApiError::BadRequest("bad groupBy".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
