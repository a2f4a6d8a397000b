//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    domain::{HistoryError, SearchIndexError, ValidationError},
    infrastructure::dto::http::ErrorResponse,
    usecase::{ErrorKind, GameError},
};

/// Status code for each error classification
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Search(#[from] SearchIndexError),

    #[error("Game '{0}' not found")]
    GameRecordNotFound(String),
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::Game(error.into())
    }
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Game(error) => error.kind(),
            Self::GameRecordNotFound(_) => ErrorKind::NotFound,
            Self::History(_) | Self::Search(_) => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        if kind == ErrorKind::Internal {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected ({}): {}", kind.as_str(), self);
        }

        let body = ErrorResponse {
            error: kind.as_str().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
