//! Errors surfaced to HTTP callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::session::SessionBusy;
use crate::window::WindowClosed;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("missing 'instrument' query parameter")]
    MissingInstrument,

    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error(transparent)]
    SessionBusy(#[from] SessionBusy),

    #[error(transparent)]
    WindowClosed(#[from] WindowClosed),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl CollectorError {
    pub fn status(&self) -> StatusCode {
        match self {
            CollectorError::MissingInstrument | CollectorError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            CollectorError::SessionBusy(_) => StatusCode::CONFLICT,
            CollectorError::WindowClosed(_) | CollectorError::Serialize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CollectorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}
