//! Application error type mapping to HTTP status codes and envelope format.

use std::time::Instant;

use axum::response::{IntoResponse, Response};

use turnstile_types::error::{SessionError, TurnError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    Turn(TurnError),
    Validation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        AppError::Turn(e)
    }
}

impl AppError {
    /// Envelope error code and message.
    pub fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Session(e @ SessionError::Busy(_)) => ("SESSION_BUSY", e.to_string()),
            AppError::Turn(e @ TurnError::Overloaded { .. }) => ("OVERLOADED", e.to_string()),
            AppError::Turn(e) => ("ENGINE_ERROR", e.to_string()),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = self.code_and_message();
        ApiResponse::error(code, &message, Instant::now()).into_response()
    }
}
