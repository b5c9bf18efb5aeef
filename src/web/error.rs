//! Error responses for the web sample.

use crate::error::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::{error, warn};

/// A failed request, rendered as a plain-text body.
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {} {}", self.status.as_u16(), self.message);
        } else {
            warn!("Request rejected: {} {}", self.status.as_u16(), self.message);
        }
        (self.status, format!("{}\n", self.message)).into_response()
    }
}

impl From<AuthError> for WebError {
    fn from(value: AuthError) -> Self {
        let status = match &value {
            AuthError::MissingAuthCode | AuthError::StateValidationFailed => {
                StatusCode::BAD_REQUEST
            }
            AuthError::NoTokenFound
            | AuthError::InteractionRequired(_)
            | AuthError::OAuthFailed(_)
            | AuthError::TokenRejected { .. }
            | AuthError::AccessDenied => StatusCode::UNAUTHORIZED,
            AuthError::Network(_) | AuthError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, value.to_string())
    }
}
