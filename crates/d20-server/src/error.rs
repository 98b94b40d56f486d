//! Server error types.
//!
//! [`ServerError`] covers startup and the accept loop. [`ApiError`] is what a
//! single request can fail with, and maps to an HTTP status. Details of
//! authentication and internal failures stay in the server log; clients only
//! see a generic message.

use axum::{
    Json,
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use d20_core::{DiceError, EntropyError, SessionError};
use serde::Serialize;

use crate::{auth::cleared_session_cookie, config::ConfigError};

/// Errors that can stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The session key could not be generated
    #[error("failed to generate session key: {0}")]
    Entropy(#[from] EntropyError),
}

/// Errors a request handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Input could not be parsed or is out of range.
    #[error("{0}")]
    BadRequest(String),

    /// No session cookie.
    #[error("not authenticated")]
    Unauthorized,

    /// A session cookie was sent but failed verification. The response
    /// clears it.
    #[error("not authenticated")]
    InvalidSession,

    /// Valid session, insufficient role.
    #[error("facilitator only")]
    Forbidden,

    /// Join attempt with the wrong party key.
    #[error("wrong party key")]
    WrongPartyKey,

    /// Server-side failure; the detail is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidSession => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::WrongPartyKey => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::BadRequest(reason) => reason.as_str(),
            Self::Unauthorized | Self::InvalidSession => "not authenticated",
            Self::Forbidden => "facilitator only",
            Self::WrongPartyKey => "wrong party key",
            Self::Internal(detail) => {
                tracing::error!("request failed: {}", detail);
                "internal error"
            },
        };
        let body = Json(ErrorBody { error: message });
        if matches!(self, Self::InvalidSession) {
            let mut removal = cleared_session_cookie();
            removal.make_removal();
            return (self.status(), [(SET_COOKIE, removal.to_string())], body).into_response();
        }
        (self.status(), body).into_response()
    }
}

impl From<DiceError> for ApiError {
    fn from(err: DiceError) -> Self {
        if err.is_caller_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Internal(err.to_string())
    }
}
