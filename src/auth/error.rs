// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::mail::MailError;
use crate::storage::StoreError;

/// Authentication error type.
///
/// Store and crypto failures are translated into these variants at the token
/// service boundary; nothing above it sees a raw redb or JWT error.
#[derive(Debug)]
pub enum AuthError {
    /// User, login code, or refresh token row is absent
    NotFound(&'static str),
    /// Login code or token is past its TTL
    Expired,
    /// Access token is malformed or its signature does not verify
    InvalidFormat,
    /// Any failure of the authentication step
    Unauthenticated,
    /// Role or ownership check failed
    Forbidden,
    /// No rule of a known route group matches the method and path
    MethodNotAllowed,
    /// Anonymous-only route called with a live session
    AlreadyAuthenticated,
    /// Request carries no session cookie where one is required
    MissingSession,
    /// Email dispatcher rejected the message (transient). The detail is
    /// logged, never returned to the client.
    MailDelivery(String),
    /// Internal error (store or signing failure)
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) => "not_found",
            AuthError::Expired => "expired",
            AuthError::InvalidFormat => "invalid_format",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::MethodNotAllowed => "method_not_allowed",
            AuthError::AlreadyAuthenticated => "already_authenticated",
            AuthError::MissingSession => "missing_session",
            AuthError::MailDelivery(_) => "mail_delivery_failed",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Expired | AuthError::InvalidFormat | AuthError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AuthError::AlreadyAuthenticated | AuthError::MissingSession => StatusCode::BAD_REQUEST,
            AuthError::MailDelivery(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotFound(what) => write!(f, "{what} not found"),
            AuthError::Expired => write!(f, "Credential has expired"),
            AuthError::InvalidFormat => write!(f, "Token is malformed or has an invalid signature"),
            AuthError::Unauthenticated => write!(f, "Authentication required"),
            AuthError::Forbidden => write!(f, "Insufficient permissions for this operation"),
            AuthError::MethodNotAllowed => write!(f, "Method not allowed for this route"),
            AuthError::AlreadyAuthenticated => write!(f, "Already signed in"),
            AuthError::MissingSession => write!(f, "Session cookie is required"),
            AuthError::MailDelivery(_) => write!(f, "Failed to send email, try again later"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "credential store failure");
        AuthError::Internal("storage unavailable".to_string())
    }
}

impl From<MailError> for AuthError {
    fn from(err: MailError) -> Self {
        tracing::error!(error = %err, "login code email failed");
        AuthError::MailDelivery(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let error = match &self {
            AuthError::Internal(_) => "Internal authentication error".to_string(),
            other => other.to_string(),
        };
        let body = Json(AuthErrorBody {
            error,
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
