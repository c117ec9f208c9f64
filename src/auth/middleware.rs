// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization middleware for Axum.
//!
//! Runs the [`Gate`](super::Gate) for every request before routing. On allow,
//! the authenticated user is placed in request extensions (read by the
//! [`Auth`](super::Auth) extractor). A rotated token pair is written to the
//! response whether the request was allowed or denied.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/user/{id}", get(get_user))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), authorization_gate))
//!     .with_state(state);
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::gate::Decision;
use super::session;
use super::token::IssuedTokens;
use crate::config::AuthConfig;
use crate::state::AppState;

/// Authorization middleware function.
pub async fn authorization_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.tokens.config();
    let decision = {
        let headers = request.headers();
        state.gate.evaluate(
            request.method(),
            request.uri().path(),
            session::bearer_token(headers),
            session::refresh_token(headers, config),
        )
    };

    let (user, rotated) = match decision {
        Ok(Decision::Unguarded) => return next.run(request).await,
        Ok(Decision::Allow { user, rotated }) => (user, rotated),
        Ok(Decision::Deny { error, rotated }) => {
            return with_rotated(error.into_response(), config, rotated)
        }
        Err(e) => return e.into_response(),
    };

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }

    let response = next.run(request).await;
    with_rotated(response, config, rotated)
}

/// Attach a rotated token pair, if any, to an outgoing response.
fn with_rotated(
    mut response: Response,
    config: &AuthConfig,
    rotated: Option<IssuedTokens>,
) -> Response {
    if let Some(tokens) = rotated {
        if let Err(e) = session::write_issued_tokens(response.headers_mut(), config, &tokens) {
            error!(error = %e, "failed to attach rotated tokens");
            return e.into_response();
        }
    }
    response
}
