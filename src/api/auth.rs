// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and logout endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::{session, AuthError};
use crate::error::ApiError;
use crate::models::{LoginRequest, MessageResponse, PreLoginRequest, UserProfile};
use crate::state::AppState;

/// Request a login code by email.
#[utoipa::path(
    post,
    path = "/auth/pre-login",
    tag = "Auth",
    request_body = PreLoginRequest,
    responses(
        (status = 200, description = "Login code sent", body = MessageResponse),
        (status = 400, description = "Malformed body or already signed in"),
        (status = 404, description = "No account for this email"),
        (status = 503, description = "Email could not be sent"),
    )
)]
pub async fn pre_login(
    State(state): State<AppState>,
    payload: Result<Json<PreLoginRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    state.issuer.pre_login(&request.email)?;
    Ok(Json(MessageResponse::new("Login code sent")))
}

/// Exchange a login code for an access token and session cookie.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; tokens in Authorization and Set-Cookie", body = UserProfile),
        (status = 400, description = "Malformed body or already signed in"),
        (status = 401, description = "Login code expired"),
        (status = 404, description = "Unknown email or login code"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let outcome = state.issuer.login(&request.email, request.code)?;

    let mut headers = HeaderMap::new();
    session::write_issued_tokens(&mut headers, state.tokens.config(), &outcome.tokens)?;
    Ok((StatusCode::OK, headers, Json(outcome.profile)).into_response())
}

/// Revoke the session and clear its cookie.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 400, description = "No session cookie"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let config = state.tokens.config();
    let refresh_token =
        session::refresh_token(&headers, config).ok_or(AuthError::MissingSession)?;
    state.issuer.logout(refresh_token)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, session::clear_session_cookie(config)?);
    Ok((
        StatusCode::OK,
        response_headers,
        Json(MessageResponse::new("Signed out")),
    )
        .into_response())
}
