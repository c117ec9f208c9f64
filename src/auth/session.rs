// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token transport over HTTP headers.
//!
//! - Access token: `Authorization: Bearer <token>` on requests, and on
//!   responses after issuance or rotation.
//! - Refresh token: `HttpOnly` session cookie whose `Max-Age` is the refresh
//!   TTL; cleared with `Max-Age=0`.

use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

use super::error::AuthError;
use super::token::IssuedTokens;
use crate::config::AuthConfig;

/// Access token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Value of the named cookie, searching every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
        .filter(|value| !value.is_empty())
}

/// Refresh token from the configured session cookie.
pub fn refresh_token<'a>(headers: &'a HeaderMap, config: &AuthConfig) -> Option<&'a str> {
    cookie_value(headers, &config.cookie.name)
}

pub fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, AuthError> {
    let ttl_seconds = config.refresh_token_ttl.num_seconds();
    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}",
        config.cookie.name
    );
    if config.cookie.secure {
        cookie.push_str("; Secure");
    }
    header_value(&cookie)
}

pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie.name
    );
    if config.cookie.secure {
        cookie.push_str("; Secure");
    }
    header_value(&cookie)
}

/// Write a freshly issued pair into response headers.
pub fn write_issued_tokens(
    headers: &mut HeaderMap,
    config: &AuthConfig,
    tokens: &IssuedTokens,
) -> Result<(), AuthError> {
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", tokens.access_token))?,
    );
    headers.append(SET_COOKIE, session_cookie(config, &tokens.refresh_token)?);
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value)
        .map_err(|e| AuthError::Internal(format!("invalid header value: {e}")))
}
