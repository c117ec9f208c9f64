// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{Auth, AuthError};
use crate::error::ApiError;
use crate::models::UserProfile;
use crate::state::AppState;

/// Get a user's profile.
///
/// The authorization gate only lets a caller read their own profile.
#[utoipa::path(
    get,
    path = "/user/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Unauthorized - invalid or missing session"),
        (status = 403, description = "Forbidden - not the caller's own profile"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    debug!(caller = %caller.user_id, user_id = %id, "profile read");
    let user = state
        .users
        .find_user_by_id(id)
        .map_err(AuthError::from)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.profile()))
}
