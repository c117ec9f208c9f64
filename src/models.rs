// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the authentication endpoints, plus the
//! [`User`] entity read from the user directory. All wire types derive
//! `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Users**: directory entity and the public profile projection
//! - **Login flow**: pre-login and login request bodies
//! - **Responses**: simple acknowledgement messages

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Role, RoleSet};

// =============================================================================
// Users
// =============================================================================

/// A registered account as seen by the user directory.
///
/// Owned by the CRUD layer; the auth core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Display name used in emails and profiles
    pub name: String,
    #[serde(default)]
    pub roles: RoleSet,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            roles: self.roles.iter().copied().collect(),
        }
    }
}

/// Public projection of a user returned after login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub roles: Vec<Role>,
}

/// Normalize an email for lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Login Flow
// =============================================================================

/// Body of `POST /auth/pre-login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PreLoginRequest {
    pub email: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    /// Numeric one-time code from the email
    pub code: u32,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
