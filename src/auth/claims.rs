// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-token claims and authenticated user representation.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::roles::{Role, RoleSet};

/// Claims carried by a signed access token.
///
/// Access tokens are never stored; everything the gate needs is in here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: Uuid,

    /// Role labels at issuance time
    pub roles: Vec<Role>,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(
        user_id: Uuid,
        roles: &RoleSet,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: user_id,
            roles: roles.iter().copied().collect(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// True once `now` is strictly past `exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// Authenticated user information extracted from an access token.
///
/// This is the type handlers receive through the `Auth` extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// User ID (`sub` claim)
    pub user_id: Uuid,

    /// Roles embedded in the token
    #[schema(value_type = Vec<Role>)]
    pub roles: RoleSet,

    /// Token expiration (not serialized)
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.into_iter().collect(),
            expires_at: Utc.timestamp_opt(claims.exp, 0).single(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
