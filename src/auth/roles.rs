// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of capability labels.
///
/// ## Roles
///
/// - `User` - Registered directory user, may only touch their own record
/// - `Admin` - Manages cities and their own admin profile
/// - `SuperAdmin` - Manages admins, may transfer the super-admin role
///
/// There is no implicit hierarchy: the gate checks set intersection, so a
/// route open to both admins and super-admins lists both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Registered directory user
    User,
    /// Administrator
    Admin,
    /// Super administrator
    SuperAdmin,
}

impl Role {
    /// Parse role from its label (case-insensitive).
    pub fn from_label(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super-admin" | "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Wire label used in tokens and JSON bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role membership of a single user.
pub type RoleSet = BTreeSet<Role>;

/// True when the two role sets share at least one role (OR semantics).
pub fn intersects(held: &RoleSet, required: &[Role]) -> bool {
    required.iter().any(|role| held.contains(role))
}
