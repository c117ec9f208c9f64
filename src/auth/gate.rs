// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization gate: the single interpreter for [`RouteTable`].
//!
//! The gate is a pure decision function over `(method, path, tokens)`. HTTP
//! plumbing lives in `middleware`.

use std::sync::Arc;

use axum::http::Method;
use tracing::debug;
use uuid::Uuid;

use super::claims::AuthenticatedUser;
use super::error::AuthError;
use super::roles::intersects;
use super::rules::{Access, Ownership, Rejection, RouteTable};
use super::token::{IssuedTokens, TokenService};

/// Outcome of a request that got past token checks.
#[derive(Debug)]
pub enum Decision {
    /// Path belongs to no route group
    Unguarded,
    Allow {
        /// Present on protected routes
        user: Option<AuthenticatedUser>,
        /// Present when the session was rotated during authentication
        rotated: Option<IssuedTokens>,
    },
    /// Authenticated, but the role or ownership check failed. A rotated
    /// pair must still reach the client since the old refresh token is gone.
    Deny {
        error: AuthError,
        rotated: Option<IssuedTokens>,
    },
}

pub struct Gate {
    table: RouteTable,
    tokens: Arc<TokenService>,
}

impl Gate {
    pub fn new(table: RouteTable, tokens: Arc<TokenService>) -> Self {
        Self { table, tokens }
    }

    /// Decide whether a request may proceed.
    ///
    /// Denials before authentication come back as `Err` with
    /// `Unauthenticated`, `MethodNotAllowed` or, on anonymous-only routes,
    /// `AlreadyAuthenticated`/`Forbidden`. Role and ownership failures are
    /// `Decision::Deny`.
    pub fn evaluate(
        &self,
        method: &Method,
        path: &str,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Decision, AuthError> {
        let Some(group) = self.table.group_for(path) else {
            return Ok(Decision::Unguarded);
        };

        let Some((rule, matched)) = group.find(method, path) else {
            debug!(group = group.name, %method, path, "no rule matches");
            return Err(AuthError::MethodNotAllowed);
        };

        match rule.access {
            Access::Public => {
                return Ok(Decision::Allow {
                    user: None,
                    rotated: None,
                })
            }
            Access::AnonymousOnly(rejection) => {
                return self.require_anonymous(refresh_token, rejection);
            }
            Access::Protected => {}
        }

        let auth = self.tokens.authenticate(access_token, refresh_token)?;
        let user = auth.user;

        if !intersects(&user.roles, &rule.roles) {
            debug!(user_id = %user.user_id, pattern = rule.pattern.as_str(), "missing required role");
            return Ok(Decision::Deny {
                error: AuthError::Forbidden,
                rotated: auth.rotated,
            });
        }

        let target: Option<Uuid> = matched.id.and_then(|id| Uuid::parse_str(id).ok());
        let is_self = target == Some(user.user_id);
        let owned = match rule.ownership {
            Ownership::Any => true,
            Ownership::SelfOnly => is_self,
            Ownership::OthersOnly => !is_self,
        };
        if !owned {
            debug!(
                user_id = %user.user_id,
                target = matched.id.unwrap_or_default(),
                "ownership check failed"
            );
            return Ok(Decision::Deny {
                error: AuthError::Forbidden,
                rotated: auth.rotated,
            });
        }

        Ok(Decision::Allow {
            user: Some(user),
            rotated: auth.rotated,
        })
    }

    fn require_anonymous(
        &self,
        refresh_token: Option<&str>,
        rejection: Rejection,
    ) -> Result<Decision, AuthError> {
        let signed_in = match refresh_token {
            Some(value) => match self.tokens.validate_refresh_token(value) {
                Ok(_) => true,
                Err(AuthError::NotFound(_) | AuthError::Expired) => false,
                Err(e) => return Err(e),
            },
            None => false,
        };

        if !signed_in {
            return Ok(Decision::Allow {
                user: None,
                rotated: None,
            });
        }
        Err(match rejection {
            Rejection::BadRequest => AuthError::AlreadyAuthenticated,
            Rejection::Forbidden => AuthError::Forbidden,
        })
    }
}
