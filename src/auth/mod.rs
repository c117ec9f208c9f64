// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Passwordless authentication and route authorization for the admin API.
//!
//! ## Auth Flow
//!
//! 1. `POST /auth/pre-login` emails a one-time numeric code
//! 2. `POST /auth/login` exchanges the code for:
//!    - an access token (`Authorization: Bearer <JWT>`, short-lived)
//!    - a refresh token (`HttpOnly` session cookie, long-lived)
//! 3. Every request passes the authorization gate:
//!    - the route table picks a rule by path group, method and pattern
//!    - protected rules authenticate the token pair, then check roles
//!      and ownership of the `{id}` path segment
//!    - an expired access token with a valid refresh token is rotated
//!      and the new pair is returned in the response headers
//! 4. `POST /auth/logout` revokes the refresh token and clears the cookie
//!
//! ## Security
//!
//! - The refresh token is always required; an access token alone never
//!   authenticates
//! - A malformed access token revokes the accompanying refresh token
//! - Refresh tokens are stored as SHA-256 digests

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod issuer;
pub mod middleware;
pub mod roles;
pub mod rules;
pub mod session;
pub mod token;

pub use claims::{AccessClaims, AuthenticatedUser};
pub use error::AuthError;
pub use extractor::Auth;
pub use gate::{Decision, Gate};
pub use issuer::{CredentialIssuer, LoginOutcome};
pub use middleware::authorization_gate;
pub use roles::{Role, RoleSet};
pub use rules::RouteTable;
pub use token::{Authentication, IssuedTokens, TokenService};
