// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Benefits Directory - Admin Backend Authentication
//!
//! Passwordless sign-in, token lifecycle and per-request authorization for
//! the benefits directory admin API.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token service, authorization gate, credential issuer
//! - `storage` - User directory and credential store (redb)
//! - `mail` - Login code email dispatch
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod state;
pub mod storage;
pub mod tls;

#[cfg(test)]
pub(crate) mod test_support;
