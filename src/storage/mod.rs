// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence boundary of the auth core. Two collaborator traits are
//! consumed by the token service and the credential issuer:
//!
//! - [`CredentialStore`] - refresh tokens and login codes, one row per user
//! - [`UserDirectory`] - read-only user lookups and role membership
//!
//! [`AuthDatabase`] implements both on top of an embedded redb file.
//!
//! ## Row Invariants
//!
//! - At most one refresh token and one login code per user id
//! - Upserts replace the previous row inside a single write transaction
//! - Refresh token values are stored as SHA-256 digests, never raw

pub mod database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::RoleSet;
use crate::models::User;

pub use database::AuthDatabase;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Records
// =============================================================================

/// Persisted refresh token row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    /// Digest of the opaque value (see `auth::token::hash_refresh_token`)
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Persisted login code row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCodeRecord {
    pub user_id: Uuid,
    pub code: u32,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of presenting a login code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRedemption {
    /// Code matched and was still valid; the row is gone.
    Redeemed,
    /// No row, or the code does not match.
    NotFound,
    /// Code matched but is past its expiry; the row is kept.
    Expired,
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Refresh token and login code persistence.
///
/// Delete operations report whether a row existed; callers decide whether
/// absence matters.
pub trait CredentialStore: Send + Sync {
    fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Insert or replace the user's refresh token.
    fn upsert_refresh_token(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool>;

    fn find_login_code(&self, user_id: Uuid) -> StoreResult<Option<LoginCodeRecord>>;

    /// Insert or replace the user's login code.
    fn upsert_login_code(&self, record: &LoginCodeRecord) -> StoreResult<()>;

    fn delete_login_code(&self, user_id: Uuid) -> StoreResult<bool>;

    /// Compare, expiry-check and delete the user's login code in one write
    /// transaction, so a code is redeemed at most once.
    fn redeem_login_code(
        &self,
        user_id: Uuid,
        code: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<CodeRedemption>;
}

/// Read access to registered users.
pub trait UserDirectory: Send + Sync {
    fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    /// Lookup by email; implementations normalize case and whitespace.
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Current role membership; empty for unknown users.
    fn find_roles_by_user_id(&self, user_id: Uuid) -> StoreResult<RoleSet>;
}
