// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded auth database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized User
//! - `user_emails`: normalized email → user_id
//! - `refresh_tokens`: user_id → serialized RefreshTokenRecord
//! - `refresh_token_index`: token hash → user_id
//! - `login_codes`: user_id → serialized LoginCodeRecord

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::{
    CodeRedemption, CredentialStore, LoginCodeRecord, RefreshTokenRecord, StoreError, StoreResult,
    UserDirectory,
};
use crate::auth::RoleSet;
use crate::models::{normalize_email, User};

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Primary row per user; replaced on every issuance.
const REFRESH_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("refresh_tokens");

/// Lookup by presented value. Kept in step with `REFRESH_TOKENS`.
const REFRESH_TOKEN_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("refresh_token_index");

const LOGIN_CODES: TableDefinition<&str, &[u8]> = TableDefinition::new("login_codes");

// =============================================================================
// AuthDatabase
// =============================================================================

/// redb-backed user directory and credential store.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
            let _ = write_txn.open_table(REFRESH_TOKEN_INDEX)?;
            let _ = write_txn.open_table(LOGIN_CODES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Verify the database can serve a read transaction.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert or replace a user, keeping the email index consistent.
    ///
    /// Fails with `AlreadyExists` when the email belongs to another user.
    pub fn save_user(&self, user: &User) -> StoreResult<()> {
        let id = user.id.to_string();
        let email = normalize_email(&user.email);
        let json = serde_json::to_vec(user)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            let owner = emails.get(email.as_str())?.map(|g| g.value().to_string());
            if let Some(owner) = owner {
                if owner != id {
                    return Err(StoreError::AlreadyExists(format!("email {email}")));
                }
            }

            let mut users = write_txn.open_table(USERS)?;
            let previous = users
                .insert(id.as_str(), json.as_slice())?
                .map(|g| g.value().to_vec());
            if let Some(previous) = previous {
                let previous: User = serde_json::from_slice(&previous)?;
                let previous_email = normalize_email(&previous.email);
                if previous_email != email {
                    emails.remove(previous_email.as_str())?;
                }
            }
            emails.insert(email.as_str(), id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Seed users from a JSON array file. Returns the number of users written.
    pub fn load_seed_users(&self, path: &Path) -> StoreResult<usize> {
        let raw = std::fs::read(path)?;
        let users: Vec<User> = serde_json::from_slice(&raw)?;
        for user in &users {
            self.save_user(user)?;
        }
        Ok(users.len())
    }

    fn read_user(&self, id: &str) -> StoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

impl UserDirectory for AuthDatabase {
    fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.read_user(&user_id.to_string())
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let id = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(USER_EMAILS)?;
            let id = table.get(email.as_str())?.map(|g| g.value().to_string());
            id
        };
        match id {
            Some(id) => self.read_user(&id),
            None => Ok(None),
        }
    }

    fn find_roles_by_user_id(&self, user_id: Uuid) -> StoreResult<RoleSet> {
        Ok(self
            .find_user_by_id(user_id)?
            .map(|user| user.roles)
            .unwrap_or_default())
    }
}

impl CredentialStore for AuthDatabase {
    fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(REFRESH_TOKEN_INDEX)?;
        let Some(user_key) = index.get(token_hash)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };

        let tokens = read_txn.open_table(REFRESH_TOKENS)?;
        let record = match tokens.get(user_key.as_str())? {
            Some(value) => serde_json::from_slice::<RefreshTokenRecord>(value.value())?,
            None => return Ok(None),
        };

        // The index may briefly point at a replaced row; only the current one counts.
        if record.token_hash == token_hash {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn upsert_refresh_token(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        let user_key = record.user_id.to_string();
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;
            let mut index = write_txn.open_table(REFRESH_TOKEN_INDEX)?;

            let previous = tokens
                .insert(user_key.as_str(), json.as_slice())?
                .map(|g| g.value().to_vec());
            if let Some(previous) = previous {
                let previous: RefreshTokenRecord = serde_json::from_slice(&previous)?;
                if previous.token_hash != record.token_hash {
                    index.remove(previous.token_hash.as_str())?;
                }
            }
            index.insert(record.token_hash.as_str(), user_key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut index = write_txn.open_table(REFRESH_TOKEN_INDEX)?;
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;

            let user_key = index.remove(token_hash)?.map(|g| g.value().to_string());
            let current = match &user_key {
                Some(user_key) => tokens
                    .get(user_key.as_str())?
                    .map(|g| g.value().to_vec()),
                None => None,
            };
            let matches = match current {
                Some(current) => {
                    let current: RefreshTokenRecord = serde_json::from_slice(&current)?;
                    current.token_hash == token_hash
                }
                None => false,
            };
            if let (true, Some(user_key)) = (matches, &user_key) {
                tokens.remove(user_key.as_str())?;
            }
            matches
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn find_login_code(&self, user_id: Uuid) -> StoreResult<Option<LoginCodeRecord>> {
        let user_key = user_id.to_string();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LOGIN_CODES)?;
        match table.get(user_key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn upsert_login_code(&self, record: &LoginCodeRecord) -> StoreResult<()> {
        let user_key = record.user_id.to_string();
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOGIN_CODES)?;
            table.insert(user_key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_login_code(&self, user_id: Uuid) -> StoreResult<bool> {
        let user_key = user_id.to_string();
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(LOGIN_CODES)?;
            let removed = table.remove(user_key.as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn redeem_login_code(
        &self,
        user_id: Uuid,
        code: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<CodeRedemption> {
        let user_key = user_id.to_string();
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(LOGIN_CODES)?;
            let stored = table
                .get(user_key.as_str())?
                .map(|g| g.value().to_vec());
            let record: Option<LoginCodeRecord> = match stored {
                Some(raw) => Some(serde_json::from_slice(&raw)?),
                None => None,
            };
            let outcome = match record {
                Some(record) if record.code == code => {
                    if now > record.expires_at {
                        CodeRedemption::Expired
                    } else {
                        CodeRedemption::Redeemed
                    }
                }
                _ => CodeRedemption::NotFound,
            };
            if outcome == CodeRedemption::Redeemed {
                table.remove(user_key.as_str())?;
            }
            outcome
        };
        write_txn.commit()?;
        Ok(outcome)
    }
}
