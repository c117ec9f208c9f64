// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit and router tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::auth::{CredentialIssuer, Gate, Role, RouteTable, TokenService};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::mail::{MailError, Mailer};
use crate::models::User;
use crate::state::AppState;
use crate::storage::AuthDatabase;

pub const TEST_SECRET: &str = "test-signing-secret-0123456789abcdef";

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Mailer that keeps every message, or fails on demand.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl RecordingMailer {
    pub fn fail_next(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A fresh database in a temp dir with services wired to a manual clock.
pub struct Fixture {
    pub db: Arc<AuthDatabase>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingMailer>,
    pub tokens: Arc<TokenService>,
    _dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Arc::new(
            AuthDatabase::open(&dir.path().join("auth.redb")).expect("Failed to open db"),
        );
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let config = AuthConfig::new(TEST_SECRET.as_bytes().to_vec()).unwrap();
        let tokens = Arc::new(TokenService::new(
            config,
            db.clone(),
            db.clone(),
            clock.clone(),
        ));

        Self {
            db,
            clock,
            mailer: Arc::new(RecordingMailer::default()),
            tokens,
            _dir: dir,
        }
    }

    pub fn add_user(&self, email: &str, roles: &[Role]) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or("user").to_string(),
            roles: roles.iter().copied().collect(),
        };
        self.db.save_user(&user).unwrap();
        user
    }

    pub fn issuer(&self) -> CredentialIssuer {
        CredentialIssuer::new(self.tokens.clone(), self.db.clone(), self.mailer.clone())
    }

    pub fn gate(&self) -> Gate {
        Gate::new(RouteTable::default_table(), self.tokens.clone())
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.tokens.clone(), self.db.clone(), self.mailer.clone())
    }

    /// Pull the login code out of the last email sent to `email`.
    pub fn last_code_for(&self, email: &str) -> u32 {
        let mail = self
            .mailer
            .sent()
            .into_iter()
            .rev()
            .find(|m| m.to == email)
            .expect("no mail sent");
        mail.body
            .split(|c: char| !c.is_ascii_digit())
            .find(|s| s.len() == self.tokens.config().login_code_digits as usize)
            .and_then(|s| s.parse().ok())
            .expect("no code in mail")
    }
}
