// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email dispatch for login codes.
//!
//! The auth core only needs `send(to, subject, body)`. Delivery is
//! fire-and-forget from the caller's point of view: a failure is reported
//! once and never retried here.

use tracing::info;

/// Delivery failure reported by a [`Mailer`].
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),

    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Email delivery abstraction.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Sender that logs instead of delivering. Used when no transport is configured.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        // The body carries the one-time code; only its size is logged.
        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "email dispatch stub"
        );
        Ok(())
    }
}

/// Subject and body of the login code email.
pub fn login_code_email(display_name: &str, code: u32) -> (String, String) {
    let subject = "Your sign-in code".to_string();
    let body = format!(
        "Hello {display_name},\n\n\
         Your sign-in code is {code}.\n\n\
         It expires in a few minutes and can be used once. \
         If you did not request it, you can ignore this email.\n"
    );
    (subject, body)
}
