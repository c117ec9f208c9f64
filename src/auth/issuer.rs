// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential issuer: the passwordless login flow.
//!
//! 1. `pre_login(email)` mails a one-time numeric code
//! 2. `login(email, code)` consumes the code and issues a token pair
//! 3. `logout(refresh_token)` revokes the refresh token

use std::sync::Arc;

use tracing::info;

use super::error::AuthError;
use super::token::{IssuedTokens, TokenService};
use crate::mail::{login_code_email, Mailer};
use crate::models::UserProfile;
use crate::storage::UserDirectory;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub profile: UserProfile,
    pub tokens: IssuedTokens,
}

pub struct CredentialIssuer {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl CredentialIssuer {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            tokens,
            users,
            mailer,
        }
    }

    /// Generate a login code for the account and email it.
    ///
    /// A mail failure is returned as `MailDelivery`; the stored code stays
    /// in place and is replaced by the next attempt.
    pub fn pre_login(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_user_by_email(email)?
            .ok_or(AuthError::NotFound("user"))?;

        let record = self.tokens.generate_login_code(user.id)?;
        let (subject, body) = login_code_email(&user.name, record.code);
        self.mailer.send(&user.email, &subject, &body)?;

        info!(user_id = %user.id, "login code dispatched");
        Ok(())
    }

    /// Exchange a valid login code for a token pair.
    pub fn login(&self, email: &str, code: u32) -> Result<LoginOutcome, AuthError> {
        let user = self
            .users
            .find_user_by_email(email)?
            .ok_or(AuthError::NotFound("user"))?;

        self.tokens.consume_login_code(user.id, code)?;
        let tokens = self.tokens.issue_auth_tokens(user.id)?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome {
            profile: user.profile(),
            tokens,
        })
    }

    /// Revoke a refresh token. Unknown values are accepted silently.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.tokens.revoke_refresh_token(refresh_token)?;
        info!("refresh token revoked on logout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::clock::Clock;
    use crate::storage::CredentialStore;
    use crate::test_support::Fixture;
    use chrono::Duration;

    #[test]
    fn pre_login_unknown_email_is_not_found() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        assert!(matches!(
            issuer.pre_login("ghost@b.com"),
            Err(AuthError::NotFound("user"))
        ));
        assert!(fx.mailer.sent().is_empty());
    }

    #[test]
    fn pre_login_mails_code_with_display_name() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        let user = fx.add_user("ana@b.com", &[Role::User]);

        issuer.pre_login("ANA@b.com").unwrap();

        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@b.com");
        assert!(!sent[0].subject.is_empty());
        assert!(sent[0].body.contains(&user.name));
        let code = fx.last_code_for("ana@b.com");
        assert_eq!(fx.db.find_login_code(user.id).unwrap().unwrap().code, code);
    }

    #[test]
    fn pre_login_surfaces_mail_failure() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        fx.add_user("ana@b.com", &[Role::User]);
        fx.mailer.fail_next(true);

        assert!(matches!(
            issuer.pre_login("ana@b.com"),
            Err(AuthError::MailDelivery(_))
        ));
    }

    #[test]
    fn login_code_lifecycle() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let start = fx.clock.now();

        issuer.pre_login("a@b.com").unwrap();
        let code = fx.last_code_for("a@b.com");
        assert_eq!(
            fx.db.find_login_code(user.id).unwrap().unwrap().expires_at,
            start + Duration::seconds(300)
        );

        // Expired at T+301
        fx.clock.set(start + Duration::seconds(301));
        assert!(matches!(issuer.login("a@b.com", code), Err(AuthError::Expired)));

        // Fresh code, used at T+100 relative to its issuance
        let restart = fx.clock.now();
        issuer.pre_login("a@b.com").unwrap();
        let code = fx.last_code_for("a@b.com");
        fx.clock.set(restart + Duration::seconds(100));

        let outcome = issuer.login("a@b.com", code).unwrap();
        assert_eq!(outcome.profile.id, user.id);
        assert_eq!(outcome.profile.roles, vec![Role::User]);
        assert_eq!(
            fx.tokens.validate_refresh_token(&outcome.tokens.refresh_token).unwrap(),
            user.id
        );

        // Single use
        assert!(matches!(
            issuer.login("a@b.com", code),
            Err(AuthError::NotFound("login code"))
        ));
    }

    #[test]
    fn concurrent_logins_with_one_code_succeed_once() {
        use std::sync::Barrier;

        let fx = Fixture::new();
        let issuer = fx.issuer();
        fx.add_user("a@b.com", &[Role::User]);
        issuer.pre_login("a@b.com").unwrap();
        let code = fx.last_code_for("a@b.com");

        let attempts = 8;
        let barrier = Barrier::new(attempts);
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..attempts)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        issuer.login("a@b.com", code)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(successes, 1);
    }

    #[test]
    fn login_with_wrong_code_is_not_found() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        fx.add_user("a@b.com", &[Role::User]);

        issuer.pre_login("a@b.com").unwrap();
        let code = fx.last_code_for("a@b.com");
        let wrong = if code == 999_999 { 100_000 } else { code + 1 };

        assert!(matches!(
            issuer.login("a@b.com", wrong),
            Err(AuthError::NotFound("login code"))
        ));
        // The real code is still usable
        assert!(issuer.login("a@b.com", code).is_ok());
    }

    #[test]
    fn login_unknown_email_is_not_found() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        assert!(matches!(
            issuer.login("ghost@b.com", 123456),
            Err(AuthError::NotFound("user"))
        ));
    }

    #[test]
    fn logout_revokes_and_is_idempotent() {
        let fx = Fixture::new();
        let issuer = fx.issuer();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let t = fx.tokens.issue_auth_tokens(user.id).unwrap();

        issuer.logout(&t.refresh_token).unwrap();
        assert!(matches!(
            fx.tokens.authenticate(Some(&t.access_token), Some(&t.refresh_token)),
            Err(AuthError::Unauthenticated)
        ));

        issuer.logout(&t.refresh_token).unwrap();
        issuer.logout("never-issued").unwrap();
    }
}
