// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token service: access tokens, refresh tokens and login codes.
//!
//! ## Credentials
//!
//! - **Access token**: HS256 JWT with `sub`, `roles`, `iat`, `exp`. Never
//!   stored. Expiry is checked against the injected [`Clock`].
//! - **Refresh token**: 48 random alphanumeric characters. Only its SHA-256
//!   digest is persisted, one row per user.
//! - **Login code**: fixed-length numeric code, first digit non-zero, one row
//!   per user.
//!
//! ## Authentication
//!
//! [`TokenService::authenticate`] always checks the refresh token first. An
//! expired but correctly signed access token is silently replaced (sliding
//! session); a malformed or missing one revokes the refresh token.

use std::collections::HashSet;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::claims::{AccessClaims, AuthenticatedUser};
use super::error::AuthError;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::storage::{
    CodeRedemption, CredentialStore, LoginCodeRecord, RefreshTokenRecord, UserDirectory,
};

/// Length of generated refresh token values.
pub const REFRESH_TOKEN_LEN: usize = 48;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    /// Raw refresh token value; only returned to the client, never stored
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: AuthenticatedUser,
}

/// Result of a successful [`TokenService::authenticate`].
#[derive(Debug, Clone)]
pub struct Authentication {
    pub user: AuthenticatedUser,
    /// Set when the access token was expired and a new pair was issued
    pub rotated: Option<IssuedTokens>,
}

/// Mints and validates every credential of the auth core.
pub struct TokenService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    rng: SystemRandom,
}

impl TokenService {
    pub fn new(
        config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against `clock`, not the library's wall clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.signing_secret()),
            decoding_key: DecodingKey::from_secret(config.signing_secret()),
            validation,
            config,
            credentials,
            users,
            clock,
            rng: SystemRandom::new(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Login Codes
    // =========================================================================

    /// Create a login code for the user, replacing any previous one.
    pub fn generate_login_code(&self, user_id: Uuid) -> Result<LoginCodeRecord, AuthError> {
        let digits = self.config.login_code_digits;
        let low = 10u64.pow(digits - 1);
        let span = 9 * low;
        let draw = u64::from_be_bytes(self.random_bytes::<8>()?);
        let code = u32::try_from(low + draw % span)
            .map_err(|_| AuthError::Internal("login code out of range".to_string()))?;

        let record = LoginCodeRecord {
            user_id,
            code,
            expires_at: expiry(self.clock.now(), self.config.login_code_ttl)?,
        };
        self.credentials.upsert_login_code(&record)?;

        info!(user_id = %user_id, expires_at = %record.expires_at, "login code issued");
        Ok(record)
    }

    /// Check a supplied code against the user's stored code.
    ///
    /// A missing row and a wrong code are both `NotFound`; only a matching
    /// code past its TTL is `Expired`.
    pub fn verify_login_code(&self, user_id: Uuid, code: u32) -> Result<(), AuthError> {
        let record = self
            .credentials
            .find_login_code(user_id)?
            .ok_or(AuthError::NotFound("login code"))?;

        if record.code != code {
            return Err(AuthError::NotFound("login code"));
        }
        if self.clock.now() > record.expires_at {
            return Err(AuthError::Expired);
        }
        Ok(())
    }

    /// Verify and delete the user's login code as one atomic step.
    ///
    /// Errors match [`verify_login_code`](Self::verify_login_code). Of several
    /// concurrent calls with the same code, at most one succeeds.
    pub fn consume_login_code(&self, user_id: Uuid, code: u32) -> Result<(), AuthError> {
        match self
            .credentials
            .redeem_login_code(user_id, code, self.clock.now())?
        {
            CodeRedemption::Redeemed => Ok(()),
            CodeRedemption::NotFound => Err(AuthError::NotFound("login code")),
            CodeRedemption::Expired => Err(AuthError::Expired),
        }
    }

    /// Delete the user's login code. Absence is not an error.
    pub fn revoke_login_code(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.credentials.delete_login_code(user_id)?;
        Ok(())
    }

    // =========================================================================
    // Token Pairs
    // =========================================================================

    /// Sign a new access token and replace the user's refresh token.
    pub fn issue_auth_tokens(&self, user_id: Uuid) -> Result<IssuedTokens, AuthError> {
        let roles = self.users.find_roles_by_user_id(user_id)?;
        let now = self.clock.now();

        let access_expires_at = expiry(now, self.config.access_token_ttl)?;
        let claims = AccessClaims::new(user_id, &roles, now, access_expires_at);
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign access token: {e}")))?;

        let refresh_token = self.random_alphanumeric(REFRESH_TOKEN_LEN)?;
        let refresh_expires_at = expiry(now, self.config.refresh_token_ttl)?;
        self.credentials.upsert_refresh_token(&RefreshTokenRecord {
            user_id,
            token_hash: hash_refresh_token(&refresh_token),
            expires_at: refresh_expires_at,
        })?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            refresh_expires_at,
            user: AuthenticatedUser::from_claims(claims),
        })
    }

    /// Verify signature and expiry of an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode_access_token(token)?;
        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::Expired);
        }
        Ok(AuthenticatedUser::from_claims(claims))
    }

    /// Resolve a refresh token value to its owner.
    pub fn validate_refresh_token(&self, value: &str) -> Result<Uuid, AuthError> {
        let record = self
            .credentials
            .find_refresh_token(&hash_refresh_token(value))?
            .ok_or(AuthError::NotFound("refresh token"))?;

        if self.clock.now() > record.expires_at {
            return Err(AuthError::Expired);
        }
        Ok(record.user_id)
    }

    /// Delete the refresh token with this value. Absence is not an error.
    pub fn revoke_refresh_token(&self, value: &str) -> Result<(), AuthError> {
        self.credentials
            .delete_refresh_token(&hash_refresh_token(value))?;
        Ok(())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Authenticate a request from its access and refresh token strings.
    ///
    /// Every authentication failure is reported as `Unauthenticated`; only
    /// store or signing failures surface as `Internal`.
    pub fn authenticate(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Authentication, AuthError> {
        let Some(refresh_token) = refresh_token else {
            debug!(reason = "missing refresh token", "authentication failed");
            return Err(AuthError::Unauthenticated);
        };

        let user_id = match self.validate_refresh_token(refresh_token) {
            Ok(user_id) => user_id,
            Err(e @ (AuthError::NotFound(_) | AuthError::Expired)) => {
                debug!(reason = %e, "authentication failed");
                return Err(AuthError::Unauthenticated);
            }
            Err(e) => return Err(e),
        };

        let Some(access_token) = access_token else {
            warn!(user_id = %user_id, reason = "missing access token", "revoking refresh token");
            self.revoke_refresh_token(refresh_token)?;
            return Err(AuthError::Unauthenticated);
        };

        let claims = match self.decode_access_token(access_token) {
            Ok(claims) => claims,
            Err(_) => {
                warn!(user_id = %user_id, reason = "malformed access token", "revoking refresh token");
                self.revoke_refresh_token(refresh_token)?;
                return Err(AuthError::Unauthenticated);
            }
        };

        if !claims.is_expired_at(self.clock.now()) {
            return Ok(Authentication {
                user: AuthenticatedUser::from_claims(claims),
                rotated: None,
            });
        }

        if claims.sub != user_id {
            warn!(
                user_id = %user_id,
                token_subject = %claims.sub,
                reason = "token pair subject mismatch",
                "revoking refresh token"
            );
            self.revoke_refresh_token(refresh_token)?;
            return Err(AuthError::Unauthenticated);
        }

        let issued = self.issue_auth_tokens(user_id)?;
        info!(user_id = %user_id, "access token expired, session rotated");
        Ok(Authentication {
            user: issued.user.clone(),
            rotated: Some(issued),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn decode_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidFormat)
    }

    fn random_bytes<const N: usize>(&self) -> Result<[u8; N], AuthError> {
        let mut buf = [0u8; N];
        self.rng
            .fill(&mut buf)
            .map_err(|_| AuthError::Internal("system randomness unavailable".to_string()))?;
        Ok(buf)
    }

    fn random_alphanumeric(&self, len: usize) -> Result<String, AuthError> {
        // 248 = 4 * 62; rejecting larger bytes keeps the draw uniform.
        let mut out = String::with_capacity(len);
        while out.len() < len {
            for byte in self.random_bytes::<64>()? {
                if byte < 248 && out.len() < len {
                    out.push(ALPHANUMERIC[(byte % 62) as usize] as char);
                }
            }
        }
        Ok(out)
    }
}

fn expiry(now: DateTime<Utc>, ttl: chrono::Duration) -> Result<DateTime<Utc>, AuthError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal("credential lifetime out of range".to_string()))
}

/// Digest under which a refresh token value is stored.
pub fn hash_refresh_token(value: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, RoleSet};
    use crate::test_support::Fixture;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Duration;

    /// Re-encode the payload with extra roles, keeping the original signature.
    fn tamper_roles(token: &str) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        claims["roles"] = serde_json::json!(["user", "admin", "super-admin"]);
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{}.{}.{}", parts[0], forged, parts[2])
    }

    #[test]
    fn issued_access_token_round_trips_user_and_roles() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::Admin, Role::User]);

        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();
        let validated = fx.tokens.validate_access_token(&issued.access_token).unwrap();

        assert_eq!(validated.user_id, user.id);
        let expected: RoleSet = [Role::User, Role::Admin].into_iter().collect();
        assert_eq!(validated.roles, expected);
    }

    #[test]
    fn second_issuance_invalidates_first_refresh_token() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);

        let first = fx.tokens.issue_auth_tokens(user.id).unwrap();
        let second = fx.tokens.issue_auth_tokens(user.id).unwrap();

        assert!(matches!(
            fx.tokens.validate_refresh_token(&first.refresh_token),
            Err(AuthError::NotFound(_))
        ));
        assert_eq!(fx.tokens.validate_refresh_token(&second.refresh_token).unwrap(), user.id);
    }

    #[test]
    fn refresh_token_is_alphanumeric_and_stored_hashed() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);

        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();
        assert_eq!(issued.refresh_token.len(), REFRESH_TOKEN_LEN);
        assert!(issued.refresh_token.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(fx.db.find_refresh_token(&issued.refresh_token).unwrap().is_none());
        assert!(fx
            .db
            .find_refresh_token(&hash_refresh_token(&issued.refresh_token))
            .unwrap()
            .is_some());
    }

    #[test]
    fn access_token_expires_after_ttl() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        fx.clock.advance(Duration::minutes(15) - Duration::seconds(1));
        assert!(fx.tokens.validate_access_token(&issued.access_token).is_ok());

        fx.clock.advance(Duration::seconds(2));
        assert!(matches!(
            fx.tokens.validate_access_token(&issued.access_token),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn tampered_or_garbage_access_token_is_invalid() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        assert!(matches!(
            fx.tokens.validate_access_token(&tamper_roles(&issued.access_token)),
            Err(AuthError::InvalidFormat)
        ));
        assert!(matches!(
            fx.tokens.validate_access_token("not-a-jwt"),
            Err(AuthError::InvalidFormat)
        ));
    }

    #[test]
    fn refresh_token_expires_after_ttl() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        fx.clock.advance(Duration::days(7) + Duration::seconds(1));
        assert!(matches!(
            fx.tokens.validate_refresh_token(&issued.refresh_token),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn revoking_unknown_refresh_token_is_not_an_error() {
        let fx = Fixture::new();
        assert!(fx.tokens.revoke_refresh_token("does-not-exist").is_ok());
        assert!(fx.tokens.revoke_login_code(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn login_code_has_fixed_length_and_non_zero_first_digit() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);

        for _ in 0..50 {
            let record = fx.tokens.generate_login_code(user.id).unwrap();
            assert!((100_000..=999_999).contains(&record.code));
        }
    }

    #[test]
    fn login_code_replaces_previous_code() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);

        let first = fx.tokens.generate_login_code(user.id).unwrap();
        let mut second = fx.tokens.generate_login_code(user.id).unwrap();
        while second.code == first.code {
            second = fx.tokens.generate_login_code(user.id).unwrap();
        }

        assert!(matches!(
            fx.tokens.verify_login_code(user.id, first.code),
            Err(AuthError::NotFound(_))
        ));
        assert!(fx.tokens.verify_login_code(user.id, second.code).is_ok());
    }

    #[test]
    fn login_code_expiry_boundary() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let record = fx.tokens.generate_login_code(user.id).unwrap();

        fx.clock.set(record.expires_at - Duration::seconds(1));
        assert!(fx.tokens.verify_login_code(user.id, record.code).is_ok());

        fx.clock.set(record.expires_at + Duration::seconds(1));
        assert!(matches!(
            fx.tokens.verify_login_code(user.id, record.code),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn consume_login_code_succeeds_once() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let record = fx.tokens.generate_login_code(user.id).unwrap();

        fx.tokens.consume_login_code(user.id, record.code).unwrap();
        assert!(matches!(
            fx.tokens.consume_login_code(user.id, record.code),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn consume_expired_login_code_is_expired() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let record = fx.tokens.generate_login_code(user.id).unwrap();

        fx.clock.set(record.expires_at + Duration::seconds(1));
        assert!(matches!(
            fx.tokens.consume_login_code(user.id, record.code),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let mut config = fx.tokens.config().clone();
        config.refresh_token_ttl = Duration::MAX;
        let tokens = TokenService::new(config, fx.db.clone(), fx.db.clone(), fx.clock.clone());

        assert!(matches!(
            tokens.issue_auth_tokens(user.id),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn authenticate_with_valid_pair_has_no_side_effects() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        let auth = fx
            .tokens
            .authenticate(Some(&issued.access_token), Some(&issued.refresh_token))
            .unwrap();
        assert_eq!(auth.user.user_id, user.id);
        assert!(auth.rotated.is_none());
        assert!(fx.tokens.validate_refresh_token(&issued.refresh_token).is_ok());
    }

    #[test]
    fn authenticate_rotates_expired_access_token() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        fx.clock.advance(Duration::minutes(20));
        let auth = fx
            .tokens
            .authenticate(Some(&issued.access_token), Some(&issued.refresh_token))
            .unwrap();

        let rotated = auth.rotated.expect("expected rotation");
        assert_ne!(rotated.refresh_token, issued.refresh_token);
        assert_eq!(auth.user.user_id, user.id);
        assert!(fx.tokens.validate_access_token(&rotated.access_token).is_ok());
        assert!(matches!(
            fx.tokens.validate_refresh_token(&issued.refresh_token),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn rotation_picks_up_current_roles() {
        let fx = Fixture::new();
        let mut user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        user.roles.insert(Role::Admin);
        fx.db.save_user(&user).unwrap();
        fx.clock.advance(Duration::minutes(20));

        let auth = fx
            .tokens
            .authenticate(Some(&issued.access_token), Some(&issued.refresh_token))
            .unwrap();
        assert!(auth.user.has_role(Role::Admin));
    }

    #[test]
    fn authenticate_fails_closed_without_refresh_token() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        assert!(matches!(
            fx.tokens.authenticate(Some(&issued.access_token), None),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            fx.tokens.authenticate(Some(&issued.access_token), Some("unknown")),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn authenticate_fails_with_expired_refresh_token() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        fx.clock.advance(Duration::days(8));
        assert!(matches!(
            fx.tokens
                .authenticate(Some(&issued.access_token), Some(&issued.refresh_token)),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn malformed_access_token_revokes_refresh_token() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        let forged = tamper_roles(&issued.access_token);
        assert!(matches!(
            fx.tokens.authenticate(Some(&forged), Some(&issued.refresh_token)),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            fx.tokens.validate_refresh_token(&issued.refresh_token),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn missing_access_token_is_a_failure_and_revokes() {
        let fx = Fixture::new();
        let user = fx.add_user("a@b.com", &[Role::User]);
        let issued = fx.tokens.issue_auth_tokens(user.id).unwrap();

        assert!(matches!(
            fx.tokens.authenticate(None, Some(&issued.refresh_token)),
            Err(AuthError::Unauthenticated)
        ));
        assert!(fx.tokens.validate_refresh_token(&issued.refresh_token).is_err());
    }

    #[test]
    fn expired_token_of_another_user_is_not_rotated() {
        let fx = Fixture::new();
        let alice = fx.add_user("alice@b.com", &[Role::User]);
        let bob = fx.add_user("bob@b.com", &[Role::User]);
        let alice_tokens = fx.tokens.issue_auth_tokens(alice.id).unwrap();
        let bob_tokens = fx.tokens.issue_auth_tokens(bob.id).unwrap();

        fx.clock.advance(Duration::minutes(20));
        assert!(matches!(
            fx.tokens
                .authenticate(Some(&alice_tokens.access_token), Some(&bob_tokens.refresh_token)),
            Err(AuthError::Unauthenticated)
        ));
        assert!(fx.tokens.validate_refresh_token(&bob_tokens.refresh_token).is_err());
    }
}
