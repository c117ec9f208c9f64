// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup and passed to
//! the services that need it. Nothing here is a global.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `auth.redb` | `./data` |
//! | `JWT_SECRET` | HMAC secret for access tokens (>= 32 bytes) | Required |
//! | `ACCESS_TOKEN_TTL_MINUTES` | Access token lifetime (1-1440) | `15` |
//! | `REFRESH_TOKEN_TTL_DAYS` | Refresh token lifetime (1-365) | `7` |
//! | `LOGIN_CODE_TTL_MINUTES` | Login code lifetime (1-60) | `5` |
//! | `LOGIN_CODE_DIGITS` | Login code length (4-9) | `6` |
//! | `SESSION_COOKIE_NAME` | Refresh token cookie | `refresh_token` |
//! | `SESSION_COOKIE_SECURE` | Add `Secure` to the cookie | `false` |
//! | `MAIL_FROM` | Sender address for login codes | `no-reply@localhost` |
//! | `SEED_USERS_FILE` | JSON array of users to seed | Optional |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_MINUTES";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_DAYS";
pub const LOGIN_CODE_TTL_ENV: &str = "LOGIN_CODE_TTL_MINUTES";
pub const LOGIN_CODE_DIGITS_ENV: &str = "LOGIN_CODE_DIGITS";
pub const SESSION_COOKIE_NAME_ENV: &str = "SESSION_COOKIE_NAME";
pub const SESSION_COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
pub const MAIL_FROM_ENV: &str = "MAIL_FROM";
pub const SEED_USERS_FILE_ENV: &str = "SEED_USERS_FILE";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Minimum HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Upper bounds for configurable lifetimes.
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
pub const MAX_LOGIN_CODE_TTL_MINUTES: i64 = 60;

/// File name of the embedded database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "auth.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "refresh_token".to_string(),
            secure: false,
        }
    }
}

/// Token and login-code settings shared by the token service and the gate.
#[derive(Clone)]
pub struct AuthConfig {
    signing_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub login_code_ttl: Duration,
    pub login_code_digits: u32,
    pub cookie: CookieSettings,
}

impl AuthConfig {
    pub fn new(signing_secret: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let signing_secret = signing_secret.into();
        if signing_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }
        Ok(Self {
            signing_secret,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            login_code_ttl: Duration::minutes(5),
            login_code_digits: 6,
            cookie: CookieSettings::default(),
        })
    }

    pub fn signing_secret(&self) -> &[u8] {
        &self.signing_secret
    }

    pub fn with_login_code_digits(mut self, digits: u32) -> Result<Self, ConfigError> {
        if !(4..=9).contains(&digits) {
            return Err(ConfigError::Invalid {
                name: LOGIN_CODE_DIGITS_ENV,
                reason: "must be between 4 and 9".to_string(),
            });
        }
        self.login_code_digits = digits;
        Ok(self)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("login_code_ttl", &self.login_code_ttl)
            .field("login_code_digits", &self.login_code_digits)
            .field("cookie", &self.cookie)
            .finish()
    }
}

/// Process-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub mail_from: String,
    pub seed_users_file: Option<PathBuf>,
    /// `(cert, key)` PEM paths
    pub tls: Option<(PathBuf, PathBuf)>,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, PORT_ENV, 8080)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let secret = lookup(JWT_SECRET_ENV).ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let digits: u32 = parse_or(&lookup, LOGIN_CODE_DIGITS_ENV, 6)?;
        let mut auth = AuthConfig::new(secret.into_bytes())?.with_login_code_digits(digits)?;
        auth.access_token_ttl = bounded_ttl(
            ACCESS_TOKEN_TTL_ENV,
            parse_or(&lookup, ACCESS_TOKEN_TTL_ENV, 15)?,
            MAX_ACCESS_TOKEN_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        auth.refresh_token_ttl = bounded_ttl(
            REFRESH_TOKEN_TTL_ENV,
            parse_or(&lookup, REFRESH_TOKEN_TTL_ENV, 7)?,
            MAX_REFRESH_TOKEN_TTL_DAYS,
            Duration::try_days,
        )?;
        auth.login_code_ttl = bounded_ttl(
            LOGIN_CODE_TTL_ENV,
            parse_or(&lookup, LOGIN_CODE_TTL_ENV, 5)?,
            MAX_LOGIN_CODE_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        if let Some(name) = lookup(SESSION_COOKIE_NAME_ENV) {
            auth.cookie.name = name;
        }
        auth.cookie.secure = parse_or(&lookup, SESSION_COOKIE_SECURE_ENV, false)?;

        let tls = match (lookup(TLS_CERT_PATH_ENV), lookup(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            bind_addr,
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            mail_from: lookup(MAIL_FROM_ENV).unwrap_or_else(|| "no-reply@localhost".to_string()),
            seed_users_file: lookup(SEED_USERS_FILE_ENV).map(PathBuf::from),
            tls,
            auth,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn bounded_ttl(
    name: &'static str,
    value: i64,
    max: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    if !(1..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be between 1 and {max}"),
        });
    }
    to_duration(value).ok_or_else(|| ConfigError::Invalid {
        name,
        reason: "out of range".to_string(),
    })
}
