//! Monitor configuration parsed from environment variables.
//!
//! All variables are optional:
//! - `SESSION_ACCOUNT_COLLECTION`: account record collection, default `users`
//! - `SESSION_SUPPORT_EMAIL`: appeal contact shown in the suspension notice
//! - `SESSION_NOTICE_DURATION_MS`: display hint for notices, default 6000
//! - `SESSION_SIGN_IN_PATH` / `SESSION_HOME_PATH` / `SESSION_BLOCKED_PATH`
//! - `SESSION_SIGN_OUT_ATTEMPTS`: sign-out tries after a block, default 3
//! - `SESSION_SIGN_OUT_RETRY_MS`: delay between tries, default 250
//! - `SESSION_MISSING_ACCOUNT`: `allow` (default) or `block`

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::access::Destinations;

pub const DEFAULT_ACCOUNT_COLLECTION: &str = "users";
pub const DEFAULT_SUPPORT_EMAIL: &str = "support@example.com";
pub const DEFAULT_NOTICE_DURATION_MS: u64 = 6000;
pub const DEFAULT_SIGN_OUT_ATTEMPTS: u32 = 3;
pub const DEFAULT_SIGN_OUT_RETRY_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value} ({expected})")]
    Invalid { var: &'static str, value: String, expected: &'static str },
}

/// What to do when the watched account record does not exist.
///
/// A record can be missing because the account is still being provisioned or
/// because it was deleted. `Allow` keeps the session usable with its current
/// role; `Block` treats the absence like a blocked flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingAccountPolicy {
    #[default]
    Allow,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub account_collection: String,
    pub support_email: String,
    pub notice_duration: Duration,
    pub destinations: Destinations,
    pub sign_out_attempts: u32,
    pub sign_out_retry_delay: Duration,
    pub missing_account: MissingAccountPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            account_collection: DEFAULT_ACCOUNT_COLLECTION.into(),
            support_email: DEFAULT_SUPPORT_EMAIL.into(),
            notice_duration: Duration::from_millis(DEFAULT_NOTICE_DURATION_MS),
            destinations: Destinations::default(),
            sign_out_attempts: DEFAULT_SIGN_OUT_ATTEMPTS,
            sign_out_retry_delay: Duration::from_millis(DEFAULT_SIGN_OUT_RETRY_MS),
            missing_account: MissingAccountPolicy::Allow,
        }
    }
}

impl MonitorConfig {
    /// Read the `SESSION_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `SESSION_MISSING_ACCOUNT` is set
    /// to something other than `allow` or `block`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`MonitorConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(default);

        let destinations = Destinations {
            sign_in: string("SESSION_SIGN_IN_PATH", defaults.destinations.sign_in),
            home: string("SESSION_HOME_PATH", defaults.destinations.home),
            account_blocked: string("SESSION_BLOCKED_PATH", defaults.destinations.account_blocked),
        };

        Ok(Self {
            account_collection: string("SESSION_ACCOUNT_COLLECTION", defaults.account_collection),
            support_email: string("SESSION_SUPPORT_EMAIL", defaults.support_email),
            notice_duration: Duration::from_millis(parse_or(
                &lookup,
                "SESSION_NOTICE_DURATION_MS",
                DEFAULT_NOTICE_DURATION_MS,
            )),
            destinations,
            sign_out_attempts: parse_or(&lookup, "SESSION_SIGN_OUT_ATTEMPTS", DEFAULT_SIGN_OUT_ATTEMPTS).max(1),
            sign_out_retry_delay: Duration::from_millis(parse_or(
                &lookup,
                "SESSION_SIGN_OUT_RETRY_MS",
                DEFAULT_SIGN_OUT_RETRY_MS,
            )),
            missing_account: parse_missing_account(lookup("SESSION_MISSING_ACCOUNT").as_deref())?,
        })
    }

    /// Message shown to a user whose account was just suspended.
    #[must_use]
    pub fn suspension_notice(&self) -> String {
        format!(
            "Your account has been suspended. Please contact us at {} to appeal.",
            self.support_email
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn parse_missing_account(raw: Option<&str>) -> Result<MissingAccountPolicy, ConfigError> {
    match raw.map(str::trim).unwrap_or("allow") {
        "" | "allow" => Ok(MissingAccountPolicy::Allow),
        "block" => Ok(MissingAccountPolicy::Block),
        other => Err(ConfigError::Invalid {
            var: "SESSION_MISSING_ACCOUNT",
            value: other.to_owned(),
            expected: "expected 'allow' or 'block'",
        }),
    }
}
