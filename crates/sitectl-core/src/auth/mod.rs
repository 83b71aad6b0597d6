//! Counter-based, time-windowed authentication.
//!
//! Flow:
//! 1. Stateless precheck: window open, secret provisioned, tag supplied
//! 2. Advance the credential counter atomically (every attempt consumes one)
//! 3. Compare the tag against `digest(secret || previous_counter)`

mod gate;
pub mod schema;
pub mod store;

pub use gate::{AuthGate, GateState, Session};
pub use store::{Advance, CredentialStore, SqliteCredentialStore, StoreError};

use crate::errors::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Default validity window length in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 180;

/// Counter records outlive the window by this much.
pub const COUNTER_GRACE_SECS: i64 = 60;

/// Minimum lifetime of a revocation record.
pub const REVOCATION_MIN_TTL_SECS: i64 = 200;

/// Shared secret. Never printed through `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Stable identity of the credential: `hex(sha256(secret))`.
    pub fn credential_id(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Digest used to derive tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl TagAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }
}

impl std::str::FromStr for TagAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unknown tag algorithm '{other}' (expected md5 or sha256)")),
        }
    }
}

/// `hex(digest(secret || decimal(counter)))`, lowercase.
pub fn compute_tag(algorithm: TagAlgorithm, secret: &Secret, counter: i64) -> String {
    let material = format!("{}{}", secret.expose(), counter);
    match algorithm {
        TagAlgorithm::Md5 => format!("{:x}", md5::compute(material.as_bytes())),
        TagAlgorithm::Sha256 => hex::encode(Sha256::digest(material.as_bytes())),
    }
}

/// Fixed span after provisioning during which requests are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub issued_at: DateTime<Utc>,
    pub length: Duration,
}

impl ValidityWindow {
    pub fn new(issued_at: DateTime<Utc>, length_secs: u64) -> Self {
        let secs = i64::try_from(length_secs).unwrap_or(i64::MAX / 1_000);
        Self {
            issued_at,
            length: Duration::seconds(secs),
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.issued_at + self.length
    }

    /// Time left before the window closes; negative once closed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.end() - now
    }

    /// Open strictly before `end()`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.end()
    }
}

/// Why a request was refused before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Expired,
    NoCredential,
    MissingTag,
    Revoked,
    BadCredential,
}

impl AuthFailure {
    /// Short code used in `NOAUTH:<code>:<message>` replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::NoCredential => "NoCredential",
            Self::MissingTag => "MissingTag",
            Self::Revoked => "Revoked",
            Self::BadCredential => "BadCredential",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Expired => "This endpoint has expired.",
            Self::NoCredential => "No authentication credentials were found.",
            Self::MissingTag => "Authentication failure: did not provide a credential.",
            Self::Revoked => "Authentication failure: the supplied credential has been revoked.",
            Self::BadCredential => "Authentication failure: did not provide a valid credential.",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Expired => ErrorKind::AuthExpired,
            Self::NoCredential | Self::MissingTag => ErrorKind::AuthMissingCredential,
            Self::Revoked => ErrorKind::AuthRevoked,
            Self::BadCredential => ErrorKind::AuthBadCredential,
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    Denied(AuthFailure),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Denied(failure) => failure.kind(),
            Self::Store(_) => ErrorKind::FatalStoreError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_md5_tag_matches_known_digest() {
        // md5("secret0")
        let tag = compute_tag(TagAlgorithm::Md5, &Secret::new("secret"), 0);
        assert_eq!(tag, format!("{:x}", md5::compute(b"secret0")));
        assert_eq!(tag.len(), 32);
    }

    #[test]
    fn test_sha256_tag_is_hex() {
        let tag = compute_tag(TagAlgorithm::Sha256, &Secret::new("secret"), 12);
        assert_eq!(tag, hex::encode(Sha256::digest(b"secret12")));
    }

    #[test]
    fn test_negative_counter_renders_with_sign() {
        let a = compute_tag(TagAlgorithm::Md5, &Secret::new("s"), -1);
        assert_eq!(a, format!("{:x}", md5::compute(b"s-1")));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
    }

    #[test]
    fn test_window_boundaries() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let window = ValidityWindow::new(issued, 180);
        assert!(window.is_open(issued));
        assert!(window.is_open(issued + Duration::seconds(179)));
        assert!(!window.is_open(issued + Duration::seconds(180)));
        assert!(!window.is_open(issued + Duration::seconds(181)));
        assert_eq!(window.remaining(issued + Duration::seconds(30)).num_seconds(), 150);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("MD5".parse::<TagAlgorithm>().unwrap(), TagAlgorithm::Md5);
        assert_eq!("sha256".parse::<TagAlgorithm>().unwrap(), TagAlgorithm::Sha256);
        assert!("sha1".parse::<TagAlgorithm>().is_err());
    }
}
