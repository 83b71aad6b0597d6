use super::store::{Advance, CredentialStore};
use super::{
    compute_tag, AuthError, AuthFailure, Secret, TagAlgorithm, ValidityWindow,
    COUNTER_GRACE_SECS, REVOCATION_MIN_TTL_SECS,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Lifecycle of a credential as observed by the gate.
///
/// `Fresh -> Authenticated -> Revoked`; `Expired` is reachable from any state
/// once the validity window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Fresh,
    Authenticated,
    Revoked,
    Expired,
}

/// Decides whether a request may proceed.
pub struct AuthGate {
    store: Arc<dyn CredentialStore>,
    secret: Option<Secret>,
    window: Option<ValidityWindow>,
    algorithm: TagAlgorithm,
}

impl AuthGate {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        secret: Option<Secret>,
        window: Option<ValidityWindow>,
        algorithm: TagAlgorithm,
    ) -> Self {
        Self {
            store,
            secret,
            window,
            algorithm,
        }
    }

    pub fn window(&self) -> Option<&ValidityWindow> {
        self.window.as_ref()
    }

    /// Checks that need no credential state: window, provisioned secret, tag.
    pub fn precheck(&self, now: DateTime<Utc>, tag: Option<&str>) -> Result<(), AuthFailure> {
        match self.window {
            Some(window) if window.is_open(now) => {}
            _ => return Err(AuthFailure::Expired),
        }
        if self.secret.is_none() {
            return Err(AuthFailure::NoCredential);
        }
        match tag {
            Some(tag) if !tag.is_empty() => Ok(()),
            _ => Err(AuthFailure::MissingTag),
        }
    }

    /// Run the full counter protocol.
    ///
    /// The counter advances before the tag is compared, so a wrong tag still
    /// consumes the counter value it was tried against.
    pub fn authenticate(&self, now: DateTime<Utc>, tag: Option<&str>) -> Result<Session, AuthError> {
        self.precheck(now, tag).map_err(AuthError::Denied)?;

        let (Some(secret), Some(window), Some(tag)) = (&self.secret, self.window, tag) else {
            return Err(AuthError::Denied(AuthFailure::MissingTag));
        };

        let credential_id = secret.credential_id();
        let ttl = window.remaining(now) + Duration::seconds(COUNTER_GRACE_SECS);

        let previous = match self.store.advance(&credential_id, ttl, now)? {
            Advance::Revoked { value } => {
                tracing::warn!(credential = %short_id(&credential_id), value, "revoked credential presented");
                return Err(AuthError::Denied(AuthFailure::Revoked));
            }
            Advance::Advanced { previous } => previous,
        };

        let expected = compute_tag(self.algorithm, secret, previous);
        let matches = expected.len() == tag.len()
            && bool::from(expected.as_bytes().ct_eq(tag.as_bytes()));
        if !matches {
            tracing::warn!(credential = %short_id(&credential_id), counter = previous, "tag mismatch");
            return Err(AuthError::Denied(AuthFailure::BadCredential));
        }

        tracing::debug!(credential = %short_id(&credential_id), counter = previous, "authenticated");
        Ok(Session {
            store: Arc::clone(&self.store),
            credential_id,
            window,
            counter: previous,
        })
    }

    /// Current state of the credential, for diagnostics.
    pub fn state(&self, now: DateTime<Utc>) -> Result<GateState, AuthError> {
        if !self.window.is_some_and(|w| w.is_open(now)) {
            return Ok(GateState::Expired);
        }
        let Some(secret) = &self.secret else {
            return Ok(GateState::Fresh);
        };
        let state = match self.store.get(&secret.credential_id(), now)? {
            Some(v) if v < 0 => GateState::Revoked,
            Some(v) if v > 0 => GateState::Authenticated,
            _ => GateState::Fresh,
        };
        Ok(state)
    }
}

/// An authenticated request. Owns what `die` needs to revoke the credential.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
    credential_id: String,
    window: ValidityWindow,
    counter: i64,
}

impl Session {
    /// Counter value this request's tag was checked against.
    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn window(&self) -> &ValidityWindow {
        &self.window
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.window.remaining(now)
    }

    /// Permanently disable the credential for the rest of its life.
    pub fn revoke(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
        let ttl = self
            .window
            .remaining(now)
            .max(Duration::seconds(REVOCATION_MIN_TTL_SECS));
        self.store.set(&self.credential_id, -1, ttl, now)?;
        tracing::info!(credential = %short_id(&self.credential_id), "credential revoked");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credential", &short_id(&self.credential_id))
            .field("counter", &self.counter)
            .finish()
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
