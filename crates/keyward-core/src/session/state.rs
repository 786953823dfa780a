use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CredentialPair, Profile};

/// Where the single per-process session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl SessionState {
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionState::LoggedOut => "logged out",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        }
    }

    /// Holds credentials (possibly mid-rotation)
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Refreshing)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(d.as_millis().min(i64::MAX as u128) as i64)
}

/// An access credential and when it was issued. Memory only.
#[derive(Clone)]
pub(crate) struct AccessGrant {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(token: String) -> Self {
        Self {
            token,
            issued_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() >= self.issued_at + to_chrono(ttl)
    }

    /// Check if the credential will expire within `buffer` and should be refreshed
    pub fn needs_refresh(&self, ttl: Duration, buffer: Duration) -> bool {
        let refresh_at = self.issued_at + to_chrono(ttl) - to_chrono(buffer);
        Utc::now() >= refresh_at
    }

    pub fn time_until_expiry(&self, ttl: Duration) -> chrono::Duration {
        self.issued_at + to_chrono(ttl) - Utc::now()
    }
}

/// The session record. Only the session manager touches it, always under its lock.
pub(crate) struct Session {
    pub state: SessionState,
    pub access: Option<AccessGrant>,
    pub refresh_token: Option<String>,
    pub profile: Option<Profile>,
    /// Bumped whenever a session begins or ends; results captured under an
    /// older epoch must not be applied.
    pub epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::LoggedOut,
            access: None,
            refresh_token: None,
            profile: None,
            epoch: 0,
        }
    }

    /// Start a new session lifetime, returning its epoch
    pub fn begin(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Replace both credentials in one step and mark the session authenticated
    pub fn install(&mut self, pair: CredentialPair) {
        self.access = Some(AccessGrant::new(pair.access_token));
        self.refresh_token = Some(pair.refresh_token);
        self.state = SessionState::Authenticated;
    }

    /// Drop everything and end the current epoch
    pub fn reset(&mut self) {
        self.state = SessionState::LoggedOut;
        self.access = None;
        self.refresh_token = None;
        self.profile = None;
        self.epoch += 1;
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access.as_ref().map(|g| g.token.as_str())
    }
}

/// Secret-free view of the session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub has_refresh_token: bool,
    pub profile: Option<Profile>,
    /// Seconds until the access credential lapses, if one is held
    pub access_expires_in_secs: Option<i64>,
    /// The held access credential has outlived its TTL and will be refreshed on next use
    pub access_expired: bool,
}

impl SessionSnapshot {
    pub(crate) fn of(session: &Session, ttl: Duration) -> Self {
        Self {
            state: session.state,
            has_refresh_token: session.refresh_token.is_some(),
            profile: session.profile.clone(),
            access_expires_in_secs: session
                .access
                .as_ref()
                .map(|g| g.time_until_expiry(ttl).num_seconds().max(0)),
            access_expired: session.access.as_ref().is_some_and(|g| g.is_expired(ttl)),
        }
    }
}
