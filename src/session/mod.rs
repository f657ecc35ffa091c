//! Session lifecycle.
//!
//! A session is split in two: the encrypted browser cookie carries only
//! [`SessionCookie`] (principal id and activity timestamps), and the
//! [`TokenStore`] holds the principal snapshot and its [`TokenPair`] keyed by
//! principal id. Revoking the store entry invalidates every session of that
//! principal at once.
//!
//! ```text
//! Absent --login--> Active --access expiry--> AccessExpired --refresh--> Active
//!                                                   |
//!                      refresh expiry / inactivity / max age
//!                                                   v
//!                                             RefreshExpired --any access--> Absent
//! ```

pub mod handle;
pub mod manager;
pub mod redis_store;
pub mod refresh;
pub mod store;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::{Principal, TokenPair};
use crate::config::SessionConfig;

pub use handle::{CookieChange, SessionHandle};
pub use manager::SessionManager;
pub use redis_store::RedisTokenStore;
pub use refresh::RefreshError;
pub use store::{MemoryTokenStore, StoreError, StoredCredentials, TokenStore};

/// Cookie payload. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub principal_id: String,
    pub login_at: i64,
    pub last_activity_at: i64,
}

impl SessionCookie {
    pub fn new(principal_id: impl Into<String>, now_millis: i64) -> Self {
        Self {
            principal_id: principal_id.into(),
            login_at: now_millis,
            last_activity_at: now_millis,
        }
    }
}

/// Assembled view of one session: cookie plus store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: Principal,
    pub tokens: TokenPair,
    pub login_at: i64,
    pub last_activity_at: i64,
}

impl Session {
    pub fn assemble(cookie: &SessionCookie, credentials: StoredCredentials) -> Self {
        Self {
            principal: credentials.principal,
            tokens: credentials.tokens,
            login_at: cookie.login_at,
            last_activity_at: cookie.last_activity_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Active,
    AccessExpired,
    RefreshExpired,
}

/// Timing rules applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Absolute lifetime measured from login.
    pub max_age: Duration,
    pub inactivity: Duration,
    /// Activity touches closer together than this are coalesced.
    pub touch_interval: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(7),
            inactivity: Duration::hours(1),
            touch_interval: Duration::minutes(1),
        }
    }
}

impl SessionPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            max_age: Duration::days(config.max_age_days),
            inactivity: Duration::seconds(config.inactivity_secs),
            touch_interval: Duration::seconds(config.touch_interval_secs),
        }
    }

    pub fn is_inactive(&self, cookie: &SessionCookie, now_millis: i64) -> bool {
        now_millis - cookie.last_activity_at > self.inactivity.num_milliseconds()
    }

    pub fn is_too_old(&self, cookie: &SessionCookie, now_millis: i64) -> bool {
        now_millis - cookie.login_at > self.max_age.num_milliseconds()
    }

    pub fn touch_due(&self, cookie: &SessionCookie, now_millis: i64) -> bool {
        now_millis - cookie.last_activity_at >= self.touch_interval.num_milliseconds()
    }
}

/// Classify a session at `now_millis`. Pure: no store access, no refresh.
pub fn evaluate(
    cookie: Option<&SessionCookie>,
    credentials: Option<&StoredCredentials>,
    now_millis: i64,
    policy: &SessionPolicy,
) -> SessionState {
    let (Some(cookie), Some(credentials)) = (cookie, credentials) else {
        return SessionState::Absent;
    };

    if credentials.principal.id != cookie.principal_id {
        return SessionState::Absent;
    }

    let now_secs = now_millis.div_euclid(1000);
    let tokens = &credentials.tokens;

    if policy.is_inactive(cookie, now_millis)
        || policy.is_too_old(cookie, now_millis)
        || !tokens.is_consistent()
        || tokens.refresh_expired(now_secs)
    {
        return SessionState::RefreshExpired;
    }

    if tokens.access_expired(now_secs) {
        return SessionState::AccessExpired;
    }

    SessionState::Active
}
