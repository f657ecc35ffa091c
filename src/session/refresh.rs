use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::auth::TokenPair;

/// Why a refresh did not produce a usable token pair. Cloneable so that
/// every request waiting on the same in-flight refresh gets the outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no session to refresh")]
    NoSession,

    #[error("refresh token expired")]
    Expired,

    #[error("refresh token rejected by the auth service")]
    Rejected,

    #[error("auth service unavailable: {0}")]
    Unavailable(String),

    #[error("token store failure: {0}")]
    Store(String),
}

pub type RefreshOutcome = Result<TokenPair, RefreshError>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Single-flight table: at most one refresh per principal at a time.
/// Later callers await the first caller's future instead of starting
/// their own. The table lock is only held to look up or insert.
#[derive(Default)]
pub(crate) struct RefreshGate {
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl RefreshGate {
    pub(crate) async fn run<F>(&self, key: &str, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let (future, leader) = {
            let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match table.get(key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let future = start().shared();
                    table.insert(key.to_string(), future.clone());
                    (future, true)
                }
            }
        };

        if !leader {
            tracing::debug!("Joining in-flight token refresh for '{}'", key);
        }

        let outcome = future.clone().await;

        let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if table.get(key).is_some_and(|current| current.ptr_eq(&future)) {
            table.remove(key);
        }

        outcome
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
