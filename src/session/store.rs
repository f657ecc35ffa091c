use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::auth::{Principal, TokenPair};
use crate::clock::Clock;

/// Everything the server keeps for a principal between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub principal: Principal,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),

    #[error("unreadable token store entry for '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Keyed persistence of credentials, one entry per principal id.
///
/// Each method is a single atomic operation on one key. Implementations
/// must not hold a lock across an await of their own I/O.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Overwrites any existing entry.
    async fn put(&self, principal_id: &str, credentials: StoredCredentials) -> Result<(), StoreError>;

    async fn get(&self, principal_id: &str) -> Result<Option<StoredCredentials>, StoreError>;

    /// Idempotent: clearing a missing entry is not an error.
    async fn clear(&self, principal_id: &str) -> Result<(), StoreError>;

    /// Swap the token pair, keeping the principal. Returns false if the
    /// entry no longer exists.
    async fn replace_tokens(&self, principal_id: &str, tokens: TokenPair) -> Result<bool, StoreError>;

    /// Swap the principal snapshot, keeping the tokens.
    async fn replace_principal(&self, principal_id: &str, principal: Principal) -> Result<bool, StoreError>;
}

/// Process-local store. Good for a single portal instance and for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, StoredCredentials>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop entries whose refresh token has expired. Returns how many went.
    pub async fn purge_expired(&self, now_secs: i64) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, creds| !creds.tokens.refresh_expired(now_secs));
        before - entries.len()
    }

    /// Purge expired entries every `every`. The task stops once the store
    /// itself is dropped.
    pub fn spawn_purge(self: &Arc<Self>, clock: Arc<dyn Clock>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired(clock.now_secs()).await;
                if purged > 0 {
                    tracing::debug!("Purged {} expired session entries", purged);
                }
            }
        })
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, principal_id: &str, credentials: StoredCredentials) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(principal_id.to_string(), credentials);
        Ok(())
    }

    async fn get(&self, principal_id: &str) -> Result<Option<StoredCredentials>, StoreError> {
        Ok(self.entries.read().await.get(principal_id).cloned())
    }

    async fn clear(&self, principal_id: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(principal_id);
        Ok(())
    }

    async fn replace_tokens(&self, principal_id: &str, tokens: TokenPair) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(principal_id) {
            Some(entry) => {
                entry.tokens = tokens;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_principal(&self, principal_id: &str, principal: Principal) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(principal_id) {
            Some(entry) => {
                entry.principal = principal;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
