use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use url::Url;

use super::store::{StoreError, StoredCredentials, TokenStore};
use crate::auth::{Principal, TokenPair};
use crate::clock::Clock;
use crate::config::StoreConfig;

const PRINCIPAL_FIELD: &str = "principal";
const TOKENS_FIELD: &str = "tokens";

// Swap one field of an existing hash. ARGV[3] > 0 also resets the TTL.
const REPLACE_FIELD: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
local ttl = tonumber(ARGV[3])
if ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return 1
";

/// Credentials kept in Redis so sessions survive restarts and are shared
/// between portal instances.
///
/// One hash per principal holding the JSON `principal` and `tokens` fields.
/// Entries expire with their refresh token.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
    clock: Arc<dyn Clock>,
    prefix: String,
    replace_field: Script,
}

impl RedisTokenStore {
    pub async fn connect(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("REDIS_URL is not set".to_string()))?;
        let url = connection_url(url, config.redis_password.as_deref())?;

        let client = redis::Client::open(url.as_str()).map_err(unavailable)?;
        let conn = client.get_connection_manager().await.map_err(unavailable)?;

        tracing::info!("Token store connected to Redis at {}", redacted(&url));
        Ok(Self {
            conn,
            clock,
            prefix: config.key_prefix.clone(),
            replace_field: Script::new(REPLACE_FIELD),
        })
    }

    fn key(&self, principal_id: &str) -> String {
        format!("{}{}", self.prefix, principal_id)
    }

    fn ttl(&self, tokens: &TokenPair) -> i64 {
        ttl_secs(tokens, self.clock.now_secs())
    }

    async fn replace(&self, principal_id: &str, field: &str, value: String, ttl: i64) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let replaced: i64 = self
            .replace_field
            .key(self.key(principal_id))
            .arg(field)
            .arg(value)
            .arg(ttl)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(replaced == 1)
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, principal_id: &str, credentials: StoredCredentials) -> Result<(), StoreError> {
        let key = self.key(principal_id);
        let principal = encode(&key, &credentials.principal)?;
        let tokens = encode(&key, &credentials.tokens)?;
        let ttl = self.ttl(&credentials.tokens);

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(&key)
            .ignore()
            .cmd("HSET")
            .arg(&key)
            .arg(PRINCIPAL_FIELD)
            .arg(principal)
            .arg(TOKENS_FIELD)
            .arg(tokens)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, principal_id: &str) -> Result<Option<StoredCredentials>, StoreError> {
        let key = self.key(principal_id);
        let mut conn = self.conn.clone();
        let (principal, tokens): (Option<String>, Option<String>) = redis::cmd("HMGET")
            .arg(&key)
            .arg(PRINCIPAL_FIELD)
            .arg(TOKENS_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        match (principal, tokens) {
            (None, None) => Ok(None),
            (Some(principal), Some(tokens)) => Ok(Some(StoredCredentials {
                principal: decode(&key, &principal)?,
                tokens: decode(&key, &tokens)?,
            })),
            _ => Err(StoreError::Corrupt {
                key,
                reason: "entry is missing a field".to_string(),
            }),
        }
    }

    async fn clear(&self, principal_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(principal_id)).await.map_err(unavailable)?;
        Ok(())
    }

    async fn replace_tokens(&self, principal_id: &str, tokens: TokenPair) -> Result<bool, StoreError> {
        let value = encode(&self.key(principal_id), &tokens)?;
        let ttl = self.ttl(&tokens);
        self.replace(principal_id, TOKENS_FIELD, value, ttl).await
    }

    async fn replace_principal(&self, principal_id: &str, principal: Principal) -> Result<bool, StoreError> {
        let value = encode(&self.key(principal_id), &principal)?;
        self.replace(principal_id, PRINCIPAL_FIELD, value, 0).await
    }
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Seconds until the refresh token dies, never less than one.
fn ttl_secs(tokens: &TokenPair, now_secs: i64) -> i64 {
    (tokens.refresh_expiry - now_secs).max(1)
}

/// `REDIS_URL` with `REDIS_PASSWORD` applied, unless the URL carries its own.
fn connection_url(raw: &str, password: Option<&str>) -> Result<Url, StoreError> {
    let mut url = Url::parse(raw).map_err(|e| StoreError::Unavailable(format!("invalid REDIS_URL: {}", e)))?;

    if let Some(password) = password {
        if url.password().is_none() && url.set_password(Some(password)).is_err() {
            return Err(StoreError::Unavailable("REDIS_URL cannot carry a password".to_string()));
        }
    }
    Ok(url)
}

fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(refresh_expiry: i64) -> TokenPair {
        TokenPair {
            access_token: "access".into(),
            access_expiry: refresh_expiry - 100,
            refresh_token: "refresh".into(),
            refresh_expiry,
        }
    }

    #[test]
    fn ttl_follows_refresh_expiry() {
        assert_eq!(ttl_secs(&tokens(1_000), 400), 600);
        // Already dead entries still get a positive TTL so EXPIRE drops them
        assert_eq!(ttl_secs(&tokens(1_000), 2_000), 1);
    }

    #[test]
    fn password_is_applied_once() {
        let url = connection_url("redis://cache:6379/0", Some("hunter2")).unwrap();
        assert_eq!(url.password(), Some("hunter2"));
        assert_eq!(url.host_str(), Some("cache"));

        let url = connection_url("redis://:inline@cache:6379", Some("hunter2")).unwrap();
        assert_eq!(url.password(), Some("inline"));

        let url = connection_url("redis://cache:6379", None).unwrap();
        assert_eq!(url.password(), None);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            connection_url("not a url", None),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn logged_url_hides_password() {
        let url = connection_url("redis://cache:6379", Some("hunter2")).unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("cache:6379"));
    }

    #[test]
    fn decode_reports_key() {
        let err = decode::<TokenPair>("admin-portal:session:1", "{").unwrap_err();
        match err {
            StoreError::Corrupt { key, .. } => assert_eq!(key, "admin-portal:session:1"),
            other => panic!("expected corrupt entry, got {:?}", other),
        }
    }
}
