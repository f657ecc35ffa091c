// Runs against a live Redis when REDIS_URL is set; skipped otherwise.

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;

use admin_portal::auth::permissions::{READ_ASSET, READ_POST};
use admin_portal::auth::{Principal, TokenPair};
use admin_portal::clock::{Clock, ManualClock};
use admin_portal::config::AppConfig;
use admin_portal::session::{RedisTokenStore, StoredCredentials, TokenStore};

async fn connect() -> Result<Option<(RedisTokenStore, Arc<ManualClock>)>> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set; skipping");
        return Ok(None);
    };

    let prefix = format!("admin-portal-test:{}:", std::process::id());
    let config = AppConfig::from_lookup(|key| match key {
        "REDIS_URL" => Some(url.clone()),
        "REDIS_KEY_PREFIX" => Some(prefix.clone()),
        _ => None,
    });

    let clock = Arc::new(ManualClock::starting_now());
    let store = RedisTokenStore::connect(&config.store, clock.clone()).await?;
    Ok(Some((store, clock)))
}

fn credentials(clock: &ManualClock, access_token: &str) -> StoredCredentials {
    let now = clock.now_secs();
    StoredCredentials {
        principal: Principal::new("42", "redis-user", [READ_POST, READ_ASSET]),
        tokens: TokenPair {
            access_token: access_token.into(),
            access_expiry: now + Duration::minutes(15).num_seconds(),
            refresh_token: "refresh".into(),
            refresh_expiry: now + Duration::days(7).num_seconds(),
        },
    }
}

#[tokio::test]
async fn entry_round_trips_and_clears() -> Result<()> {
    let Some((store, clock)) = connect().await? else {
        return Ok(());
    };

    let stored = credentials(&clock, "a1");
    store.put("41", stored.clone()).await?;
    assert_eq!(store.get("41").await?, Some(stored));

    store.clear("41").await?;
    store.clear("41").await?;
    assert_eq!(store.get("41").await?, None);
    Ok(())
}

#[tokio::test]
async fn replacements_keep_the_other_half() -> Result<()> {
    let Some((store, clock)) = connect().await? else {
        return Ok(());
    };

    let original = credentials(&clock, "a1");
    store.put("42", original.clone()).await?;

    let renewed = credentials(&clock, "a2").tokens;
    assert!(store.replace_tokens("42", renewed.clone()).await?);
    let fetched = store.get("42").await?.expect("entry");
    assert_eq!(fetched.tokens, renewed);
    assert_eq!(fetched.principal, original.principal);

    let demoted = Principal::new("42", "redis-user", [READ_POST]);
    assert!(store.replace_principal("42", demoted.clone()).await?);
    let fetched = store.get("42").await?.expect("entry");
    assert_eq!(fetched.principal, demoted);
    assert_eq!(fetched.tokens, renewed);

    store.clear("42").await?;
    assert!(!store.replace_tokens("42", renewed).await?);
    assert!(!store.replace_principal("42", demoted).await?);
    assert_eq!(store.get("42").await?, None);
    Ok(())
}
