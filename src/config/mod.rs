use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub backends: BackendConfig,
    pub store: StoreConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Master secret for the cookie encryption key. At least 64 bytes.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub max_age_days: i64,
    pub inactivity_secs: i64,
    pub touch_interval_secs: i64,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub auth_url: String,
    pub posts_url: String,
    pub assets_url: String,
    pub request_timeout_secs: u64,
}

/// Where credentials live. Without a Redis URL the portal keeps them in
/// process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(skip_serializing)]
    pub redis_url: Option<String>,
    #[serde(skip_serializing)]
    pub redis_password: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub login: String,
    pub home: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("PORTAL_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORTAL_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Session overrides
        if let Some(v) = lookup("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Some(v) = lookup("SESSION_SECRET") {
            self.session.secret = Some(v);
        }
        if let Some(v) = lookup("SESSION_MAX_AGE_DAYS") {
            self.session.max_age_days = v.parse().unwrap_or(self.session.max_age_days);
        }
        if let Some(v) = lookup("SESSION_INACTIVITY_SECS") {
            self.session.inactivity_secs = v.parse().unwrap_or(self.session.inactivity_secs);
        }
        if let Some(v) = lookup("SESSION_TOUCH_INTERVAL_SECS") {
            self.session.touch_interval_secs = v.parse().unwrap_or(self.session.touch_interval_secs);
        }
        if let Some(v) = lookup("SESSION_SECURE_COOKIES") {
            self.session.secure_cookies = v.parse().unwrap_or(self.session.secure_cookies);
        }

        // Backend overrides
        if let Some(v) = lookup("AUTH_API") {
            self.backends.auth_url = v;
        }
        if let Some(v) = lookup("POSTS_API") {
            self.backends.posts_url = v;
        }
        if let Some(v) = lookup("ASSETS_API") {
            self.backends.assets_url = v;
        }
        if let Some(v) = lookup("BACKEND_TIMEOUT_SECS") {
            self.backends.request_timeout_secs = v.parse().unwrap_or(self.backends.request_timeout_secs);
        }

        // Token store overrides
        if let Some(v) = lookup("REDIS_URL") {
            self.store.redis_url = Some(v);
        }
        if let Some(v) = lookup("REDIS_PASSWORD") {
            self.store.redis_password = Some(v);
        }
        if let Some(v) = lookup("REDIS_KEY_PREFIX") {
            self.store.key_prefix = v;
        }

        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            session: SessionConfig::defaults(false),
            backends: BackendConfig {
                auth_url: "http://127.0.0.1:4000".to_string(),
                posts_url: "http://127.0.0.1:4001".to_string(),
                assets_url: "http://127.0.0.1:4002".to_string(),
                request_timeout_secs: 10,
            },
            store: StoreConfig::defaults(),
            routes: RouteConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            session: SessionConfig::defaults(true),
            backends: BackendConfig {
                auth_url: "http://auth:8080".to_string(),
                posts_url: "http://posts:8080".to_string(),
                assets_url: "http://assets:8080".to_string(),
                request_timeout_secs: 5,
            },
            store: StoreConfig::defaults(),
            routes: RouteConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            session: SessionConfig::defaults(true),
            backends: BackendConfig {
                auth_url: "http://auth:8080".to_string(),
                posts_url: "http://posts:8080".to_string(),
                assets_url: "http://assets:8080".to_string(),
                request_timeout_secs: 5,
            },
            store: StoreConfig::defaults(),
            routes: RouteConfig::default(),
        }
    }
}

impl SessionConfig {
    fn defaults(secure_cookies: bool) -> Self {
        Self {
            cookie_name: "admin_session".to_string(),
            secret: None,
            max_age_days: 7,
            inactivity_secs: 60 * 60, // 1 hour
            touch_interval_secs: 60,
            secure_cookies,
        }
    }
}

impl StoreConfig {
    fn defaults() -> Self {
        Self {
            redis_url: None,
            redis_password: None,
            key_prefix: "admin-portal:session:".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            home: "/".to_string(),
        }
    }
}
