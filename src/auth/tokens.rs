use serde::{Deserialize, Serialize};

/// Access and refresh credentials with their expiries (epoch seconds).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expiry: i64,
    pub refresh_token: String,
    pub refresh_expiry: i64,
}

impl TokenPair {
    pub fn access_expired(&self, now_secs: i64) -> bool {
        self.access_expiry <= now_secs
    }

    pub fn refresh_expired(&self, now_secs: i64) -> bool {
        self.refresh_expiry <= now_secs
    }

    /// An access token outliving its refresh token can't be trusted.
    pub fn is_consistent(&self) -> bool {
        self.access_expiry <= self.refresh_expiry
    }
}

// Tokens never end up in logs
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_token", &"<redacted>")
            .field("refresh_expiry", &self.refresh_expiry)
            .finish()
    }
}

/// Token response body of `POST /auth/login` and `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub jwt: ExpiringToken,
    pub refresher: ExpiringToken,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExpiringToken {
    pub token: String,
    pub exp: i64,
}

impl std::fmt::Debug for ExpiringToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringToken")
            .field("token", &"<redacted>")
            .field("exp", &self.exp)
            .finish()
    }
}

impl From<AuthTokens> for TokenPair {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.jwt.token,
            access_expiry: tokens.jwt.exp,
            refresh_token: tokens.refresher.token,
            refresh_expiry: tokens.refresher.exp,
        }
    }
}

impl From<TokenPair> for AuthTokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            jwt: ExpiringToken {
                token: pair.access_token,
                exp: pair.access_expiry,
            },
            refresher: ExpiringToken {
                token: pair.refresh_token,
                exp: pair.refresh_expiry,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresher: String,
}
