use reqwest::StatusCode;

use super::{AuthError, ServiceClient};
use crate::auth::{AuthTokens, LoginRequest, Principal, RefreshRequest, TokenPair};

/// Calls to the auth service made by the session layer itself.
///
/// Login and refresh are anonymous; `/me` carries the bearer token it is
/// asked to verify.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ServiceClient,
}

impl AuthApi {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// `POST /auth/login`
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post("/auth/login")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::transport(self.client.name(), e))?;

        match response.status() {
            status if status.is_success() => self.decode_tokens(response).await,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(AuthError::InvalidCredentials)
            }
            status => Err(AuthError::Rejected {
                service: self.client.name(),
                status: status.as_u16(),
            }),
        }
    }

    /// `POST /auth/refresh`
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let body = RefreshRequest {
            refresher: refresh_token.to_string(),
        };

        let response = self
            .client
            .post("/auth/refresh")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::transport(self.client.name(), e))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                service: self.client.name(),
                status: response.status().as_u16(),
            });
        }

        self.decode_tokens(response).await
    }

    /// `GET /me`, also used as the check that tells an expired or revoked
    /// token apart from a permission problem.
    pub async fn me(&self, access_token: &str) -> Result<Principal, AuthError> {
        let response = self
            .client
            .get("/me")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::transport(self.client.name(), e))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                service: self.client.name(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<Principal>()
            .await
            .map_err(|e| AuthError::Decode {
                service: self.client.name(),
                reason: e.to_string(),
            })
    }

    async fn decode_tokens(&self, response: reqwest::Response) -> Result<TokenPair, AuthError> {
        response
            .json::<AuthTokens>()
            .await
            .map(TokenPair::from)
            .map_err(|e| AuthError::Decode {
                service: self.client.name(),
                reason: e.to_string(),
            })
    }
}
