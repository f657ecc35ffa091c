use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{AuthError, ServiceClient};
use crate::error::{PortalResult, Redirect};
use crate::session::{SessionHandle, SessionState};

/// A [`ServiceClient`] acting on behalf of the current session.
///
/// Outgoing requests carry the session's bearer token, refreshed first when
/// it has expired. A 401 from the backend either ends the session (expired or
/// revoked token) or is handed back untouched (the token is fine, the user
/// just lacks permission). Requests are never retried.
pub struct Authorized<'a> {
    client: &'a ServiceClient,
    session: &'a SessionHandle,
}

impl<'a> Authorized<'a> {
    pub(super) fn new(client: &'a ServiceClient, session: &'a SessionHandle) -> Self {
        Self { client, session }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(path)
    }

    /// Send a request built from this client.
    pub async fn send(&self, builder: RequestBuilder) -> PortalResult<Response> {
        let builder = match self.bearer().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::transport(self.client.name(), e))?;

        self.after_receive(response).await
    }

    /// `GET path` decoded as JSON. Non-success statuses become errors.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortalResult<T> {
        let response = self.send(self.get(path)).await?;
        let response = self.require_success(response)?;

        response.json::<T>().await.map_err(|e| {
            AuthError::Decode {
                service: self.client.name(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// `DELETE path`, ignoring any response body.
    pub async fn delete(&self, path: &str) -> PortalResult<()> {
        let response = self.send(self.request(Method::DELETE, path)).await?;
        self.require_success(response)?;
        Ok(())
    }

    fn require_success(&self, response: Response) -> PortalResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(AuthError::Rejected {
            service: self.client.name(),
            status: response.status().as_u16(),
        }
        .into())
    }

    /// Token to attach, renewing it first if it has expired. A failed
    /// refresh sends the request anonymously and lets the backend decide.
    async fn bearer(&self) -> Option<String> {
        match self.session.state().await {
            SessionState::Active => return self.session.tokens().await.map(|t| t.access_token),
            SessionState::AccessExpired => {}
            SessionState::RefreshExpired => {
                self.session.expire().await;
                return None;
            }
            SessionState::Absent => return None,
        }

        match self.session.refresh().await {
            Ok(renewed) => Some(renewed.access_token),
            Err(e) => {
                tracing::debug!("Proactive refresh before {} request failed: {}", self.client.name(), e);
                None
            }
        }
    }

    async fn after_receive(&self, response: Response) -> PortalResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return self.recover_unauthorized(response).await;
        }

        if status.is_server_error() {
            tracing::error!(
                "{} service answered {} for {}",
                self.client.name(),
                status,
                response.url().path()
            );
        }

        Ok(response)
    }

    async fn recover_unauthorized(&self, response: Response) -> PortalResult<Response> {
        let login = self.session.manager().login_path().to_string();

        if !self.session.is_valid().await {
            tracing::info!("{} service rejected an invalid session", self.client.name());
            self.session.expire().await;
            return Err(Redirect::found(login).into());
        }

        let Some(tokens) = self.session.tokens().await else {
            self.session.clear().await;
            return Err(Redirect::found(login).into());
        };

        match self.session.manager().auth().me(&tokens.access_token).await {
            Ok(_) => {
                // Token still accepted by the auth service: a permission problem
                tracing::debug!("{} service answered 401 to a valid token", self.client.name());
                Ok(response)
            }
            Err(e) => {
                tracing::info!("Session token no longer accepted ({}); ending session", e);
                self.session.clear().await;
                Err(Redirect::found(login).into())
            }
        }
    }
}
