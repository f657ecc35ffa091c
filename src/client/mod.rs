//! Typed boundary to the external services.
//!
//! One [`ServiceClient`] per backend, all built once from [`BackendConfig`]
//! and shared through [`Backends`]. Calls that need the user's bearer token
//! go through [`ServiceClient::authorized`], which applies the session
//! middleware in `middleware.rs`.

pub mod auth_api;
pub mod error;
pub mod middleware;

use reqwest::{Method, RequestBuilder};
use url::Url;

use crate::config::BackendConfig;
use crate::session::SessionHandle;

pub use auth_api::AuthApi;
pub use error::AuthError;
pub use middleware::Authorized;

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid base URL '{url}' for {service} service: {source}")]
    InvalidUrl {
        service: &'static str,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client bound to one backend's base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    name: &'static str,
    base_url: String,
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(name: &'static str, base_url: &str, http: reqwest::Client) -> Result<Self, ClientBuildError> {
        Url::parse(base_url).map_err(|source| ClientBuildError::InvalidUrl {
            service: name,
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Absolute URL for `path`, keeping any path prefix of the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// This client with the session's credentials applied.
    pub fn authorized<'a>(&'a self, session: &'a SessionHandle) -> Authorized<'a> {
        Authorized::new(self, session)
    }
}

/// All backends the portal talks to.
#[derive(Debug, Clone)]
pub struct Backends {
    pub auth: ServiceClient,
    pub posts: ServiceClient,
    pub assets: ServiceClient,
}

impl Backends {
    pub fn from_config(config: &BackendConfig) -> Result<Self, ClientBuildError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            auth: ServiceClient::new("auth", &config.auth_url, http.clone())?,
            posts: ServiceClient::new("posts", &config.posts_url, http.clone())?,
            assets: ServiceClient::new("assets", &config.assets_url, http)?,
        })
    }
}
