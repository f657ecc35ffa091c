use crate::session::{RefreshError, StoreError};

/// Failures talking to a backend service on behalf of the session layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Deliberately vague: never says which of username/password was wrong.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} service timed out")]
    Timeout(&'static str),

    #[error("transport error talking to {service} service: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} service rejected the request with status {status}")]
    Rejected { service: &'static str, status: u16 },

    #[error("unexpected response from {service} service: {reason}")]
    Decode { service: &'static str, reason: String },

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Classify a reqwest failure, separating timeouts from other transport errors.
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            AuthError::Timeout(service)
        } else if source.is_decode() {
            AuthError::Decode {
                service,
                reason: source.to_string(),
            }
        } else {
            AuthError::Transport { service, source }
        }
    }
}
