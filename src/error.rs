// HTTP-facing error and control-flow types
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::client::AuthError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (backend service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 504 Gateway Timeout
    GatewayTimeout(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::GatewayTimeout(_) => 504,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::GatewayTimeout(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        ApiError::GatewayTimeout(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            AuthError::Timeout(service) => {
                tracing::warn!("Request to {} service timed out", service);
                ApiError::gateway_timeout(format!("The {} service did not respond in time", service))
            }
            AuthError::Transport { service, source } => {
                tracing::error!("Transport error talking to {} service: {}", service, source);
                ApiError::bad_gateway(format!("The {} service is unreachable", service))
            }
            AuthError::Rejected { status, .. } if status == 401 || status == 403 => {
                ApiError::forbidden("Permission denied")
            }
            AuthError::Rejected { status: 404, .. } => ApiError::not_found("Not found"),
            AuthError::Rejected { status, .. } if (400..500).contains(&status) => {
                ApiError::bad_request("The request was rejected")
            }
            AuthError::Rejected { service, status } => {
                tracing::error!("{} service answered {}", service, status);
                ApiError::bad_gateway(format!("The {} service returned an error", service))
            }
            AuthError::Decode { service, reason } => {
                tracing::error!("Undecodable response from {} service: {}", service, reason);
                ApiError::bad_gateway(format!("The {} service returned an unexpected response", service))
            }
            AuthError::Refresh(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                ApiError::unauthorized("Session expired")
            }
            AuthError::Store(e) => {
                tracing::error!("Token store error: {}", e);
                ApiError::service_unavailable("Session storage temporarily unavailable")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// Deliberate transfer of control to another location. Not an error: every
/// layer passes it through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub status: StatusCode,
}

impl Redirect {
    /// 302, used when a guard bounces a visitor.
    pub fn found(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: StatusCode::FOUND,
        }
    }

    /// 303, used after a form POST.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: StatusCode::SEE_OTHER,
        }
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        (self.status, [(header::LOCATION, self.location)]).into_response()
    }
}

/// Result type of anything that runs inside a page request: either a
/// redirect signal or a real error.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("redirect to {}", .0.location)]
    Redirect(Redirect),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PortalError {
    pub fn is_redirect(&self) -> bool {
        matches!(self, PortalError::Redirect(_))
    }
}

impl From<Redirect> for PortalError {
    fn from(redirect: Redirect) -> Self {
        PortalError::Redirect(redirect)
    }
}

impl From<AuthError> for PortalError {
    fn from(err: AuthError) -> Self {
        PortalError::Api(err.into())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        match self {
            PortalError::Redirect(redirect) => redirect.into_response(),
            PortalError::Api(err) => err.into_response(),
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_renders_location_header() {
        let response = Redirect::found("/login").into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn redirect_survives_portal_error_conversion() {
        let err: PortalError = Redirect::see_other("/").into();
        assert!(err.is_redirect());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn permission_rejections_map_to_forbidden() {
        let err = ApiError::from(AuthError::Rejected { service: "posts", status: 403 });
        assert_eq!(err.status_code(), 403);
        let err = ApiError::from(AuthError::Rejected { service: "posts", status: 500 });
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn api_error_body_shape() {
        let body = ApiError::not_found("missing").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing");
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
