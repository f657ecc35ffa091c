use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::auth::permissions::{self, Capability, READ_ASSET, READ_POST, READ_USER};
use crate::auth::Principal;
use crate::error::{ApiError, PortalError, PortalResult, Redirect};
use crate::session::{SessionHandle, SessionState};

/// Gate a protected page.
///
/// Returns the principal of a valid session and records activity. An access
/// token that has merely expired is refreshed first. Anything else ends in
/// a redirect to the login page, clearing whatever session was left.
pub async fn protect(session: &SessionHandle) -> PortalResult<Principal> {
    let login = session.manager().login_path().to_string();

    match session.state().await {
        SessionState::Active => {}
        SessionState::AccessExpired => {
            if let Err(e) = session.refresh().await {
                tracing::info!("Session could not be refreshed: {}", e);
                return Err(Redirect::found(login).into());
            }
        }
        SessionState::RefreshExpired => {
            tracing::info!("Session expired; redirecting to {}", login);
            session.expire().await;
            return Err(Redirect::found(login).into());
        }
        SessionState::Absent => {
            session.forget();
            return Err(Redirect::found(login).into());
        }
    }

    let Some(principal) = session.principal().await else {
        session.expire().await;
        return Err(Redirect::found(login).into());
    };

    session.touch();
    Ok(principal)
}

/// Principal of the guarded request. Extracting it runs [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionHandle::from_request_parts(parts, state).await?;
        protect(&session).await.map(CurrentUser)
    }
}

pub fn require_capability(principal: &Principal, capability: &Capability) -> Result<(), ApiError> {
    if permissions::has_capability(Some(principal), capability) {
        return Ok(());
    }

    tracing::warn!("'{}' lacks capability '{}'", principal.display_name, capability);
    Err(ApiError::forbidden("Permission denied"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
}

/// Dashboard sections the principal may open.
pub fn navigation(principal: &Principal) -> Vec<NavItem> {
    let sections = [
        (NavItem { label: "Dashboard", href: "/" }, None),
        (NavItem { label: "Posts", href: "/posts" }, Some(READ_POST)),
        (NavItem { label: "Assets", href: "/assets" }, Some(READ_ASSET)),
        (NavItem { label: "Users", href: "/users" }, Some(READ_USER)),
        (NavItem { label: "Profile", href: "/me" }, None),
    ];

    sections
        .into_iter()
        .filter(|(_, required)| {
            required
                .as_ref()
                .map_or(true, |capability| permissions::has_capability(Some(principal), capability))
        })
        .map(|(item, _)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{DELETE_POST, READ_ASSET};

    #[test]
    fn navigation_follows_permissions() {
        let viewer = Principal::new("u-1", "viewer", [READ_POST]);
        let labels: Vec<_> = navigation(&viewer).into_iter().map(|item| item.label).collect();
        assert_eq!(labels, vec!["Dashboard", "Posts", "Profile"]);
    }

    #[test]
    fn require_capability_denies_missing() {
        let principal = Principal::new("u-1", "alice", [READ_ASSET]);
        assert!(require_capability(&principal, &READ_ASSET).is_ok());

        let err = require_capability(&principal, &DELETE_POST).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
