// handlers/protected/dashboard.rs - GET / and GET /me

use axum::{extract::Query, response::Html};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PortalError;
use crate::middleware::response::{escape, page};
use crate::middleware::{navigation, ApiResponse, ApiResult, CurrentUser};
use crate::session::SessionHandle;

/// GET / - greeting plus the sections this user may open.
pub async fn dashboard(CurrentUser(principal): CurrentUser) -> Html<String> {
    let links: String = navigation(&principal)
        .iter()
        .map(|item| format!("<li><a href=\"{}\">{}</a></li>", item.href, item.label))
        .collect();

    page(
        "Dashboard",
        &format!(
            "<h1>Welcome, {}</h1><nav><ul>{}</ul></nav>\
             <form method=\"post\" action=\"/logout\"><button type=\"submit\">Sign out</button></form>",
            escape(&principal.display_name),
            links
        ),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct MeQuery {
    #[serde(default)]
    pub reload: bool,
}

/// GET /me[?reload=true]
///
/// The session's principal snapshot. `reload` re-fetches it from the auth
/// service first so permission changes show up without signing in again.
pub async fn me(
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
    Query(query): Query<MeQuery>,
) -> ApiResult<Value> {
    let principal = if query.reload {
        session.reload_principal().await.map_err(PortalError::from)?
    } else {
        principal
    };

    Ok(ApiResponse::success(json!({
        "user": principal,
        "navigation": navigation(&principal),
    })))
}
