// handlers/protected/resources.rs - pass-through pages backed by the
// posts, assets and auth services

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::permissions::{DELETE_POST, READ_ASSET, READ_POST, READ_USER};
use crate::error::ApiError;
use crate::middleware::{require_capability, ApiResponse, ApiResult, CurrentUser};
use crate::session::SessionHandle;

/// GET /posts
pub async fn posts_list(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
) -> ApiResult<Value> {
    require_capability(&principal, &READ_POST)?;

    let posts = state.backends.posts.authorized(&session).get_json("/posts").await?;
    Ok(ApiResponse::success(posts))
}

/// GET /posts/:slug
pub async fn post_get(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    require_capability(&principal, &READ_POST)?;
    let path = post_path(&slug)?;

    let post = state.backends.posts.authorized(&session).get_json(&path).await?;
    Ok(ApiResponse::success(post))
}

/// DELETE /posts/:slug
pub async fn post_delete(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
    Path(slug): Path<String>,
) -> ApiResult<()> {
    require_capability(&principal, &DELETE_POST)?;
    let path = post_path(&slug)?;

    state.backends.posts.authorized(&session).delete(&path).await?;
    tracing::info!("'{}' deleted post '{}'", principal.display_name, slug);
    Ok(ApiResponse::with_status((), StatusCode::NO_CONTENT))
}

/// GET /assets
pub async fn assets_list(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
) -> ApiResult<Value> {
    require_capability(&principal, &READ_ASSET)?;

    let assets = state.backends.assets.authorized(&session).get_json("/assets").await?;
    Ok(ApiResponse::success(assets))
}

/// GET /users - listed by the auth service
pub async fn users_list(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    session: SessionHandle,
) -> ApiResult<Value> {
    require_capability(&principal, &READ_USER)?;

    let users = state.backends.auth.authorized(&session).get_json("/users").await?;
    Ok(ApiResponse::success(users))
}

fn post_path(slug: &str) -> Result<String, ApiError> {
    if slug.is_empty() || slug.contains(['/', '?', '#']) || slug == "." || slug == ".." {
        return Err(ApiError::bad_request("Invalid post slug"));
    }
    Ok(format!("/posts/{}", slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_path_rejects_traversal() {
        assert_eq!(post_path("hello-world").unwrap(), "/posts/hello-world");
        assert!(post_path("..").is_err());
        assert!(post_path("a/b").is_err());
        assert!(post_path("").is_err());
    }
}
