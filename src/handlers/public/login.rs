// handlers/public/login.rs - GET/POST /login and POST /logout

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::Redirect;
use crate::middleware::response::{escape, page};
use crate::session::SessionHandle;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// GET /login - the sign-in form. A visitor who is already signed in goes
/// straight home.
pub async fn login_form(State(state): State<AppState>, session: SessionHandle) -> Response {
    if session.is_valid().await {
        return Redirect::found(state.config.routes.home.clone()).into_response();
    }
    login_page(None).into_response()
}

/// POST /login
///
/// Success sets the session cookie and answers 303 to the home page. Every
/// failure shows the same generic message.
pub async fn login_submit(
    State(state): State<AppState>,
    session: SessionHandle,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            login_page(Some("Username and password required")),
        )
            .into_response();
    }

    match session.login(username, &form.password).await {
        Ok(_) => Redirect::see_other(state.config.routes.home.clone()).into_response(),
        Err(_) => (StatusCode::UNAUTHORIZED, login_page(Some("Invalid credentials"))).into_response(),
    }
}

/// POST /logout - always lands on the login page.
pub async fn logout(State(state): State<AppState>, session: SessionHandle) -> Redirect {
    session.logout().await;
    Redirect::see_other(state.config.routes.login.clone())
}

fn login_page(error: Option<&str>) -> Html<String> {
    let notice = error
        .map(|msg| format!("<p role=\"alert\">{}</p>", escape(msg)))
        .unwrap_or_default();

    page(
        "Sign in",
        &format!(
            "<h1>Sign in</h1>{notice}\
             <form method=\"post\" action=\"/login\">\
             <label>Username <input name=\"username\" autocomplete=\"username\"></label>\
             <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\
             <button type=\"submit\">Sign in</button>\
             </form>"
        ),
    )
}
