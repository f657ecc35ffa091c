use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::PrivateCookieJar;

use super::cookies::{clear_session_cookie, read_session_cookie, session_cookie};
use crate::app::AppState;
use crate::session::{CookieChange, SessionHandle};

/// Decrypt the session cookie into a [`SessionHandle`] for the handlers, then
/// write whatever cookie change they recorded back onto the response.
///
/// A cookie that decrypts but does not parse is removed.
pub async fn session_cookie_middleware(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> (PrivateCookieJar, Response) {
    let settings = &state.config.session;

    let mut corrupt = false;
    let cookie = jar.get(&settings.cookie_name).and_then(|raw| match read_session_cookie(&raw) {
        Ok(cookie) => Some(cookie),
        Err(e) => {
            tracing::warn!("Discarding unreadable session cookie: {}", e);
            corrupt = true;
            None
        }
    });

    let handle = SessionHandle::new(state.sessions.clone(), cookie);
    request.extensions_mut().insert(handle.clone());

    let response = next.run(request).await;

    let jar = match handle.take_change() {
        CookieChange::Set(payload) => {
            match session_cookie(&settings.cookie_name, &payload, settings.max_age_days, settings.secure_cookies) {
                Ok(cookie) => jar.add(cookie),
                Err(e) => {
                    tracing::error!("Failed to encode session cookie: {}", e);
                    jar
                }
            }
        }
        CookieChange::Removed => jar.remove(clear_session_cookie(&settings.cookie_name)),
        CookieChange::Unchanged if corrupt => jar.remove(clear_session_cookie(&settings.cookie_name)),
        CookieChange::Unchanged => jar,
    };

    (jar, response)
}
