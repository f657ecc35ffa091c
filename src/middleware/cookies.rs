use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::session::SessionCookie;

/// Encrypted session cookie carrying the serialized [`SessionCookie`].
pub(super) fn session_cookie(
    name: &str,
    payload: &SessionCookie,
    max_age_days: i64,
    secure: bool,
) -> Result<Cookie<'static>, serde_json::Error> {
    let value = serde_json::to_string(payload)?;

    Ok(Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(max_age_days))
        .build())
}

/// Create removal cookie for session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Parse the decrypted cookie value.
pub(super) fn read_session_cookie(cookie: &Cookie<'_>) -> Result<SessionCookie, serde_json::Error> {
    serde_json::from_str(cookie.value())
}
