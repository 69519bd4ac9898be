use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use meetpulse_core::RequestContext;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub const SESSION_COOKIE: &str = "token";

/// Resolve the caller from the session cookie (or a bearer token) and attach
/// a [`RequestContext`] to the request. Requests without a valid session
/// continue as anonymous; each handler's policy check decides what that means.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = match session_token(req.headers(), &jar) {
        Some(token) => run_blocking(&state, move |s| s.gate.resolve_session(&token)).await?,
        None => RequestContext::anonymous(),
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    bearer
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        assert_eq!(session_token(&headers, &jar).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        assert_eq!(
            session_token(&HeaderMap::new(), &jar).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(session_token(&HeaderMap::new(), &CookieJar::new()), None);
    }
}
