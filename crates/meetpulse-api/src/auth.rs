use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, Uri},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::error;

use meetpulse_core::{CoreError, RequestContext};
use meetpulse_core::identity::Verified;
use meetpulse_types::api::{
    CodeSentResponse, LoginRequest, MeResponse, OkResponse, ProfileResponse, SignupRequest,
    VerifyRequest, VerifyResponse,
};
use meetpulse_types::models::{OtpPurpose, ProfileFields};

use crate::error::ApiError;
use crate::middleware::SESSION_COOKIE;
use crate::state::{AppState, run_blocking};

pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<CodeSentResponse>, ApiError> {
    let Json(req) = body?;
    let profile = ProfileFields {
        name: Some(req.name),
        phone: Some(req.phone),
        bio: Some(req.bio),
    };

    let email = run_blocking(&state, move |s| {
        s.gate.initiate(&req.email, OtpPurpose::Signup, profile)
    })
    .await?;

    Ok(Json(CodeSentResponse {
        step: "verify",
        email,
    }))
}

pub async fn signup_verify(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<VerifyResponse>), ApiError> {
    verify(state, uri, headers, jar, body?.0, OtpPurpose::Signup).await
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<CodeSentResponse>, ApiError> {
    let Json(req) = body?;
    let email = run_blocking(&state, move |s| {
        s.gate
            .initiate(&req.email, OtpPurpose::Login, ProfileFields::default())
    })
    .await?;

    Ok(Json(CodeSentResponse {
        step: "verify",
        email,
    }))
}

pub async fn login_verify(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<VerifyResponse>), ApiError> {
    verify(state, uri, headers, jar, body?.0, OtpPurpose::Login).await
}

async fn verify(
    state: AppState,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    req: VerifyRequest,
    purpose: OtpPurpose,
) -> Result<(CookieJar, Json<VerifyResponse>), ApiError> {
    let Verified { step, user, token } =
        run_blocking(&state, move |s| s.gate.verify(&req.email, &req.code, purpose)).await?;

    let cookie = session_cookie(token, state.session_ttl_secs, is_https(&uri, &headers))?;
    Ok((jar.add(cookie), Json(VerifyResponse { step, user })))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<OkResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(OkResponse::ok()))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<MeResponse>, ApiError> {
    run_blocking(&state, move |s| s.gate.current_user(&ctx))
        .await?
        .map(Json)
        .ok_or(ApiError::Core(CoreError::Unauthorized))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    run_blocking(&state, move |s| s.directory.profile(&ctx))
        .await
        .map(Json)
}

fn is_https(uri: &Uri, headers: &HeaderMap) -> bool {
    uri.scheme_str() == Some("https")
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

fn session_cookie(
    token: String,
    max_age_secs: i64,
    secure: bool,
) -> Result<Cookie<'static>, ApiError> {
    let mut cookie = Cookie::parse(format!("{SESSION_COOKIE}={token}; Max-Age={max_age_secs}"))
        .map_err(|e| {
            error!("Failed to build session cookie: {}", e);
            ApiError::Internal
        })?;

    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(secure);
    Ok(cookie)
}
