use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, header},
    middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;
use crate::{admin, auth, meetings, pulse};

/// Every MeetPulse route, with the session layer and security headers
/// applied. CORS and request tracing are left to the binary.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/me", get(auth::me))
        .route("/profile", get(auth::profile))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signup/verify", post(auth::signup_verify))
        .route("/auth/login", post(auth::login))
        .route("/auth/login/verify", post(auth::login_verify))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/meetings",
            get(meetings::list_meetings).post(meetings::create_meeting),
        )
        .route(
            "/meetings/{id}/questions",
            get(meetings::list_questions).post(meetings::add_question),
        )
        .route("/questions/{id}/vote", post(meetings::vote_question))
        .route("/meetings/{id}/pulse", get(pulse::get_pulse))
        .route("/pulse/options/{id}/vote", post(pulse::vote_option))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/approve", post(admin::approve_user))
        .route("/admin/users/{id}/toggle-admin", post(admin::toggle_admin))
        .route("/admin/meetings", get(admin::list_meetings))
        .route(
            "/admin/meetings/{id}/toggle-visibility",
            post(admin::toggle_visibility),
        )
        .route("/admin/questions", get(admin::list_questions))
        .route("/admin/questions/{id}", delete(admin::delete_question))
        .route(
            "/admin/meeting-questions/{id}",
            get(admin::meeting_questions),
        )
        .route(
            "/admin/pulse",
            get(admin::pulse_view).post(admin::start_pulse),
        )
        .route("/admin/pulse/{id}/end", post(admin::end_pulse))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::resolve_session,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
        ))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
