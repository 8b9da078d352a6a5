//! Session middleware plus register / login / logout
//!
//! A successful login or registration opens a session and returns its
//! token. Protected routes read the token from `x-session-token`; the
//! middleware resolves it and hands the session to the handler as an
//! extension.

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::{Registration, REFERRAL_PARAM};
use crate::session::{QuotaView, SessionHandle, UserSession};
use crate::AppState;

pub const SESSION_HEADER: &str = "x-session-token";

/// Session resolved by [`session_middleware`]
#[derive(Clone)]
pub struct CurrentSession {
    pub token: Uuid,
    pub handle: SessionHandle,
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", SESSION_HEADER)))?;

    let token = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::Unauthorized("Malformed session token".to_string()))?;

    let handle = state
        .sessions
        .get(&token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Session expired or unknown".to_string()))?;

    request
        .extensions_mut()
        .insert(CurrentSession { token, handle });

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub ref_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    #[serde(default)]
    pub ref_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: Uuid,
    pub email: String,
    pub quota: QuotaView,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub referred_by: Option<String>,
    pub bonus_granted: bool,
}

/// POST /api/register
///
/// The referral tag may come in the body or, as in a shared link, as the
/// `ref_code` query parameter; the body wins.
pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let referral_tag = body.ref_code.or(query.ref_code);
    debug!(param = REFERRAL_PARAM, tag = ?referral_tag, "Registration received");

    let registered = state
        .accounts
        .register(Registration {
            email: body.email,
            password: body.password,
            password_confirm: body.password_confirm,
            referral_tag,
        })
        .await?;

    let session = UserSession::load(registered.record, state.clock.today());
    let session = open_session(&state, session).await;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            session,
            referred_by: registered.referral.referrer.map(|r| r.to_string()),
            bonus_granted: registered.referral.bonus_granted,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.accounts.login(&body.email, &body.password).await?;
    Ok(Json(open_session(&state, session).await))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> StatusCode {
    state.sessions.close(&current.token).await;
    StatusCode::NO_CONTENT
}

async fn open_session(state: &AppState, session: UserSession) -> SessionResponse {
    let email = session.identity().to_string();
    let quota = session.quota_view(state.settings.daily_base_allowance);
    let token = state.sessions.open(session).await;
    SessionResponse { token, email, quota }
}
