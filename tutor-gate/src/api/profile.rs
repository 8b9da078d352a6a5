//! Quota, preferences and password of the logged-in user

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use super::auth::CurrentSession;
use crate::error::ApiResult;
use crate::models::Preferences;
use crate::session::QuotaView;
use crate::AppState;

/// GET /api/quota
///
/// Reads the session's live counter without reserving anything.
pub async fn get_quota(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Json<QuotaView> {
    let session = current.handle.lock().await;
    Json(session.quota_view(state.settings.daily_base_allowance))
}

/// GET /api/preferences
pub async fn get_preferences(Extension(current): Extension<CurrentSession>) -> Json<Preferences> {
    let session = current.handle.lock().await;
    Json(session.entitlement().preferences.clone())
}

/// PUT /api/preferences
pub async fn put_preferences(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(preferences): Json<Preferences>,
) -> ApiResult<Json<Preferences>> {
    let mut session = current.handle.lock().await;
    let saved = state
        .accounts
        .update_preferences(&mut session, preferences)
        .await?;
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(body): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    let identity = current.handle.lock().await.identity().clone();
    state
        .accounts
        .change_password(&identity, &body.new_password, &body.confirm_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
