//! Admin dashboard endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use super::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::models::Identity;
use crate::services::{AdminOverview, UserSummary};
use crate::AppState;

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<AdminOverview>> {
    let actor = current.handle.lock().await.identity().clone();
    Ok(Json(state.admin.overview(&actor).await?))
}

#[derive(Debug, Deserialize)]
pub struct PrivilegeUpdate {
    pub bonus_allowance: i64,
    pub is_unlimited: bool,
}

/// PUT /api/admin/users/:email
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(email): Path<String>,
    Json(body): Json<PrivilegeUpdate>,
) -> ApiResult<Json<UserSummary>> {
    let actor = current.handle.lock().await.identity().clone();
    let target = Identity::parse(&email)?;
    let bonus = u32::try_from(body.bonus_allowance).map_err(|_| {
        ApiError::BadRequest(format!(
            "bonus_allowance must be between 0 and {}, got {}",
            u32::MAX,
            body.bonus_allowance
        ))
    })?;

    let summary = state
        .admin
        .update_privileges(&actor, &target, bonus, body.is_unlimited)
        .await?;
    Ok(Json(summary))
}
