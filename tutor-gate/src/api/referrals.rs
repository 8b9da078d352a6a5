//! GET /api/referrals - referral link and statistics

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use super::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::services::{referral_link, ReferralStatistics};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReferralsResponse {
    pub link: String,
    pub bonus_per_referral: u32,
    #[serde(flatten)]
    pub statistics: ReferralStatistics,
}

pub async fn get_referrals(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> ApiResult<Json<ReferralsResponse>> {
    let identity = current.handle.lock().await.identity().clone();

    let link = referral_link(&state.settings.public_base_url, &identity)
        .map_err(|e| ApiError::Internal(format!("public_base_url is not a valid URL: {}", e)))?;
    let statistics = state
        .referrals
        .statistics(&identity, state.settings.daily_base_allowance)
        .await?;

    Ok(Json(ReferralsResponse {
        link,
        bonus_per_referral: state.referrals.bonus(),
        statistics,
    }))
}
