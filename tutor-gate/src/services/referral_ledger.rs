//! Referral bonuses
//!
//! A referrer earns a permanent daily bonus for every new user that
//! registers with their referral tag. The bonus is written through the
//! elevated path because the referrer is not the acting user. Each
//! (referrer, referee) pair pays out at most once.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::models::Identity;
use crate::store::{EntitlementStore, StoreResult, WriteAccess};

/// Query parameter carrying the referrer's identity
pub const REFERRAL_PARAM: &str = "ref_code";

/// Result of processing a registration's referral tag
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferralOutcome {
    /// Value for the new record's `referred_by`
    pub referrer: Option<Identity>,
    pub bonus_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralStatistics {
    pub base_allowance: u32,
    pub bonus_allowance: u32,
    pub daily_total: u32,
    pub referral_count: usize,
    pub referred_users: Vec<Identity>,
}

pub struct ReferralLedger {
    store: Arc<dyn EntitlementStore>,
    bonus: u32,
}

impl ReferralLedger {
    pub fn new(store: Arc<dyn EntitlementStore>, bonus: u32) -> Self {
        Self { store, bonus }
    }

    pub fn bonus(&self) -> u32 {
        self.bonus
    }

    /// Credit the referrer named by `tag`, if any.
    ///
    /// Runs once during registration, before the new record is inserted.
    /// Never fails: a lost bonus is logged and registration goes on.
    pub async fn grant_on_registration(
        &self,
        new_user: &Identity,
        tag: Option<&str>,
    ) -> ReferralOutcome {
        let Some(raw) = tag.map(str::trim).filter(|t| !t.is_empty()) else {
            return ReferralOutcome::default();
        };

        let referrer = match Identity::parse(raw) {
            Ok(id) => id,
            Err(e) => {
                warn!(new_user = %new_user, tag = raw, error = %e, "Ignoring malformed referral tag");
                return ReferralOutcome::default();
            }
        };

        if &referrer == new_user {
            warn!(new_user = %new_user, "Self-referral ignored");
            return ReferralOutcome::default();
        }

        match self.store.find_by_identity(&referrer).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(new_user = %new_user, referrer = %referrer, "Referral tag names no known user");
                return ReferralOutcome::default();
            }
            Err(e) => {
                error!(new_user = %new_user, referrer = %referrer, error = %e, "Referrer lookup failed");
                return ReferralOutcome::default();
            }
        }

        let bonus_granted = match self.pay_once(&referrer, new_user).await {
            Ok(granted) => granted,
            Err(e) => {
                error!(referrer = %referrer, new_user = %new_user, error = %e, "Referral bonus not granted");
                false
            }
        };

        ReferralOutcome {
            referrer: Some(referrer),
            bonus_granted,
        }
    }

    async fn pay_once(&self, referrer: &Identity, referee: &Identity) -> StoreResult<bool> {
        if !self.store.record_referral_grant(referrer, referee).await? {
            warn!(referrer = %referrer, referee = %referee, "Referral already paid, skipping");
            return Ok(false);
        }

        let updated = self
            .store
            .add_bonus(referrer, self.bonus, WriteAccess::Elevated)
            .await?;
        info!(
            referrer = %referrer,
            referee = %referee,
            bonus_allowance = updated.bonus_allowance,
            "Referral bonus granted"
        );
        Ok(true)
    }

    /// Referral figures for `identity`'s own page
    pub async fn statistics(&self, identity: &Identity, base_allowance: u32) -> StoreResult<ReferralStatistics> {
        let bonus_allowance = self
            .store
            .find_by_identity(identity)
            .await?
            .map(|r| r.bonus_allowance)
            .unwrap_or(0);
        let referred_users = self.store.list_referred_by(identity).await?;

        Ok(ReferralStatistics {
            base_allowance,
            bonus_allowance,
            daily_total: base_allowance.saturating_add(bonus_allowance),
            referral_count: referred_users.len(),
            referred_users,
        })
    }
}

/// Shareable sign-up link carrying `identity` as the referral tag.
///
/// Existing query parameters on `base_url` are kept; a previous
/// referral tag is replaced.
pub fn referral_link(base_url: &str, identity: &Identity) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| *k != REFERRAL_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(REFERRAL_PARAM, identity.as_str());

    Ok(url.to_string())
}
