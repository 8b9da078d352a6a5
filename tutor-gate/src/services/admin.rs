//! Administrator dashboard operations
//!
//! Only the configured admin identity may use these; with no admin
//! configured every call is refused.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::models::{EntitlementPatch, Identity, UserEntitlement};
use crate::store::{EntitlementStore, StoreError, WriteAccess};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Administrator access required")]
    NotAdmin,

    #[error("User not found: {0}")]
    NotFound(Identity),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub identity: Identity,
    pub is_unlimited: bool,
    pub requests_used_today: u32,
    pub last_request_date: Option<NaiveDate>,
    pub bonus_allowance: u32,
    pub daily_limit: u32,
    pub referred_by: Option<Identity>,
}

impl UserSummary {
    fn from_record(record: UserEntitlement, base_allowance: u32) -> Self {
        Self {
            daily_limit: record.daily_limit(base_allowance),
            identity: record.identity,
            is_unlimited: record.is_unlimited,
            requests_used_today: record.requests_used_today,
            last_request_date: record.last_request_date,
            bonus_allowance: record.bonus_allowance,
            referred_by: record.referred_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub total_users: usize,
    pub total_bonus_granted: u64,
    pub successful_referrals: usize,
    pub users: Vec<UserSummary>,
}

pub struct AdminService {
    store: Arc<dyn EntitlementStore>,
    admin: Option<Identity>,
    base_allowance: u32,
}

impl AdminService {
    pub fn new(store: Arc<dyn EntitlementStore>, admin: Option<Identity>, base_allowance: u32) -> Self {
        Self {
            store,
            admin,
            base_allowance,
        }
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admin.as_ref() == Some(identity)
    }

    fn require_admin(&self, actor: &Identity) -> Result<(), AdminError> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            Err(AdminError::NotAdmin)
        }
    }

    /// Every user except the admin, with totals
    pub async fn overview(&self, actor: &Identity) -> Result<AdminOverview, AdminError> {
        self.require_admin(actor)?;

        let users: Vec<UserSummary> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|u| !self.is_admin(&u.identity))
            .map(|u| UserSummary::from_record(u, self.base_allowance))
            .collect();

        Ok(AdminOverview {
            total_users: users.len(),
            total_bonus_granted: users.iter().map(|u| u64::from(u.bonus_allowance)).sum(),
            successful_referrals: users.iter().filter(|u| u.referred_by.is_some()).count(),
            users,
        })
    }

    /// Set a user's bonus and unlimited flag (elevated path)
    pub async fn update_privileges(
        &self,
        actor: &Identity,
        target: &Identity,
        bonus_allowance: u32,
        is_unlimited: bool,
    ) -> Result<UserSummary, AdminError> {
        self.require_admin(actor)?;

        let record = self
            .store
            .update(
                target,
                &EntitlementPatch::privileges(bonus_allowance, is_unlimited),
                WriteAccess::Elevated,
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound(id) => AdminError::NotFound(id),
                other => AdminError::Store(other),
            })?;

        info!(admin = %actor, target = %target, bonus_allowance, is_unlimited, "Privileges updated");
        Ok(UserSummary::from_record(record, self.base_allowance))
    }
}
