//! Entitlement persistence
//!
//! One record per user, read and updated by identity. Two write paths
//! exist: the user-scoped path may only touch usage counters and
//! preferences; bonus, unlimited flag and password need
//! [`WriteAccess::Elevated`]. Both implementations enforce this split.

mod memory;
mod sqlite;

pub use memory::MemoryEntitlementStore;
pub use sqlite::SqliteEntitlementStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EntitlementPatch, Identity, UserEntitlement};

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found: {0}")]
    NotFound(Identity),

    #[error("User already exists: {0}")]
    AlreadyExists(Identity),

    #[error("Field '{0}' requires elevated access")]
    PermissionDenied(&'static str),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Credential used for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAccess {
    /// Acting as the authenticated user on their own record
    User,
    /// Service credential: cross-account grants, passwords, admin edits
    Elevated,
}

/// Refuse privileged fields on the user-scoped path
pub(crate) fn check_access(patch: &EntitlementPatch, access: WriteAccess) -> StoreResult<()> {
    match (access, patch.privileged_field()) {
        (WriteAccess::User, Some(field)) => Err(StoreError::PermissionDenied(field)),
        _ => Ok(()),
    }
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn find_by_identity(&self, identity: &Identity) -> StoreResult<Option<UserEntitlement>>;

    /// Apply `patch` and return the updated record
    async fn update(
        &self,
        identity: &Identity,
        patch: &EntitlementPatch,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement>;

    /// Raise the referral bonus by `amount` in one store-side step and
    /// return the updated record
    async fn add_bonus(
        &self,
        identity: &Identity,
        amount: u32,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement>;

    async fn insert(&self, record: &UserEntitlement) -> StoreResult<()>;

    /// Every record, ordered by identity
    async fn list_all(&self) -> StoreResult<Vec<UserEntitlement>>;

    /// Identities whose `referred_by` is `referrer`, ordered
    async fn list_referred_by(&self, referrer: &Identity) -> StoreResult<Vec<Identity>>;

    /// Record that `referrer` was paid for `referee`.
    ///
    /// Returns `false` when the pair was already recorded.
    async fn record_referral_grant(
        &self,
        referrer: &Identity,
        referee: &Identity,
    ) -> StoreResult<bool>;
}
