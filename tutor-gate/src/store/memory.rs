//! In-process entitlement store
//!
//! Same privilege rules as the SQLite store. Writes can be made to fail on
//! demand, which is how persistence-failure paths are exercised in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{check_access, EntitlementStore, StoreError, StoreResult, WriteAccess};
use crate::models::{EntitlementPatch, Identity, UserEntitlement};

#[derive(Debug, Default)]
pub struct MemoryEntitlementStore {
    users: RwLock<BTreeMap<Identity, UserEntitlement>>,
    grants: RwLock<HashSet<(Identity, Identity)>>,
    fail_user_updates: AtomicBool,
    fail_elevated_updates: AtomicBool,
    fail_inserts: AtomicBool,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make user-scoped updates fail with a backend error
    pub fn fail_user_updates(&self, fail: bool) {
        self.fail_user_updates.store(fail, Ordering::SeqCst);
    }

    /// Make elevated updates fail with a backend error
    pub fn fail_elevated_updates(&self, fail: bool) {
        self.fail_elevated_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of referral grants recorded
    pub async fn grant_count(&self) -> usize {
        self.grants.read().await.len()
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Backend(format!("injected {} failure", what))
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn find_by_identity(&self, identity: &Identity) -> StoreResult<Option<UserEntitlement>> {
        Ok(self.users.read().await.get(identity).cloned())
    }

    async fn update(
        &self,
        identity: &Identity,
        patch: &EntitlementPatch,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement> {
        check_access(patch, access)?;

        let failing = match access {
            WriteAccess::User => &self.fail_user_updates,
            WriteAccess::Elevated => &self.fail_elevated_updates,
        };
        if failing.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }

        let mut users = self.users.write().await;
        let record = users
            .get_mut(identity)
            .ok_or_else(|| StoreError::NotFound(identity.clone()))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn add_bonus(
        &self,
        identity: &Identity,
        amount: u32,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement> {
        check_access(&EntitlementPatch::bonus(amount), access)?;
        if self.fail_elevated_updates.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }

        let mut users = self.users.write().await;
        let record = users
            .get_mut(identity)
            .ok_or_else(|| StoreError::NotFound(identity.clone()))?;
        record.bonus_allowance = record.bonus_allowance.saturating_add(amount);
        Ok(record.clone())
    }

    async fn insert(&self, record: &UserEntitlement) -> StoreResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }

        let mut users = self.users.write().await;
        if users.contains_key(&record.identity) {
            return Err(StoreError::AlreadyExists(record.identity.clone()));
        }
        users.insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<UserEntitlement>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn list_referred_by(&self, referrer: &Identity) -> StoreResult<Vec<Identity>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.referred_by.as_ref() == Some(referrer))
            .map(|u| u.identity.clone())
            .collect())
    }

    async fn record_referral_grant(
        &self,
        referrer: &Identity,
        referee: &Identity,
    ) -> StoreResult<bool> {
        Ok(self
            .grants
            .write()
            .await
            .insert((referrer.clone(), referee.clone())))
    }
}
