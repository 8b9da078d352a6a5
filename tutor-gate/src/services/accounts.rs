//! Registration, login, preferences and password changes

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tutor_common::Clock;

use super::password::{hash_password, verify_password, HashError};
use super::referral_ledger::{ReferralLedger, ReferralOutcome};
use crate::models::{EntitlementPatch, Identity, IdentityError, Preferences, UserEntitlement};
use crate::session::UserSession;
use crate::store::{EntitlementStore, StoreError, WriteAccess};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid email: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,

    #[error("Email already registered: {0}")]
    AlreadyRegistered(Identity),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    NotFound(Identity),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    /// Value of the `ref_code` parameter the sign-up came with
    pub referral_tag: Option<String>,
}

#[derive(Debug)]
pub struct Registered {
    pub record: UserEntitlement,
    pub referral: ReferralOutcome,
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), AccountError> {
    if password != confirm {
        return Err(AccountError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::PasswordTooShort);
    }
    Ok(())
}

pub struct AccountService {
    store: Arc<dyn EntitlementStore>,
    referrals: Arc<ReferralLedger>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        referrals: Arc<ReferralLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            referrals,
            clock,
        }
    }

    /// Create a user record, crediting the referrer first.
    ///
    /// A failed bonus grant does not stop the registration.
    pub async fn register(&self, registration: Registration) -> Result<Registered, AccountError> {
        let identity = Identity::parse(&registration.email)?;
        check_new_password(&registration.password, &registration.password_confirm)?;

        if self.store.find_by_identity(&identity).await?.is_some() {
            return Err(AccountError::AlreadyRegistered(identity));
        }

        let password_hash = hash_password(&registration.password)?;
        let referral = self
            .referrals
            .grant_on_registration(&identity, registration.referral_tag.as_deref())
            .await;

        let record = UserEntitlement::new_registration(
            identity.clone(),
            password_hash,
            referral.referrer.clone(),
            self.clock.today(),
        );

        match self.store.insert(&record).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(id)) => return Err(AccountError::AlreadyRegistered(id)),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Registration insert failed");
                return Err(e.into());
            }
        }

        info!(
            identity = %identity,
            referred_by = ?referral.referrer.as_ref().map(Identity::as_str),
            bonus_granted = referral.bonus_granted,
            "User registered"
        );
        Ok(Registered { record, referral })
    }

    /// Verify credentials and load a session context
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSession, AccountError> {
        let identity = Identity::parse(email).map_err(|_| AccountError::InvalidCredentials)?;

        let record = match self.store.find_by_identity(&identity).await? {
            Some(record) if verify_password(password, &record.password_hash) => record,
            _ => {
                info!(identity = %identity, "Login rejected");
                return Err(AccountError::InvalidCredentials);
            }
        };

        info!(identity = %identity, "Login succeeded");
        Ok(UserSession::load(record, self.clock.today()))
    }

    /// Save preferences through the user-scoped path and refresh the session
    pub async fn update_preferences(
        &self,
        session: &mut UserSession,
        preferences: Preferences,
    ) -> Result<Preferences, AccountError> {
        let preferences = Preferences::from_stored(
            preferences.language.as_stored(),
            preferences.response_style.as_stored(),
            &preferences.school_level,
        );

        let record = self
            .store
            .update(
                session.identity(),
                &EntitlementPatch::preferences(preferences),
                WriteAccess::User,
            )
            .await
            .map_err(|e| not_found_or(e, session.identity()))?;

        let saved = record.preferences.clone();
        session.refresh(record);
        Ok(saved)
    }

    /// Replace the password hash (elevated path)
    pub async fn change_password(
        &self,
        identity: &Identity,
        new_password: &str,
        confirm: &str,
    ) -> Result<(), AccountError> {
        check_new_password(new_password, confirm)?;
        let hash = hash_password(new_password)?;

        self.store
            .update(identity, &EntitlementPatch::password_hash(hash), WriteAccess::Elevated)
            .await
            .map_err(|e| not_found_or(e, identity))?;

        info!(identity = %identity, "Password changed");
        Ok(())
    }
}

fn not_found_or(err: StoreError, identity: &Identity) -> AccountError {
    match err {
        StoreError::NotFound(_) => AccountError::NotFound(identity.clone()),
        other => AccountError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(matches!(check_new_password("abcdef", "abcdeg"), Err(AccountError::PasswordMismatch)));
        assert!(matches!(check_new_password("abc", "abc"), Err(AccountError::PasswordTooShort)));
        assert!(check_new_password("abcdef", "abcdef").is_ok());
        // counted in characters, not bytes
        assert!(matches!(check_new_password("ééééé", "ééééé"), Err(AccountError::PasswordTooShort)));
    }
}
