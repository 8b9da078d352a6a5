//! User entitlement record and partial updates

use chrono::NaiveDate;
use serde::Serialize;

use super::{Identity, Preferences};

/// One row of the users table.
///
/// `identity` and `referred_by` are fixed at creation. Usage counters move
/// through [`crate::services::QuotaLedger`], the bonus only through
/// [`crate::services::ReferralLedger`] or an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntitlement {
    pub identity: Identity,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub preferences: Preferences,
    pub bonus_allowance: u32,
    pub is_unlimited: bool,
    pub requests_used_today: u32,
    pub last_request_date: Option<NaiveDate>,
    pub referred_by: Option<Identity>,
}

impl UserEntitlement {
    /// Record written at registration: no usage, no bonus, metered
    pub fn new_registration(
        identity: Identity,
        password_hash: String,
        referred_by: Option<Identity>,
        today: NaiveDate,
    ) -> Self {
        Self {
            identity,
            password_hash,
            preferences: Preferences::default(),
            bonus_allowance: 0,
            is_unlimited: false,
            requests_used_today: 0,
            last_request_date: Some(today),
            referred_by,
        }
    }

    /// Requests allowed per day: base policy plus accumulated bonus
    pub fn daily_limit(&self, base_allowance: u32) -> u32 {
        base_allowance.saturating_add(self.bonus_allowance)
    }
}

/// Partial update of a user record.
///
/// `None` fields are left untouched. Bonus, unlimited flag and password
/// are privileged: stores refuse them on the user-scoped write path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub requests_used_today: Option<u32>,
    pub last_request_date: Option<NaiveDate>,
    pub preferences: Option<Preferences>,
    pub bonus_allowance: Option<u32>,
    pub is_unlimited: Option<bool>,
    pub password_hash: Option<String>,
}

impl EntitlementPatch {
    pub fn usage(requests_used_today: u32, last_request_date: NaiveDate) -> Self {
        Self {
            requests_used_today: Some(requests_used_today),
            last_request_date: Some(last_request_date),
            ..Self::default()
        }
    }

    pub fn preferences(preferences: Preferences) -> Self {
        Self {
            preferences: Some(preferences),
            ..Self::default()
        }
    }

    pub fn bonus(bonus_allowance: u32) -> Self {
        Self {
            bonus_allowance: Some(bonus_allowance),
            ..Self::default()
        }
    }

    pub fn privileges(bonus_allowance: u32, is_unlimited: bool) -> Self {
        Self {
            bonus_allowance: Some(bonus_allowance),
            is_unlimited: Some(is_unlimited),
            ..Self::default()
        }
    }

    pub fn password_hash(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }

    /// Name of the first privileged field this patch touches, if any
    pub fn privileged_field(&self) -> Option<&'static str> {
        if self.bonus_allowance.is_some() {
            Some("bonus_questions")
        } else if self.is_unlimited.is_some() {
            Some("is_unlimited")
        } else if self.password_hash.is_some() {
            Some("password_hash")
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply onto an in-memory record
    pub fn apply_to(&self, record: &mut UserEntitlement) {
        if let Some(count) = self.requests_used_today {
            record.requests_used_today = count;
        }
        if let Some(date) = self.last_request_date {
            record.last_request_date = Some(date);
        }
        if let Some(prefs) = &self.preferences {
            record.preferences = prefs.clone();
        }
        if let Some(bonus) = self.bonus_allowance {
            record.bonus_allowance = bonus;
        }
        if let Some(unlimited) = self.is_unlimited {
            record.is_unlimited = unlimited;
        }
        if let Some(hash) = &self.password_hash {
            record.password_hash = hash.clone();
        }
    }
}
