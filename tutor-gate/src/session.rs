//! Per-user session context
//!
//! A [`UserSession`] carries the live daily counter for one logged-in user.
//! It is passed explicitly into the quota ledger and the request governor;
//! nothing about a user's usage lives in process-wide state except the
//! token registry that maps HTTP callers to their session.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Identity, UserEntitlement};

#[derive(Debug, Clone)]
pub struct UserSession {
    entitlement: UserEntitlement,
    requests_today: u32,
    counter_date: NaiveDate,
}

impl UserSession {
    /// Session for a freshly authenticated user.
    ///
    /// The in-memory counter starts from the stored value only when the
    /// stored date is today.
    pub fn load(entitlement: UserEntitlement, today: NaiveDate) -> Self {
        let requests_today = if entitlement.last_request_date == Some(today) {
            entitlement.requests_used_today
        } else {
            0
        };
        Self {
            entitlement,
            requests_today,
            counter_date: today,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.entitlement.identity
    }

    /// Last known copy of the stored record
    pub fn entitlement(&self) -> &UserEntitlement {
        &self.entitlement
    }

    /// Replace the stored-record snapshot; the live counter is untouched
    pub fn refresh(&mut self, entitlement: UserEntitlement) {
        self.entitlement = entitlement;
    }

    pub fn requests_today(&self) -> u32 {
        self.requests_today
    }

    pub fn counter_date(&self) -> NaiveDate {
        self.counter_date
    }

    pub(crate) fn set_counter(&mut self, requests_today: u32, date: NaiveDate) {
        self.requests_today = requests_today;
        self.counter_date = date;
    }

    pub fn quota_view(&self, base_allowance: u32) -> QuotaView {
        if self.entitlement.is_unlimited {
            return QuotaView {
                unlimited: true,
                used: self.requests_today,
                limit: None,
                remaining: None,
                bonus: self.entitlement.bonus_allowance,
            };
        }
        let limit = self.entitlement.daily_limit(base_allowance);
        QuotaView {
            unlimited: false,
            used: self.requests_today,
            limit: Some(limit),
            remaining: Some(limit.saturating_sub(self.requests_today)),
            bonus: self.entitlement.bonus_allowance,
        }
    }
}

/// Usage summary shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaView {
    pub unlimited: bool,
    pub used: u32,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub bonus: u32,
}

pub type SessionHandle = Arc<Mutex<UserSession>>;

/// Idle time after which a session token stops working
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_seen: Instant,
}

impl Entry {
    fn expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= idle_timeout
    }
}

/// Live sessions keyed by opaque token.
///
/// A token unused for longer than the idle timeout is dropped. Expired
/// entries are pruned whenever a session is opened.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub async fn open(&self, session: UserSession) -> Uuid {
        let token = Uuid::new_v4();
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, entry| !entry.expired(now, self.idle_timeout));
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "Dropped idle sessions");
        }

        sessions.insert(
            token,
            Entry {
                handle: Arc::new(Mutex::new(session)),
                last_seen: now,
            },
        );
        token
    }

    /// Look up a live session and mark it as used
    pub async fn get(&self, token: &Uuid) -> Option<SessionHandle> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        if sessions.get(token)?.expired(now, self.idle_timeout) {
            sessions.remove(token);
            return None;
        }
        let entry = sessions.get_mut(token)?;
        entry.last_seen = now;
        Some(entry.handle.clone())
    }

    /// Returns `false` if the token was unknown
    pub async fn close(&self, token: &Uuid) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Tokens held, including idle ones not yet pruned
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
