//! Daily request quota
//!
//! Two-phase accounting. [`QuotaLedger::check_and_reserve`] advances the
//! session counter before the provider is called; [`QuotaLedger::commit`]
//! persists it after a successful generation, [`QuotaLedger::forfeit`]
//! drops the reservation without persisting and without giving the
//! request back. A daily reset, by contrast, is persisted immediately.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tutor_common::Clock;

use crate::models::EntitlementPatch;
use crate::session::UserSession;
use crate::store::{EntitlementStore, StoreError, WriteAccess};

/// Token for one reserved request
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation must be committed or forfeited"]
pub enum Reservation {
    /// Unlimited user; nothing was counted
    Unmetered,
    Metered {
        requests_today: u32,
        date: NaiveDate,
        limit: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed(Reservation),
    Denied { limit: u32 },
}

#[derive(Debug)]
pub enum CommitOutcome {
    Persisted,
    /// Nothing to persist for unmetered requests
    Skipped,
    /// The answer stands; the store is behind the session until the next commit
    PersistenceFailed(StoreError),
}

pub struct QuotaLedger {
    store: Arc<dyn EntitlementStore>,
    clock: Arc<dyn Clock>,
    base_allowance: u32,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn EntitlementStore>, clock: Arc<dyn Clock>, base_allowance: u32) -> Self {
        Self {
            store,
            clock,
            base_allowance,
        }
    }

    pub fn base_allowance(&self) -> u32 {
        self.base_allowance
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Decide whether one more request is allowed now and reserve it
    pub async fn check_and_reserve(&self, session: &mut UserSession) -> QuotaDecision {
        // Pick up bonus grants and admin edits made since login
        match self.store.find_by_identity(session.identity()).await {
            Ok(Some(record)) => session.refresh(record),
            Ok(None) => warn!(identity = %session.identity(), "User record missing; using session snapshot"),
            Err(e) => warn!(identity = %session.identity(), error = %e, "Could not refresh entitlement; using session snapshot"),
        }

        if session.entitlement().is_unlimited {
            debug!(identity = %session.identity(), "Unlimited user, quota not checked");
            return QuotaDecision::Allowed(Reservation::Unmetered);
        }

        let today = self.clock.today();
        if session.counter_date() != today {
            session.set_counter(0, today);
        }

        if session.entitlement().last_request_date != Some(today) {
            self.persist_daily_reset(session, today).await;
        } else {
            // Other sessions of the same account count against the same day
            let stored = session.entitlement().requests_used_today;
            if stored > session.requests_today() {
                debug!(identity = %session.identity(), stored, session_count = session.requests_today(), "Catching up with stored usage");
                session.set_counter(stored, today);
            }
        }

        let limit = session.entitlement().daily_limit(self.base_allowance);
        let used = session.requests_today();
        if used >= limit {
            info!(identity = %session.identity(), used, limit, "Daily quota exhausted");
            return QuotaDecision::Denied { limit };
        }

        let requests_today = used + 1;
        session.set_counter(requests_today, today);
        debug!(identity = %session.identity(), requests_today, limit, "Request reserved");

        QuotaDecision::Allowed(Reservation::Metered {
            requests_today,
            date: today,
            limit,
        })
    }

    async fn persist_daily_reset(&self, session: &mut UserSession, today: NaiveDate) {
        let patch = EntitlementPatch::usage(session.requests_today(), today);
        match self
            .store
            .update(session.identity(), &patch, WriteAccess::User)
            .await
        {
            Ok(record) => {
                info!(identity = %session.identity(), date = %today, "Daily counter reset");
                session.refresh(record);
            }
            Err(e) => {
                warn!(identity = %session.identity(), error = %e, "Failed to persist daily reset");
                let mut snapshot = session.entitlement().clone();
                patch.apply_to(&mut snapshot);
                session.refresh(snapshot);
            }
        }
    }

    /// Persist a reservation after a successful generation
    pub async fn commit(&self, session: &mut UserSession, reservation: Reservation) -> CommitOutcome {
        let Reservation::Metered {
            requests_today,
            date,
            ..
        } = reservation
        else {
            return CommitOutcome::Skipped;
        };

        let patch = EntitlementPatch::usage(requests_today, date);
        match self
            .store
            .update(session.identity(), &patch, WriteAccess::User)
            .await
        {
            Ok(record) => {
                debug!(identity = %session.identity(), requests_today, "Usage committed");
                session.refresh(record);
                CommitOutcome::Persisted
            }
            Err(e) => {
                warn!(identity = %session.identity(), requests_today, error = %e, "Failed to persist usage");
                CommitOutcome::PersistenceFailed(e)
            }
        }
    }

    /// Drop a reservation after a failed generation.
    ///
    /// The session counter keeps the reserved request.
    pub fn forfeit(&self, session: &UserSession, reservation: Reservation) {
        if let Reservation::Metered { requests_today, .. } = reservation {
            info!(identity = %session.identity(), requests_today, "Reservation forfeited, not persisted");
        }
    }
}
