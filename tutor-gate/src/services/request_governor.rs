//! One "answer this question" operation
//!
//! ```text
//! Idle ──reserve──▶ QuotaChecked ──▶ Calling ──ok / no answer──▶ Committed
//!   │                                   │
//!   └──denied──▶ Failed ◀──error────────┘
//! ```
//!
//! The machine lives for one call; nothing about it is persisted.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use super::generation::{
    GenerateRequest, GenerationError, GenerationOutcome, GroundingSource, InlineImage,
    ResilientClient,
};
use super::instruction::build_system_instruction;
use super::quota_ledger::{CommitOutcome, QuotaDecision, QuotaLedger};
use crate::models::Identity;
use crate::session::{QuotaView, UserSession};

/// Shown when the provider answered with no text
pub const NO_ANSWER_TEXT: &str =
    "The tutor could not produce an answer to this question. Try rephrasing it or sending a clearer image.";

#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub prompt: Option<String>,
    pub image: Option<InlineImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayResult {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    /// `false` for the no-answer placeholder
    pub answered: bool,
    pub remaining_quota: QuotaView,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("You have reached your daily limit of {limit} questions. Come back tomorrow or invite friends to earn more.")]
    QuotaExhausted { limit: u32 },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorState {
    Idle,
    QuotaChecked,
    Calling,
    Committed,
    Failed,
}

fn enter(identity: &Identity, from: GovernorState, to: GovernorState) -> GovernorState {
    debug!(identity = %identity, ?from, ?to, "Governor transition");
    to
}

pub struct RequestGovernor {
    quota: Arc<QuotaLedger>,
    client: Arc<ResilientClient>,
}

impl RequestGovernor {
    pub fn new(quota: Arc<QuotaLedger>, client: Arc<ResilientClient>) -> Self {
        Self { quota, client }
    }

    pub fn quota(&self) -> &QuotaLedger {
        &self.quota
    }

    pub async fn submit(
        &self,
        session: &mut UserSession,
        submission: Submission,
    ) -> Result<DisplayResult, SubmitError> {
        let identity = session.identity().clone();
        let mut state = GovernorState::Idle;

        let request = GenerateRequest {
            system_instruction: String::new(),
            image: submission.image,
            prompt: submission.prompt,
        };
        // Nothing to ask: refuse before any quota is reserved
        if request.is_empty() {
            enter(&identity, state, GovernorState::Failed);
            return Err(GenerationError::Configuration(
                "Nothing to send: no prompt text and no image".to_string(),
            )
            .into());
        }

        let reservation = match self.quota.check_and_reserve(session).await {
            QuotaDecision::Allowed(reservation) => reservation,
            QuotaDecision::Denied { limit } => {
                enter(&identity, state, GovernorState::Failed);
                return Err(SubmitError::QuotaExhausted { limit });
            }
        };
        state = enter(&identity, state, GovernorState::QuotaChecked);

        // Built after the quota check, which refreshes the preferences snapshot
        let request = GenerateRequest {
            system_instruction: build_system_instruction(&session.entitlement().preferences),
            ..request
        };

        state = enter(&identity, state, GovernorState::Calling);
        let outcome = match self.client.generate(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(identity = %identity, kind = e.kind(), "Submission failed");
                self.quota.forfeit(session, reservation);
                enter(&identity, state, GovernorState::Failed);
                return Err(e.into());
            }
        };

        if let CommitOutcome::PersistenceFailed(e) = self.quota.commit(session, reservation).await {
            // The answer is still delivered; the session stays ahead of the store
            error!(identity = %identity, error = %e, "Usage not persisted");
        }
        enter(&identity, state, GovernorState::Committed);

        let remaining_quota = session.quota_view(self.quota.base_allowance());
        let result = match outcome {
            GenerationOutcome::Answered { text, sources } => DisplayResult {
                text,
                sources,
                answered: true,
                remaining_quota,
            },
            GenerationOutcome::NoAnswer => {
                info!(identity = %identity, "Provider returned no answer");
                DisplayResult {
                    text: NO_ANSWER_TEXT.to_string(),
                    sources: Vec::new(),
                    answered: false,
                    remaining_quota,
                }
            }
        };

        Ok(result)
    }
}
