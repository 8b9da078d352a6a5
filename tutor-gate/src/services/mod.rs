//! Business logic services

pub mod accounts;
pub mod admin;
pub mod generation;
pub mod image;
pub mod instruction;
pub mod password;
pub mod quota_ledger;
pub mod referral_ledger;
pub mod request_governor;

pub use accounts::{AccountError, AccountService, Registered, Registration, MIN_PASSWORD_LEN};
pub use admin::{AdminError, AdminOverview, AdminService, UserSummary};
pub use image::{prepare_upload, ImageError, MAX_IMAGE_BYTES};
pub use instruction::build_system_instruction;
pub use quota_ledger::{CommitOutcome, QuotaDecision, QuotaLedger, Reservation};
pub use referral_ledger::{
    referral_link, ReferralLedger, ReferralOutcome, ReferralStatistics, REFERRAL_PARAM,
};
pub use request_governor::{
    DisplayResult, GovernorState, RequestGovernor, SubmitError, Submission, NO_ANSWER_TEXT,
};
