//! Domain models

mod entitlement;
mod identity;
mod preferences;

pub use entitlement::{EntitlementPatch, UserEntitlement};
pub use identity::{Identity, IdentityError};
pub use preferences::{Language, Preferences, ResponseStyle, DEFAULT_SCHOOL_LEVEL};
