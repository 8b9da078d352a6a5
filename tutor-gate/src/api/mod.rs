//! HTTP API handlers for tutor-gate

pub mod admin;
pub mod ask;
pub mod auth;
pub mod health;
pub mod profile;
pub mod referrals;

pub use admin::{list_users, update_user};
pub use ask::{ask, ASK_BODY_LIMIT};
pub use auth::{login, logout, register, session_middleware, CurrentSession, SESSION_HEADER};
pub use health::health_routes;
pub use profile::{change_password, get_preferences, get_quota, put_preferences};
pub use referrals::get_referrals;
