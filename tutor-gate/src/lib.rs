//! tutor-gate library - quota-gated tutoring service
//!
//! Every question a student asks costs one call to the generative
//! provider. This crate decides whether the call may happen (daily quota
//! plus referral bonus), makes it with bounded retries, and records the
//! usage.

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tutor_common::Clock;

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod store;

pub use error::{ApiError, ApiResult};

use models::Identity;
use services::generation::{GenerativeBackend, ResilientClient, RetryPolicy};
use services::{AccountService, AdminService, QuotaLedger, ReferralLedger, RequestGovernor};
use session::{SessionRegistry, DEFAULT_IDLE_TIMEOUT};
use store::EntitlementStore;

/// Policy values resolved from configuration
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub daily_base_allowance: u32,
    pub referral_bonus: u32,
    /// Base of referral links
    pub public_base_url: String,
    /// `None` disables the admin endpoints
    pub admin: Option<Identity>,
    pub retry: RetryPolicy,
    /// Unused session tokens expire after this long
    pub session_idle_timeout: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            daily_base_allowance: 5,
            referral_bonus: 10,
            public_base_url: "http://127.0.0.1:5740".to_string(),
            admin: None,
            retry: RetryPolicy::default(),
            session_idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntitlementStore>,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionRegistry,
    pub accounts: Arc<AccountService>,
    pub referrals: Arc<ReferralLedger>,
    pub governor: Arc<RequestGovernor>,
    pub admin: Arc<AdminService>,
    pub settings: Arc<GateSettings>,
}

impl AppState {
    /// Wire the services over one store, one provider backend and one clock
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        backend: Arc<dyn GenerativeBackend>,
        clock: Arc<dyn Clock>,
        settings: GateSettings,
    ) -> Self {
        let referrals = Arc::new(ReferralLedger::new(store.clone(), settings.referral_bonus));
        let quota = Arc::new(QuotaLedger::new(
            store.clone(),
            clock.clone(),
            settings.daily_base_allowance,
        ));
        let client = Arc::new(ResilientClient::new(backend, settings.retry));

        Self {
            accounts: Arc::new(AccountService::new(store.clone(), referrals.clone(), clock.clone())),
            governor: Arc::new(RequestGovernor::new(quota, client)),
            admin: Arc::new(AdminService::new(
                store.clone(),
                settings.admin.clone(),
                settings.daily_base_allowance,
            )),
            referrals,
            sessions: SessionRegistry::new(settings.session_idle_timeout),
            store,
            clock,
            settings: Arc::new(settings),
        }
    }
}

/// Build application router
///
/// `/health`, register and login are public; everything else needs a
/// session token in `x-session-token`.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post, put};

    let protected = Router::new()
        .route("/api/logout", post(api::logout))
        .route(
            "/api/ask",
            post(api::ask).layer(DefaultBodyLimit::max(api::ASK_BODY_LIMIT)),
        )
        .route("/api/quota", get(api::get_quota))
        .route("/api/preferences", get(api::get_preferences).put(api::put_preferences))
        .route("/api/password", post(api::change_password))
        .route("/api/referrals", get(api::get_referrals))
        .route("/api/admin/users", get(api::list_users))
        .route("/api/admin/users/:email", put(api::update_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    let public = Router::new()
        .route("/api/register", post(api::register))
        .route("/api/login", post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
