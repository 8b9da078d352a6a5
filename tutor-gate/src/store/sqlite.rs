//! SQLite-backed entitlement store

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;
use tutor_common::time::{format_date, parse_date};

use super::{check_access, EntitlementStore, StoreError, StoreResult, WriteAccess};
use crate::models::{EntitlementPatch, Identity, Preferences, UserEntitlement};

const USER_COLUMNS: &str = "email, password_hash, lang, response_type, school_level, \
     is_unlimited, requests_today, last_request_date, bonus_questions, referred_by";

/// Store over the `users` and `referral_grants` tables
#[derive(Debug, Clone)]
pub struct SqliteEntitlementStore {
    pool: SqlitePool,
}

impl SqliteEntitlementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn stored_identity(value: &str) -> StoreResult<Identity> {
    Identity::parse(value)
        .map_err(|e| StoreError::Backend(format!("Corrupt identity {:?}: {}", value, e)))
}

fn row_to_entitlement(row: &SqliteRow) -> StoreResult<UserEntitlement> {
    let email: String = row.get("email");
    let lang: String = row.get("lang");
    let response_type: String = row.get("response_type");
    let school_level: String = row.get("school_level");
    let requests_today: i64 = row.get("requests_today");
    let bonus_questions: i64 = row.get("bonus_questions");
    let last_request_date: Option<String> = row.get("last_request_date");
    let referred_by: Option<String> = row.get("referred_by");

    Ok(UserEntitlement {
        identity: stored_identity(&email)?,
        password_hash: row.get("password_hash"),
        preferences: Preferences::from_stored(&lang, &response_type, &school_level),
        bonus_allowance: u32::try_from(bonus_questions).unwrap_or(0),
        is_unlimited: row.get("is_unlimited"),
        requests_used_today: u32::try_from(requests_today).unwrap_or(0),
        last_request_date: last_request_date.as_deref().and_then(parse_date),
        referred_by: referred_by
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(stored_identity)
            .transpose()?,
    })
}

#[async_trait]
impl EntitlementStore for SqliteEntitlementStore {
    async fn find_by_identity(&self, identity: &Identity) -> StoreResult<Option<UserEntitlement>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_entitlement).transpose()
    }

    async fn update(
        &self,
        identity: &Identity,
        patch: &EntitlementPatch,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement> {
        check_access(patch, access)?;

        if !patch.is_empty() {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
            let mut set = query.separated(", ");

            if let Some(count) = patch.requests_used_today {
                set.push("requests_today = ").push_bind_unseparated(i64::from(count));
            }
            if let Some(date) = patch.last_request_date {
                set.push("last_request_date = ").push_bind_unseparated(format_date(date));
            }
            if let Some(prefs) = &patch.preferences {
                set.push("lang = ")
                    .push_bind_unseparated(prefs.language.as_stored());
                set.push("response_type = ")
                    .push_bind_unseparated(prefs.response_style.as_stored());
                set.push("school_level = ")
                    .push_bind_unseparated(prefs.school_level.clone());
            }
            if let Some(bonus) = patch.bonus_allowance {
                set.push("bonus_questions = ").push_bind_unseparated(i64::from(bonus));
            }
            if let Some(unlimited) = patch.is_unlimited {
                set.push("is_unlimited = ").push_bind_unseparated(unlimited);
            }
            if let Some(hash) = &patch.password_hash {
                set.push("password_hash = ").push_bind_unseparated(hash.clone());
            }

            query.push(" WHERE email = ").push_bind(identity.as_str().to_string());

            let result = query.build().execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(identity.clone()));
            }
            debug!(identity = %identity, ?access, "Updated user record");
        }

        self.find_by_identity(identity)
            .await?
            .ok_or_else(|| StoreError::NotFound(identity.clone()))
    }

    async fn add_bonus(
        &self,
        identity: &Identity,
        amount: u32,
        access: WriteAccess,
    ) -> StoreResult<UserEntitlement> {
        check_access(&EntitlementPatch::bonus(amount), access)?;

        let result = sqlx::query(
            "UPDATE users SET bonus_questions = MIN(bonus_questions + ?, ?) WHERE email = ?",
        )
        .bind(i64::from(amount))
        .bind(i64::from(u32::MAX))
        .bind(identity.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(identity.clone()));
        }
        debug!(identity = %identity, amount, "Added referral bonus");

        self.find_by_identity(identity)
            .await?
            .ok_or_else(|| StoreError::NotFound(identity.clone()))
    }

    async fn insert(&self, record: &UserEntitlement) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                email, password_hash, lang, response_type, school_level,
                is_unlimited, requests_today, last_request_date, bonus_questions, referred_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.identity.as_str())
        .bind(&record.password_hash)
        .bind(record.preferences.language.as_stored())
        .bind(record.preferences.response_style.as_stored())
        .bind(&record.preferences.school_level)
        .bind(record.is_unlimited)
        .bind(i64::from(record.requests_used_today))
        .bind(record.last_request_date.map(format_date))
        .bind(i64::from(record.bonus_allowance))
        .bind(record.referred_by.as_ref().map(|r| r.as_str().to_string()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::AlreadyExists(record.identity.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<UserEntitlement>> {
        let sql = format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entitlement).collect()
    }

    async fn list_referred_by(&self, referrer: &Identity) -> StoreResult<Vec<Identity>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM users WHERE referred_by = ? ORDER BY email")
                .bind(referrer.as_str())
                .fetch_all(&self.pool)
                .await?;

        emails.iter().map(|e| stored_identity(e)).collect()
    }

    async fn record_referral_grant(
        &self,
        referrer: &Identity,
        referee: &Identity,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO referral_grants (referrer, referee) VALUES (?, ?)")
                .bind(referrer.as_str())
                .bind(referee.as_str())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
