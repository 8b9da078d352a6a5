//! Database initialization
//!
//! Opens (or creates) the SQLite file, applies connection pragmas and
//! creates the tables idempotently. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Busy timeout applied to every connection, in milliseconds
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets request handlers read while a quota commit is writing
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    apply_pragmas(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Private in-memory database with the full schema.
///
/// Limited to one connection: every SQLite `:memory:` connection is its
/// own database, so a larger pool would see empty tables.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    apply_pragmas(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(pool).await?;

    Ok(())
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_referral_grants_table(pool).await?;
    Ok(())
}

/// One row per registered user, keyed by lower-cased email
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            lang TEXT NOT NULL DEFAULT 'Francais',
            response_type TEXT NOT NULL DEFAULT 'steps',
            school_level TEXT NOT NULL DEFAULT 'Tronc Commun',
            is_unlimited INTEGER NOT NULL DEFAULT 0,
            requests_today INTEGER NOT NULL DEFAULT 0 CHECK (requests_today >= 0),
            last_request_date TEXT,
            bonus_questions INTEGER NOT NULL DEFAULT 0 CHECK (bonus_questions >= 0),
            referred_by TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_referred_by ON users(referred_by)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Referral bonuses already paid out.
///
/// The UNIQUE pair is what stops a retried registration from crediting
/// the same referrer twice for the same referee.
async fn create_referral_grants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS referral_grants (
            referrer TEXT NOT NULL,
            referee TEXT NOT NULL,
            granted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (referrer, referee)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
