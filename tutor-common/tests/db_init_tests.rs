//! Database initialization tests
//!
//! - Automatic database creation on first run
//! - Idempotent reopen
//! - users / referral_grants schema and constraints

use tempfile::TempDir;
use tutor_common::db::{init_database, init_in_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("tutor.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tutor.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO users (email, password_hash) VALUES ('a@b.c', 'x')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "Reopening must not drop existing rows");
}

#[tokio::test]
async fn test_users_table_defaults() {
    let pool = init_in_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (email, password_hash) VALUES ('new@example.com', 'h')")
        .execute(&pool)
        .await
        .unwrap();

    let (lang, response_type, level, unlimited, used, bonus): (String, String, String, i64, i64, i64) =
        sqlx::query_as(
            "SELECT lang, response_type, school_level, is_unlimited, requests_today, bonus_questions
             FROM users WHERE email = 'new@example.com'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(lang, "Francais");
    assert_eq!(response_type, "steps");
    assert_eq!(level, "Tronc Commun");
    assert_eq!(unlimited, 0);
    assert_eq!(used, 0);
    assert_eq!(bonus, 0);
}

#[tokio::test]
async fn test_negative_counters_rejected() {
    let pool = init_in_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, bonus_questions) VALUES ('neg@example.com', 'h', -1)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_referral_grant_pair_is_unique() {
    let pool = init_in_memory_database().await.unwrap();

    let insert = "INSERT INTO referral_grants (referrer, referee) VALUES ('r@x.io', 'n@x.io')";
    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;

    assert!(duplicate.is_err(), "Second grant for the same pair must violate UNIQUE");
}
