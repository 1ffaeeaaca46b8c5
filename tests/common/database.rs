//! Test database setup and management
//!
//! Postgres-backed tests read `TEST_DATABASE_URL`. When it is unset they
//! log a notice and return early, so the suite still runs without a server.
#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::env;
use uuid::Uuid;
use validateme::orm::users;
use validateme::store::{PollStore, SeaStore};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Get a test database connection, or None when no test database is configured.
pub async fn get_test_db() -> Option<Result<DatabaseConnection, DbErr>> {
    match env::var("TEST_DATABASE_URL") {
        Ok(url) => Some(Database::connect(&url).await),
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping Postgres test");
            None
        }
    }
}

/// Applies the schema. Every statement is idempotent.
pub async fn apply_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let without_comments: String = SCHEMA
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    for stmt in without_comments.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        db.execute(Statement::from_string(DbBackend::Postgres, stmt.to_owned()))
            .await?;
    }
    Ok(())
}

/// Cleanup function to remove test data
///
/// Child tables are listed first; CASCADE takes care of the rest.
pub async fn cleanup_test_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "TRUNCATE TABLE responses, answers, questions, sessions, users CASCADE".to_owned(),
    ))
    .await?;
    Ok(())
}

/// Setup test database - migrate, empty it, and wrap it in a store.
pub async fn setup_test_store() -> Option<SeaStore> {
    let db = get_test_db()
        .await?
        .expect("Failed to connect to TEST_DATABASE_URL");
    apply_migrations(&db)
        .await
        .expect("Failed to apply migrations");
    cleanup_test_data(&db)
        .await
        .expect("Failed to cleanup test data");
    Some(SeaStore::new(db))
}

/// Inserts a user row directly and returns its id.
pub async fn create_test_user(store: &dyn PollStore, email: &str) -> Uuid {
    let user = users::Model {
        id: Uuid::new_v4(),
        email: email.to_owned(),
        password: "not-a-real-hash".to_owned(),
        display_name: None,
        avatar_url: None,
        birth_date: None,
        gender: None,
        country: None,
        city: None,
        created_at: Utc::now().naive_utc(),
    };
    let id = user.id;
    store
        .insert_user(user)
        .await
        .expect("Failed to create test user");
    id
}
