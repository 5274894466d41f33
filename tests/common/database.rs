//! Test database setup and management
#![allow(dead_code)]

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::env;

/// Get a test database connection
/// Uses TEST_DATABASE_URL environment variable or falls back to a private
/// in-memory SQLite database.
pub async fn get_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    // Every pooled connection to sqlite::memory: would open its own database,
    // so the pool is held at a single connection.
    polls::db::connect(&database_url, 1).await
}

/// Setup test database - connect and create the schema
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = get_test_db().await?;
    polls::db::create_schema(&db).await?;
    cleanup_test_data(&db).await?;
    Ok(db)
}

/// Cleanup function to remove test data
///
/// Choices go first so the foreign key to questions never dangles.
pub async fn cleanup_test_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    use polls::orm::{choices, questions};

    choices::Entity::delete_many().exec(db).await?;
    questions::Entity::delete_many().exec(db).await?;
    Ok(())
}
