//! Test fixtures for creating test data
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use chrono::{Duration, Utc};
use polls::orm::{choices, questions};
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection, DbErr};

/// Create a question published `days` from now (negative for the past)
pub async fn create_question(
    db: &DatabaseConnection,
    question_text: &str,
    days: i64,
) -> Result<questions::Model, DbErr> {
    create_question_at(db, question_text, Duration::days(days)).await
}

/// Create a question published `offset` from now
pub async fn create_question_at(
    db: &DatabaseConnection,
    question_text: &str,
    offset: Duration,
) -> Result<questions::Model, DbErr> {
    questions::ActiveModel {
        question_text: Set(question_text.to_string()),
        pub_date: Set(Utc::now().naive_utc() + offset),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Create a choice with a starting vote count
pub async fn create_choice(
    db: &DatabaseConnection,
    question_id: i32,
    choice_text: &str,
    votes: i32,
) -> Result<choices::Model, DbErr> {
    choices::ActiveModel {
        question_id: Set(question_id),
        choice_text: Set(choice_text.to_string()),
        votes: Set(votes),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Reload a choice's vote count
pub async fn votes_of(db: &DatabaseConnection, choice_id: i32) -> Result<i32, DbErr> {
    Ok(choices::Entity::find_by_id(choice_id)
        .one(db)
        .await?
        .map(|c| c.votes)
        .unwrap_or(-1))
}

/// All choices of a question, ordered by id
pub async fn choices_of(
    db: &DatabaseConnection,
    question_id: i32,
) -> Result<Vec<choices::Model>, DbErr> {
    choices::Entity::find()
        .filter(choices::Column::QuestionId.eq(question_id))
        .order_by_asc(choices::Column::Id)
        .all(db)
        .await
}
