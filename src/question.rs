//! Publication filter
//!
//! A question becomes visible to the public pages once its `pub_date` has
//! been reached. Both the index and the detail view go through here so the
//! two can never disagree about what is published.

use crate::orm::questions;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};

/// Questions published at or before `now`, newest first.
pub fn published_at(now: NaiveDateTime) -> Select<questions::Entity> {
    questions::Entity::find()
        .filter(questions::Column::PubDate.lte(now))
        .order_by_desc(questions::Column::PubDate)
        .order_by_desc(questions::Column::Id)
}

/// The `limit` most recently published questions.
pub async fn latest_published<C>(
    db: &C,
    now: NaiveDateTime,
    limit: u64,
) -> Result<Vec<questions::Model>, DbErr>
where
    C: ConnectionTrait,
{
    published_at(now).limit(limit).all(db).await
}

/// A single question, only if it is published at `now`.
pub async fn find_published<C>(
    db: &C,
    question_id: i32,
    now: NaiveDateTime,
) -> Result<Option<questions::Model>, DbErr>
where
    C: ConnectionTrait,
{
    published_at(now)
        .filter(questions::Column::Id.eq(question_id))
        .one(db)
        .await
}
