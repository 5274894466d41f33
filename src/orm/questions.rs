//! SeaORM Entity for questions table

use chrono::{Duration, NaiveDateTime};
use sea_orm::entity::prelude::*;
use std::fmt;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "String(Some(200))")]
    pub question_text: String,
    pub pub_date: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::choices::Entity")]
    Choices,
}

impl Related<super::choices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Choices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A question is visible once its publication date has been reached.
    pub fn is_published_at(&self, now: NaiveDateTime) -> bool {
        self.pub_date <= now
    }

    /// Published within `window` before `now`, inclusive at both ends.
    pub fn was_published_within(&self, now: NaiveDateTime, window: Duration) -> bool {
        now - window <= self.pub_date && self.pub_date <= now
    }

    /// Published within the last 24 hours relative to `now`.
    pub fn was_published_recently_at(&self, now: NaiveDateTime) -> bool {
        self.was_published_within(now, Duration::hours(24))
    }

    pub fn get_url(&self) -> String {
        format!("/{}/", self.id)
    }

    pub fn get_results_url(&self) -> String {
        format!("/{}/results/", self.id)
    }

    pub fn get_vote_url(&self) -> String {
        format!("/{}/vote/", self.id)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Question: {}", self.question_text)
    }
}
