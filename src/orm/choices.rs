//! SeaORM Entity for choices table

use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, DbErr};
use std::fmt;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "choices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub question_id: i32,
    #[sea_orm(column_type = "String(Some(200))")]
    pub choice_text: String,
    pub votes: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::questions::Entity",
        from = "Column::QuestionId",
        to = "super::questions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Question,
}

impl Related<super::questions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Question.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Share of `total_votes` held by this choice, in percent rounded to two
    /// decimals. Zero when nobody has voted yet.
    pub fn vote_percentage(&self, total_votes: i64) -> f64 {
        if total_votes <= 0 {
            return 0.0;
        }
        let percentage = f64::from(self.votes) / total_votes as f64 * 100.0;
        (percentage * 100.0).round() / 100.0
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} votes)", self.choice_text, self.votes)
    }
}

/// Sum of votes over every choice of a question.
pub async fn total_votes_for<C>(db: &C, question_id: i32) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
{
    let choices = Entity::find()
        .filter(Column::QuestionId.eq(question_id))
        .all(db)
        .await?;
    Ok(choices.iter().map(|c| i64::from(c.votes)).sum())
}

/// Percentage for `choice`, taking a precomputed question total when the
/// caller already has one and aggregating the question's choices otherwise.
pub async fn vote_percentage_in<C>(
    db: &C,
    choice: &Model,
    total_votes: Option<i64>,
) -> Result<f64, DbErr>
where
    C: ConnectionTrait,
{
    let total = match total_votes {
        Some(total) => total,
        None => total_votes_for(db, choice.question_id).await?,
    };
    Ok(choice.vote_percentage(total))
}
