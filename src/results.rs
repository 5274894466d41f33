//! Vote aggregation for the results page.
//!
//! Everything here is a read-only projection over a question's choices.

use crate::orm::choices;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use std::cmp::Ordering;

/// One row of the results table.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceResult {
    pub choice: choices::Model,
    pub votes: i32,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PollResults {
    pub total_votes: i64,
    pub choices_count: usize,
    pub choices_with_votes: usize,
    pub has_votes: bool,
    /// Most votes first, ties broken by choice text.
    pub choice_results: Vec<ChoiceResult>,
}

impl PollResults {
    pub fn from_choices(mut choices: Vec<choices::Model>) -> Self {
        sort_choices(&mut choices);

        let total_votes: i64 = choices.iter().map(|c| i64::from(c.votes)).sum();
        let choices_count = choices.len();
        let choices_with_votes = choices.iter().filter(|c| c.votes > 0).count();

        let choice_results = choices
            .into_iter()
            .map(|choice| ChoiceResult {
                votes: choice.votes,
                percentage: choice.vote_percentage(total_votes),
                choice,
            })
            .collect();

        Self {
            total_votes,
            choices_count,
            choices_with_votes,
            has_votes: total_votes > 0,
            choice_results,
        }
    }
}

/// Display order for choices: votes descending, then text ascending.
pub fn choice_order(a: &choices::Model, b: &choices::Model) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| a.choice_text.cmp(&b.choice_text))
}

pub fn sort_choices(choices: &mut [choices::Model]) {
    choices.sort_by(choice_order);
}

/// Choices of a question in display order.
pub async fn choices_for<C>(db: &C, question_id: i32) -> Result<Vec<choices::Model>, DbErr>
where
    C: ConnectionTrait,
{
    choices::Entity::find()
        .filter(choices::Column::QuestionId.eq(question_id))
        .order_by_desc(choices::Column::Votes)
        .order_by_asc(choices::Column::ChoiceText)
        .all(db)
        .await
}

/// Aggregate the stored tallies of a question.
pub async fn poll_results<C>(db: &C, question_id: i32) -> Result<PollResults, DbErr>
where
    C: ConnectionTrait,
{
    Ok(PollResults::from_choices(choices_for(db, question_id).await?))
}
