//! Casting a vote for a choice.
//!
//! Validation happens before anything is written. A successful vote is a
//! single `votes = votes + 1` update scoped to the question, so concurrent
//! voters rely on the database's row update rather than a read-modify-write
//! in the application.

use crate::orm::{choices, questions};
use derive_more::{Display, From};
use sea_orm::{entity::*, query::*, sea_query::Expr, ConnectionTrait, DbErr};

/// Reasons a submitted vote is turned away. The messages are shown to the
/// voter above the form.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum VoteError {
    #[display(fmt = "You didn't select a choice.")]
    NoChoice,
    #[display(fmt = "Invalid choice selection.")]
    InvalidChoice,
    #[display(fmt = "Selected choice does not exist.")]
    ChoiceNotFound,
}

#[derive(Debug, Display, From)]
pub enum CastVoteError {
    #[display(fmt = "{}", _0)]
    Rejected(VoteError),
    #[display(fmt = "database error: {}", _0)]
    Database(DbErr),
}

/// Interpret the raw `choice` form field.
pub fn parse_choice_id(raw: Option<&str>) -> Result<i32, VoteError> {
    let raw = raw.ok_or(VoteError::NoChoice)?;
    raw.trim()
        .parse::<i32>()
        .map_err(|_| VoteError::InvalidChoice)
}

/// Record one vote for the submitted choice of `question`.
///
/// Returns the choice as it was read before the increment.
pub async fn cast_vote<C>(
    db: &C,
    question: &questions::Model,
    raw_choice: Option<&str>,
) -> Result<choices::Model, CastVoteError>
where
    C: ConnectionTrait,
{
    let choice_id = parse_choice_id(raw_choice)?;

    let choice = choices::Entity::find_by_id(choice_id)
        .filter(choices::Column::QuestionId.eq(question.id))
        .one(db)
        .await?
        .ok_or(VoteError::ChoiceNotFound)?;

    let res = choices::Entity::update_many()
        .col_expr(
            choices::Column::Votes,
            Expr::col(choices::Column::Votes).add(1),
        )
        .filter(choices::Column::Id.eq(choice.id))
        .filter(choices::Column::QuestionId.eq(question.id))
        .exec(db)
        .await?;

    // Deleted between the lookup and the update.
    if res.rows_affected == 0 {
        return Err(VoteError::ChoiceNotFound.into());
    }

    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_no_choice() {
        assert_eq!(parse_choice_id(None), Err(VoteError::NoChoice));
    }

    #[test]
    fn test_malformed_ids_are_invalid() {
        assert_eq!(parse_choice_id(Some("")), Err(VoteError::InvalidChoice));
        assert_eq!(parse_choice_id(Some("abc")), Err(VoteError::InvalidChoice));
        assert_eq!(
            parse_choice_id(Some("99999999999")),
            Err(VoteError::InvalidChoice)
        );
    }

    #[test]
    fn test_numeric_id_parses() {
        assert_eq!(parse_choice_id(Some("12")), Ok(12));
        assert_eq!(parse_choice_id(Some(" 7 ")), Ok(7));
    }

    #[test]
    fn test_messages() {
        assert_eq!(VoteError::NoChoice.to_string(), "You didn't select a choice.");
        assert_eq!(
            VoteError::ChoiceNotFound.to_string(),
            "Selected choice does not exist."
        );
        assert_eq!(VoteError::InvalidChoice.to_string(), "Invalid choice selection.");
    }
}
