//! SeaORM entities

pub mod choices;
pub mod questions;

/// Upper bound for question and choice text.
pub const MAX_TEXT_LENGTH: usize = 200;
