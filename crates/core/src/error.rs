use thiserror::Error;

use crate::model::{ItemId, Modality};

/// Local rule violations. Raised before any remote call is made and never
/// leave the session in a modified state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error("a topic is required for {0} sessions")]
    MissingTopic(Modality),

    #[error("item count must be between {min} and {max}, got {count}")]
    ItemCountOutOfRange { count: u32, min: u32, max: u32 },

    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),

    #[error("unknown system filter: {0}")]
    UnknownSystem(String),

    #[error("session has no items")]
    NoItems,

    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("item {0} has already been answered")]
    AlreadyAnswered(ItemId),

    #[error("item {got} is not the current item (expected {expected})")]
    NotCurrentItem { expected: ItemId, got: ItemId },

    #[error("the current item must be answered first")]
    CurrentItemUnanswered,

    #[error("session is already complete")]
    AlreadyComplete,

    #[error("session is not complete yet")]
    NotComplete,

    #[error("item {index} has not been reached yet (furthest is {furthest})")]
    NavigationOutOfRange { index: usize, furthest: usize },

    #[error("{0} sessions do not support navigation")]
    NavigationUnsupported(Modality),

    #[error("{0} sessions do not offer hints")]
    HintsUnsupported(Modality),

    #[error("no hints remaining")]
    HintBudgetExhausted,

    #[error("there is no open turn to answer")]
    NoOpenTurn,

    #[error("expected a {expected} session, found {actual}")]
    WrongModality { expected: Modality, actual: Modality },

    #[error("flashcard score must be within 0..=1, got {0}")]
    ScoreOutOfRange(String),
}
