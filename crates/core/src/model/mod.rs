mod config;
mod evaluation;
mod ids;
mod modality;

pub use config::{
    DEFAULT_FLASHCARD_COUNT, DEFAULT_QUIZ_COUNT, Difficulty, MAX_ITEM_COUNT, MIN_ITEM_COUNT,
    SessionConfig, SessionConfigDraft, SystemFilter,
};
pub use evaluation::{Evaluation, FlashcardEvaluation, QuizEvaluation, RecordedAnswer};
pub use ids::{ItemId, ParseIdError, SessionId};
pub use modality::{Modality, SessionStatus, UnknownModality};
