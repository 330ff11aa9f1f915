use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Session, SessionKind};
use crate::error::ValidationError;
use crate::model::{
    Difficulty, Evaluation, ItemId, Modality, QuizEvaluation, RecordedAnswer, SessionConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    ShortAnswer,
    ClinicalVignette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: ItemId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Choices for multiple-choice questions; empty otherwise.
    pub options: Vec<String>,
    pub reference_answer: String,
}

/// Quiz-specific session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizState {
    remote_id: String,
    topic: String,
    difficulty: Difficulty,
    questions: Vec<QuizQuestion>,
}

impl QuizState {
    #[must_use]
    pub fn new(
        remote_id: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        questions: Vec<QuizQuestion>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            topic: topic.into(),
            difficulty,
            questions,
        }
    }

    /// Quiz id assigned by the exercise service; sent with every answer.
    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Topic as resolved by the service (may differ from the requested one).
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }
}

impl Session {
    /// Start a quiz over the questions returned by the service.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NoItems` or `ValidationError::DuplicateItem` if the
    /// question list is unusable.
    pub fn start_quiz(
        config: SessionConfig,
        state: QuizState,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::begin(config, SessionKind::Quiz(state), now)
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&QuizState> {
        match self.kind() {
            SessionKind::Quiz(state) => Some(state),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.quiz()?.questions().get(self.cursor())
    }

    /// Record a graded quiz answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` under the same rules as [`Session::check_answer`], or
    /// `ValidationError::WrongModality` for non-quiz sessions.
    pub fn record_quiz_answer(
        &mut self,
        item_id: &ItemId,
        raw: &str,
        evaluation: QuizEvaluation,
        at: DateTime<Utc>,
    ) -> Result<&RecordedAnswer, ValidationError> {
        self.ensure_modality(Modality::Quiz)?;
        self.record(item_id, raw, Some(Evaluation::Quiz(evaluation)), at)
    }

    /// Number of questions answered correctly so far.
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers()
            .values()
            .filter(|answer| answer.evaluation.as_ref().is_some_and(Evaluation::is_correct))
            .count()
    }
}
