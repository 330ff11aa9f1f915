use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

//
// ─── EVALUATIONS ──────────────────────────────────────────────────────────────
//

/// Grading of a quiz answer. Counts as 1 point when correct, 0 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizEvaluation {
    pub is_correct: bool,
    pub feedback: String,
    pub explanation: Option<String>,
    pub reference_answer: String,
    pub related_topic: Option<String>,
}

/// Continuous grading of a flashcard answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardEvaluation {
    score: f64,
    pub feedback: String,
    pub is_correct: bool,
    pub is_partial: bool,
}

impl FlashcardEvaluation {
    /// # Errors
    ///
    /// Returns `ValidationError::ScoreOutOfRange` unless `score` is a finite value in `0..=1`.
    pub fn new(
        score: f64,
        feedback: impl Into<String>,
        is_correct: bool,
        is_partial: bool,
    ) -> Result<Self, ValidationError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::ScoreOutOfRange(score.to_string()));
        }
        Ok(Self {
            score,
            feedback: feedback.into(),
            is_correct,
            is_partial,
        })
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
    Quiz(QuizEvaluation),
    Flashcard(FlashcardEvaluation),
}

impl Evaluation {
    /// Points contributed to the session score, always within `0..=1`.
    #[must_use]
    pub fn points(&self) -> f64 {
        match self {
            Evaluation::Quiz(eval) => {
                if eval.is_correct {
                    1.0
                } else {
                    0.0
                }
            }
            Evaluation::Flashcard(eval) => eval.score(),
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        match self {
            Evaluation::Quiz(eval) => eval.is_correct,
            Evaluation::Flashcard(eval) => eval.is_correct,
        }
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        match self {
            Evaluation::Quiz(eval) => &eval.feedback,
            Evaluation::Flashcard(eval) => &eval.feedback,
        }
    }
}

//
// ─── RECORDED ANSWER ──────────────────────────────────────────────────────────
//

/// A learner response bound to one item. Immutable once recorded.
///
/// Conversational turns carry no evaluation; the service reacts to them in
/// the next turn instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAnswer {
    pub answer: String,
    pub evaluation: Option<Evaluation>,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_points_follow_correctness() {
        let eval = QuizEvaluation {
            is_correct: true,
            feedback: "Correct!".into(),
            explanation: None,
            reference_answer: "CN VII".into(),
            related_topic: None,
        };
        assert_eq!(Evaluation::Quiz(eval.clone()).points(), 1.0);
        let wrong = QuizEvaluation {
            is_correct: false,
            ..eval
        };
        assert_eq!(Evaluation::Quiz(wrong).points(), 0.0);
    }

    #[test]
    fn flashcard_score_must_be_in_unit_range() {
        assert!(FlashcardEvaluation::new(0.5, "partial", false, true).is_ok());
        assert!(FlashcardEvaluation::new(1.2, "", true, false).is_err());
        assert!(FlashcardEvaluation::new(f64::NAN, "", false, false).is_err());
        assert!(FlashcardEvaluation::new(-0.1, "", false, false).is_err());
    }
}
