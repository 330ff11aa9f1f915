//! Session envelope and the lifecycle rules shared by every modality.
//!
//! A [`Session`] only changes through the methods in this module tree. Each
//! `check_*` method validates an action without mutating, so callers can
//! validate, perform a remote call, and then commit with the matching
//! `record_*` / `apply_*` method, which re-validates before writing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::ValidationError;
use crate::model::{
    Evaluation, ItemId, Modality, RecordedAnswer, SessionConfig, SessionId, SessionStatus,
};

mod clinical;
mod flashcards;
mod progress;
mod quiz;
mod teaching;

pub use clinical::{
    CLINICAL_HINT_BUDGET, ClinicalDebrief, ClinicalOpening, ClinicalReply, ClinicalStage,
    ClinicalState, ClinicalTurn, ClinicalTurnKind,
};
pub use flashcards::{CardResult, Flashcard, FlashcardAnalysis, FlashcardState};
pub use progress::{ScoreSummary, SessionProgress};
pub use quiz::{QuestionKind, QuizQuestion, QuizState};
pub use teaching::{TeachingReply, TeachingState, TeachingTurn};

//
// ─── MODALITY STATE ────────────────────────────────────────────────────────────
//

/// Modality-specific half of a session: the item list plus any extra state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", content = "state", rename_all = "snake_case")]
pub enum SessionKind {
    Quiz(QuizState),
    Teaching(TeachingState),
    Clinical(ClinicalState),
    Flashcards(FlashcardState),
}

impl SessionKind {
    #[must_use]
    pub fn modality(&self) -> Modality {
        match self {
            SessionKind::Quiz(_) => Modality::Quiz,
            SessionKind::Teaching(_) => Modality::Teaching,
            SessionKind::Clinical(_) => Modality::Clinical,
            SessionKind::Flashcards(_) => Modality::Flashcards,
        }
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            SessionKind::Quiz(state) => state.questions().len(),
            SessionKind::Teaching(state) => state.turns().len(),
            SessionKind::Clinical(state) => state.turns().len(),
            SessionKind::Flashcards(state) => state.cards().len(),
        }
    }

    #[must_use]
    pub fn item_id_at(&self, index: usize) -> Option<&ItemId> {
        match self {
            SessionKind::Quiz(state) => state.questions().get(index).map(|q| &q.id),
            SessionKind::Teaching(state) => state.turns().get(index).map(|t| &t.id),
            SessionKind::Clinical(state) => state.turns().get(index).map(|t| &t.id),
            SessionKind::Flashcards(state) => state.cards().get(index).map(|c| &c.id),
        }
    }

    fn position_of(&self, item_id: &ItemId) -> Option<usize> {
        (0..self.item_count()).find(|&i| self.item_id_at(i) == Some(item_id))
    }

    /// The item a new answer must target.
    fn answer_target(&self, cursor: usize) -> Option<&ItemId> {
        match self {
            SessionKind::Quiz(_) | SessionKind::Flashcards(_) => self.item_id_at(cursor),
            SessionKind::Teaching(state) => state.open_turn_id(),
            SessionKind::Clinical(state) => state.open_turn_id(),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One run of a study modality, from start to completion or reset.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    config: SessionConfig,
    cursor: usize,
    furthest: usize,
    answers: BTreeMap<ItemId, RecordedAnswer>,
    score: Option<f64>,
    kind: SessionKind,
}

impl Session {
    /// Build an active session around an initial item set.
    fn begin(
        config: SessionConfig,
        kind: SessionKind,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let count = kind.item_count();
        if count == 0 {
            return Err(ValidationError::NoItems);
        }

        let mut seen = HashSet::with_capacity(count);
        for index in 0..count {
            if let Some(id) = kind.item_id_at(index) {
                if !seen.insert(id) {
                    return Err(ValidationError::DuplicateItem(id.clone()));
                }
            }
        }

        let graded = kind.modality().is_graded();
        let cursor = if graded { 0 } else { count - 1 };

        Ok(Self {
            id: SessionId::new_v4(),
            status: SessionStatus::Active,
            created_at: now,
            last_updated_at: now,
            config,
            cursor,
            furthest: cursor,
            answers: BTreeMap::new(),
            score: graded.then_some(0.0),
            kind,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn modality(&self) -> Modality {
        self.kind.modality()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    /// Index of the item currently presented.
    ///
    /// For completed quiz/flashcard sessions this equals `item_count()` until the
    /// learner navigates back to review an item.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Highest cursor position reached so far.
    #[must_use]
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.kind.item_count()
    }

    #[must_use]
    pub fn current_item_id(&self) -> Option<&ItemId> {
        self.kind.item_id_at(self.cursor)
    }

    /// The item the next answer must target, if any.
    #[must_use]
    pub fn answer_target(&self) -> Option<&ItemId> {
        self.kind.answer_target(self.cursor)
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<ItemId, RecordedAnswer> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, item_id: &ItemId) -> Option<&RecordedAnswer> {
        self.answers.get(item_id)
    }

    /// Running score total. `None` for conversational modalities.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    //
    // ─── SHARED CHECKS ─────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `ValidationError::AlreadyComplete` once the session has completed.
    pub fn ensure_active(&self) -> Result<(), ValidationError> {
        if self.is_complete() {
            return Err(ValidationError::AlreadyComplete);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ValidationError::WrongModality` if this session is another modality.
    pub fn ensure_modality(&self, expected: Modality) -> Result<(), ValidationError> {
        let actual = self.modality();
        if actual != expected {
            return Err(ValidationError::WrongModality { expected, actual });
        }
        Ok(())
    }

    /// Validate a submission without mutating. Returns the trimmed answer.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the session is complete, the item is unknown or
    /// already answered, the item is not the one currently awaiting an answer, or the
    /// answer is blank.
    pub fn check_answer(&self, item_id: &ItemId, raw: &str) -> Result<String, ValidationError> {
        self.ensure_active()?;
        if self.kind.position_of(item_id).is_none() {
            return Err(ValidationError::UnknownItem(item_id.clone()));
        }
        if self.answers.contains_key(item_id) {
            return Err(ValidationError::AlreadyAnswered(item_id.clone()));
        }
        let expected = self.answer_target().ok_or(ValidationError::NoOpenTurn)?;
        if expected != item_id {
            return Err(ValidationError::NotCurrentItem {
                expected: expected.clone(),
                got: item_id.clone(),
            });
        }

        let answer = raw.trim();
        if answer.is_empty() {
            return Err(ValidationError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }

    fn record(
        &mut self,
        item_id: &ItemId,
        raw: &str,
        evaluation: Option<Evaluation>,
        at: DateTime<Utc>,
    ) -> Result<&RecordedAnswer, ValidationError> {
        let answer = self.check_answer(item_id, raw)?;

        if let (Some(score), Some(eval)) = (self.score.as_mut(), evaluation.as_ref()) {
            *score += eval.points();
        }
        self.answers.insert(
            item_id.clone(),
            RecordedAnswer {
                answer,
                evaluation,
                answered_at: at,
            },
        );
        self.touch(at);

        self.answers
            .get(item_id)
            .ok_or_else(|| ValidationError::UnknownItem(item_id.clone()))
    }

    /// Validate that `advance` may run now.
    ///
    /// Graded sessions need the item under the cursor answered; conversations need
    /// the open turn answered.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::AlreadyComplete` or `ValidationError::CurrentItemUnanswered`.
    pub fn check_advance(&self) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let target = if self.modality().is_graded() {
            self.current_item_id()
        } else {
            self.answer_target()
        };
        match target {
            Some(id) if self.answers.contains_key(id) => Ok(()),
            Some(_) => Err(ValidationError::CurrentItemUnanswered),
            None => Err(ValidationError::NoOpenTurn),
        }
    }

    //
    // ─── GRADED CURSOR ─────────────────────────────────────────────────────────
    //

    fn ensure_graded(&self) -> Result<(), ValidationError> {
        let modality = self.modality();
        if !modality.is_graded() {
            return Err(ValidationError::NavigationUnsupported(modality));
        }
        Ok(())
    }

    /// Move a quiz/flashcard cursor forward by one.
    ///
    /// Returns `true` when this step completed the session.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for conversational sessions, completed sessions, or
    /// when the current item is unanswered.
    pub fn advance_cursor(&mut self, at: DateTime<Utc>) -> Result<bool, ValidationError> {
        self.ensure_graded()?;
        self.check_advance()?;

        self.cursor += 1;
        self.furthest = self.furthest.max(self.cursor);
        if self.cursor >= self.item_count() {
            self.complete(at);
            return Ok(true);
        }
        self.touch(at);
        Ok(false)
    }

    /// Revisit a previously reached quiz/flashcard item without re-submitting.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NavigationOutOfRange` for items past the furthest
    /// visited position and `ValidationError::NavigationUnsupported` for conversations.
    pub fn navigate(&mut self, index: usize, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.ensure_graded()?;
        let last = self.item_count().saturating_sub(1);
        let furthest = self.furthest.min(last);
        if index > furthest {
            return Err(ValidationError::NavigationOutOfRange { index, furthest });
        }
        self.cursor = index;
        self.touch(at);
        Ok(())
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_updated_at {
            self.last_updated_at = at;
        }
    }

    fn complete(&mut self, at: DateTime<Utc>) {
        if self.status.can_transition_to(SessionStatus::Complete) {
            self.status = SessionStatus::Complete;
        }
        self.touch(at);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("modality", &self.modality())
            .field("status", &self.status)
            .field("items_len", &self.item_count())
            .field("cursor", &self.cursor)
            .field("answers_len", &self.answers.len())
            .field("score", &self.score)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Difficulty, FlashcardEvaluation, QuizEvaluation, SessionConfigDraft};
    use crate::time::fixed_now;

    pub(crate) fn quiz_session(count: usize) -> Session {
        let questions = (1..=count)
            .map(|i| QuizQuestion {
                id: ItemId::new(format!("q{i}")),
                kind: QuestionKind::ShortAnswer,
                prompt: format!("Question {i}"),
                options: Vec::new(),
                reference_answer: format!("Answer {i}"),
            })
            .collect();
        let config = SessionConfigDraft::new()
            .with_item_count(u32::try_from(count).unwrap())
            .validate(Modality::Quiz)
            .unwrap();
        let state = QuizState::new("quiz-1", "Cranial nerves", Difficulty::Undergrad, questions);
        Session::start_quiz(config, state, fixed_now()).unwrap()
    }

    pub(crate) fn verdict(is_correct: bool) -> QuizEvaluation {
        QuizEvaluation {
            is_correct,
            feedback: if is_correct { "Correct!" } else { "Incorrect." }.into(),
            explanation: None,
            reference_answer: "ref".into(),
            related_topic: None,
        }
    }

    #[test]
    fn new_session_starts_active_at_first_item() {
        let session = quiz_session(5);
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.score(), Some(0.0));
        assert!(session.answers().is_empty());
        assert_eq!(session.current_item_id(), Some(&ItemId::new("q1")));
    }

    #[test]
    fn second_submission_is_rejected_and_first_is_kept() {
        let mut session = quiz_session(2);
        let q1 = ItemId::new("q1");
        session
            .record_quiz_answer(&q1, "facial", verdict(true), fixed_now())
            .unwrap();

        let err = session
            .record_quiz_answer(&q1, "vagus", verdict(false), fixed_now())
            .unwrap_err();
        assert_eq!(err, ValidationError::AlreadyAnswered(q1.clone()));
        assert_eq!(session.answer(&q1).unwrap().answer, "facial");
        assert_eq!(session.score(), Some(1.0));
    }

    #[test]
    fn answering_a_future_item_is_rejected() {
        let session = quiz_session(3);
        let err = session.check_answer(&ItemId::new("q2"), "x").unwrap_err();
        assert!(matches!(err, ValidationError::NotCurrentItem { .. }));
    }

    #[test]
    fn blank_answers_are_rejected() {
        let session = quiz_session(1);
        let err = session.check_answer(&ItemId::new("q1"), "  \n").unwrap_err();
        assert_eq!(err, ValidationError::EmptyAnswer);
    }

    #[test]
    fn advance_requires_an_answer_and_completes_at_the_end() {
        let mut session = quiz_session(2);
        assert_eq!(
            session.advance_cursor(fixed_now()).unwrap_err(),
            ValidationError::CurrentItemUnanswered
        );

        for i in 1..=2 {
            let id = ItemId::new(format!("q{i}"));
            session
                .record_quiz_answer(&id, "answer", verdict(i == 1), fixed_now())
                .unwrap();
            let completed = session.advance_cursor(fixed_now()).unwrap();
            assert_eq!(completed, i == 2);
            assert_eq!(session.cursor(), i);
        }

        assert!(session.is_complete());
        assert_eq!(
            session.advance_cursor(fixed_now()).unwrap_err(),
            ValidationError::AlreadyComplete
        );
        assert_eq!(session.display_score(), Some(50));
    }

    #[test]
    fn navigation_is_limited_to_visited_items() {
        let mut session = quiz_session(3);
        session
            .record_quiz_answer(&ItemId::new("q1"), "a", verdict(true), fixed_now())
            .unwrap();
        session.advance_cursor(fixed_now()).unwrap();

        let err = session.navigate(2, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NavigationOutOfRange {
                index: 2,
                furthest: 1
            }
        );

        session.navigate(0, fixed_now()).unwrap();
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.current_item_id(), Some(&ItemId::new("q1")));
        assert!(session.answer(&ItemId::new("q1")).is_some());

        // reviewing an answered item leaves it answered; advancing returns to the live item
        session.advance_cursor(fixed_now()).unwrap();
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.furthest(), 1);
    }

    #[test]
    fn completed_sessions_can_still_be_reviewed() {
        let mut session = quiz_session(1);
        let id = ItemId::new("q1");
        session
            .record_quiz_answer(&id, "a", verdict(true), fixed_now())
            .unwrap();
        session.advance_cursor(fixed_now()).unwrap();
        assert_eq!(session.cursor(), 1);

        session.navigate(0, fixed_now()).unwrap();
        assert!(session.is_complete());
        assert_eq!(session.current_item_id(), Some(&id));
    }

    #[test]
    fn flashcard_evaluation_is_rejected_for_quiz() {
        let mut session = quiz_session(1);
        let eval = FlashcardEvaluation::new(1.0, "ok", true, false).unwrap();
        let err = session
            .record_flashcard_answer(&ItemId::new("q1"), "a", eval, fixed_now())
            .unwrap_err();
        assert!(matches!(err, ValidationError::WrongModality { .. }));
    }

    #[test]
    fn serde_round_trip_is_lossless() {
        let mut session = quiz_session(2);
        session
            .record_quiz_answer(&ItemId::new("q1"), "a", verdict(true), fixed_now())
            .unwrap();
        session.advance_cursor(fixed_now()).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
