use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Session, SessionKind};
use crate::error::ValidationError;
use crate::model::{
    Difficulty, Evaluation, FlashcardEvaluation, ItemId, Modality, RecordedAnswer, SessionConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: ItemId,
    pub front: String,
    pub back: String,
}

/// Service feedback on a completed flashcard run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardAnalysis {
    pub performance_summary: String,
    pub strengths: Vec<String>,
    pub areas_to_improve: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub next_difficulty: Option<Difficulty>,
}

/// Per-card outcome sent along with the analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardState {
    topic: String,
    cards: Vec<Flashcard>,
    analysis: Option<FlashcardAnalysis>,
}

impl FlashcardState {
    /// Build the deck from `(front, back)` pairs, numbering cards `card-1..card-N`.
    #[must_use]
    pub fn new(topic: impl Into<String>, cards: Vec<(String, String)>) -> Self {
        let cards = cards
            .into_iter()
            .enumerate()
            .map(|(i, (front, back))| Flashcard {
                id: ItemId::card(i + 1),
                front,
                back,
            })
            .collect();
        Self {
            topic: topic.into(),
            cards,
            analysis: None,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    #[must_use]
    pub fn analysis(&self) -> Option<&FlashcardAnalysis> {
        self.analysis.as_ref()
    }
}

impl Session {
    /// # Errors
    ///
    /// Returns `ValidationError::NoItems` if the service returned no cards.
    pub fn start_flashcards(
        config: SessionConfig,
        state: FlashcardState,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::begin(config, SessionKind::Flashcards(state), now)
    }

    #[must_use]
    pub fn flashcards(&self) -> Option<&FlashcardState> {
        match self.kind() {
            SessionKind::Flashcards(state) => Some(state),
            _ => None,
        }
    }

    fn flashcards_mut(&mut self) -> Option<&mut FlashcardState> {
        match &mut self.kind {
            SessionKind::Flashcards(state) => Some(state),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Flashcard> {
        self.flashcards()?.cards().get(self.cursor())
    }

    /// # Errors
    ///
    /// Returns `ValidationError` under the same rules as [`Session::check_answer`], or
    /// `ValidationError::WrongModality` for non-flashcard sessions.
    pub fn record_flashcard_answer(
        &mut self,
        item_id: &ItemId,
        raw: &str,
        evaluation: FlashcardEvaluation,
        at: DateTime<Utc>,
    ) -> Result<&RecordedAnswer, ValidationError> {
        self.ensure_modality(Modality::Flashcards)?;
        self.record(item_id, raw, Some(Evaluation::Flashcard(evaluation)), at)
    }

    /// Answered cards in deck order, as sent to the analysis call.
    #[must_use]
    pub fn card_results(&self) -> Vec<CardResult> {
        let Some(state) = self.flashcards() else {
            return Vec::new();
        };
        state
            .cards()
            .iter()
            .filter_map(|card| {
                let recorded = self.answer(&card.id)?;
                let (score, feedback) = recorded
                    .evaluation
                    .as_ref()
                    .map_or((0.0, String::new()), |eval| {
                        (eval.points(), eval.feedback().to_string())
                    });
                Some(CardResult {
                    question: card.front.clone(),
                    user_answer: recorded.answer.clone(),
                    correct_answer: card.back.clone(),
                    score,
                    feedback,
                })
            })
            .collect()
    }

    /// True for a completed flashcard session that has no analysis yet.
    #[must_use]
    pub fn needs_analysis(&self) -> bool {
        self.is_complete() && self.flashcards().is_some_and(|s| s.analysis().is_none())
    }

    /// Attach the session analysis once the service returns it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongModality` for other modalities and
    /// `ValidationError::NotComplete` before the last card has been advanced past.
    pub fn store_analysis(
        &mut self,
        analysis: FlashcardAnalysis,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.ensure_modality(Modality::Flashcards)?;
        if !self.is_complete() {
            return Err(ValidationError::NotComplete);
        }
        if let Some(state) = self.flashcards_mut() {
            state.analysis = Some(analysis);
        }
        self.touch(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionConfigDraft;
    use crate::session::ScoreSummary;
    use crate::time::fixed_now;

    fn deck(count: usize) -> Session {
        let cards = (1..=count)
            .map(|i| (format!("Front {i}"), format!("Back {i}")))
            .collect();
        let config = SessionConfigDraft::new()
            .with_item_count(u32::try_from(count).unwrap())
            .validate(Modality::Flashcards)
            .unwrap();
        Session::start_flashcards(config, FlashcardState::new("Brainstem", cards), fixed_now())
            .unwrap()
    }

    fn graded(score: f64) -> FlashcardEvaluation {
        FlashcardEvaluation::new(score, format!("scored {score}"), score >= 1.0, score == 0.5)
            .unwrap()
    }

    #[test]
    fn cards_are_numbered_in_order() {
        let session = deck(3);
        let ids: Vec<_> = session
            .flashcards()
            .unwrap()
            .cards()
            .iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, ["card-1", "card-2", "card-3"]);
        assert_eq!(session.current_card().unwrap().front, "Front 1");
    }

    #[test]
    fn partial_scores_accumulate() {
        let mut session = deck(3);
        for (i, score) in [1.0, 0.5, 0.0].into_iter().enumerate() {
            let id = ItemId::card(i + 1);
            session
                .record_flashcard_answer(&id, "my answer", graded(score), fixed_now())
                .unwrap();
            session.advance_cursor(fixed_now()).unwrap();
        }

        assert!(session.is_complete());
        assert_eq!(session.score(), Some(1.5));
        assert_eq!(
            session.score_summary(),
            Some(ScoreSummary {
                total: 1.5,
                max: 3.0,
                percent: 50
            })
        );
        assert!(session.needs_analysis());

        let results = session.card_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].score, 0.5);
        assert_eq!(results[1].correct_answer, "Back 2");
    }

    #[test]
    fn analysis_requires_completion() {
        let mut session = deck(1);
        let analysis = FlashcardAnalysis {
            performance_summary: "Solid".into(),
            strengths: vec![],
            areas_to_improve: vec![],
            recommended_topics: vec!["Cerebellum".into()],
            next_difficulty: Some(Difficulty::Med),
        };
        assert_eq!(
            session.store_analysis(analysis.clone(), fixed_now()),
            Err(ValidationError::NotComplete)
        );

        session
            .record_flashcard_answer(&ItemId::card(1), "a", graded(1.0), fixed_now())
            .unwrap();
        session.advance_cursor(fixed_now()).unwrap();
        session.store_analysis(analysis.clone(), fixed_now()).unwrap();
        assert!(!session.needs_analysis());
        assert_eq!(session.flashcards().unwrap().analysis(), Some(&analysis));
    }
}
