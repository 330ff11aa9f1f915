use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Session, SessionKind};
use crate::error::ValidationError;
use crate::model::{ItemId, Modality, RecordedAnswer, SessionConfig};

/// One tutor turn of a Socratic dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingTurn {
    pub id: ItemId,
    pub question: Option<String>,
    pub explanation: Option<String>,
    pub hint: Option<String>,
    pub next_step: Option<String>,
    pub concepts_covered: Vec<String>,
}

/// A tutor reply as returned by the exercise service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeachingReply {
    pub question: Option<String>,
    pub explanation: Option<String>,
    pub hint: Option<String>,
    pub is_complete: bool,
    pub next_step: Option<String>,
    pub concepts_covered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingState {
    topic: String,
    turns: Vec<TeachingTurn>,
    concepts_covered: Vec<String>,
}

impl TeachingState {
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn turns(&self) -> &[TeachingTurn] {
        &self.turns
    }

    /// Every concept the tutor reported so far, first mention order, no repeats.
    #[must_use]
    pub fn concepts_covered(&self) -> &[String] {
        &self.concepts_covered
    }

    /// Every tutor turn is answerable; the newest one is open.
    pub(crate) fn open_turn_id(&self) -> Option<&ItemId> {
        self.turns.last().map(|t| &t.id)
    }

    fn push(&mut self, reply: TeachingReply) {
        for concept in &reply.concepts_covered {
            if !self.concepts_covered.contains(concept) {
                self.concepts_covered.push(concept.clone());
            }
        }
        self.turns.push(TeachingTurn {
            id: ItemId::turn(self.turns.len() + 1),
            question: reply.question,
            explanation: reply.explanation,
            hint: reply.hint,
            next_step: reply.next_step,
            concepts_covered: reply.concepts_covered,
        });
    }
}

impl Session {
    /// Start a Socratic dialogue from the tutor's opening turn.
    ///
    /// If the tutor already reports the topic as covered, the session is created
    /// and immediately completed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingTopic` if the config has no topic.
    pub fn start_teaching(
        config: SessionConfig,
        opening: TeachingReply,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let topic = config
            .topic()
            .ok_or(ValidationError::MissingTopic(Modality::Teaching))?
            .to_string();
        let finished = opening.is_complete;
        let mut state = TeachingState {
            topic,
            turns: Vec::new(),
            concepts_covered: Vec::new(),
        };
        state.push(opening);

        let mut session = Self::begin(config, SessionKind::Teaching(state), now)?;
        if finished {
            session.complete(now);
        }
        Ok(session)
    }

    #[must_use]
    pub fn teaching(&self) -> Option<&TeachingState> {
        match self.kind() {
            SessionKind::Teaching(state) => Some(state),
            _ => None,
        }
    }

    /// Record the learner's reply to the open tutor turn.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` under the same rules as [`Session::check_answer`].
    pub fn record_teaching_reply(
        &mut self,
        item_id: &ItemId,
        raw: &str,
        at: DateTime<Utc>,
    ) -> Result<&RecordedAnswer, ValidationError> {
        self.ensure_modality(Modality::Teaching)?;
        self.record(item_id, raw, None, at)
    }

    /// The learner's replies in turn order; sent as `previous_responses`.
    #[must_use]
    pub fn prior_responses(&self) -> Vec<String> {
        let Some(state) = self.teaching() else {
            return Vec::new();
        };
        state
            .turns()
            .iter()
            .filter_map(|turn| self.answer(&turn.id).map(|a| a.answer.clone()))
            .collect()
    }

    /// Append the tutor's next turn and complete the session if it says so.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the open turn has not been answered or the
    /// session is not an active teaching session.
    pub fn apply_teaching_reply(
        &mut self,
        reply: TeachingReply,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.ensure_modality(Modality::Teaching)?;
        self.check_advance()?;

        let finished = reply.is_complete;
        if let SessionKind::Teaching(state) = &mut self.kind {
            state.push(reply);
        }
        self.cursor = self.item_count() - 1;
        self.furthest = self.cursor;

        if finished {
            self.complete(at);
        } else {
            self.touch(at);
        }
        Ok(())
    }
}
