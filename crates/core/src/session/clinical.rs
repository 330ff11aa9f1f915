use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Session, SessionKind};
use crate::error::ValidationError;
use crate::model::{ItemId, Modality, RecordedAnswer, SessionConfig};

/// Hints available at the start of every clinical case.
pub const CLINICAL_HINT_BUDGET: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalStage {
    Initial,
    GatheringInfo,
    Diagnosis,
    Complete,
}

impl ClinicalStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClinicalStage::Initial => "initial",
            ClinicalStage::GatheringInfo => "gathering_info",
            ClinicalStage::Diagnosis => "diagnosis",
            ClinicalStage::Complete => "complete",
        }
    }
}

impl fmt::Display for ClinicalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClinicalStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(ClinicalStage::Initial),
            "gathering_info" => Ok(ClinicalStage::GatheringInfo),
            "diagnosis" => Ok(ClinicalStage::Diagnosis),
            "complete" => Ok(ClinicalStage::Complete),
            other => Err(format!("unknown clinical stage: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalTurnKind {
    /// The patient presentation that opens the case.
    Presentation,
    Response,
    /// A hint; never answerable.
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalTurn {
    pub id: ItemId,
    pub kind: ClinicalTurnKind,
    pub content: String,
    pub stage: ClinicalStage,
    pub question_posed: Option<String>,
    pub guidance: Option<String>,
    pub is_correct_path: Option<bool>,
}

/// End-of-case performance report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClinicalDebrief {
    pub performance_summary: String,
    #[serde(default)]
    pub correct_decisions: Vec<String>,
    #[serde(default)]
    pub missed_points: Vec<String>,
    /// Between 0 and 1.
    #[serde(default)]
    pub clinical_reasoning_score: f64,
    #[serde(default)]
    pub final_diagnosis_correct: bool,
    #[serde(default)]
    pub learning_points: Vec<String>,
    #[serde(default)]
    pub recommended_topics: Vec<String>,
}

/// What the service returns when a case is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicalOpening {
    pub remote_id: String,
    pub patient_name: String,
    pub scenario_context: String,
    pub initial_presentation: String,
    pub stage: ClinicalStage,
}

/// One service reply during a case, either to a learner message or a hint request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalReply {
    pub content: String,
    pub stage: ClinicalStage,
    pub available_hints: u32,
    pub question_posed: Option<String>,
    pub guidance: Option<String>,
    pub is_correct_path: Option<bool>,
    pub hint: Option<String>,
    pub session_complete: bool,
    pub debrief: Option<ClinicalDebrief>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalState {
    remote_id: String,
    patient_name: String,
    scenario_context: String,
    stage: ClinicalStage,
    hints_remaining: u32,
    turns: Vec<ClinicalTurn>,
    debrief: Option<ClinicalDebrief>,
}

impl ClinicalState {
    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    #[must_use]
    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    #[must_use]
    pub fn scenario_context(&self) -> &str {
        &self.scenario_context
    }

    #[must_use]
    pub fn stage(&self) -> ClinicalStage {
        self.stage
    }

    #[must_use]
    pub fn hints_remaining(&self) -> u32 {
        self.hints_remaining
    }

    #[must_use]
    pub fn turns(&self) -> &[ClinicalTurn] {
        &self.turns
    }

    #[must_use]
    pub fn debrief(&self) -> Option<&ClinicalDebrief> {
        self.debrief.as_ref()
    }

    pub(crate) fn open_turn_id(&self) -> Option<&ItemId> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.kind != ClinicalTurnKind::Hint)
            .map(|t| &t.id)
    }

    fn push(&mut self, kind: ClinicalTurnKind, content: String, reply: &ClinicalReply) {
        self.turns.push(ClinicalTurn {
            id: ItemId::turn(self.turns.len() + 1),
            kind,
            content,
            stage: reply.stage,
            question_posed: reply.question_posed.clone(),
            guidance: reply.guidance.clone(),
            is_correct_path: reply.is_correct_path,
        });
    }
}

impl Session {
    /// # Errors
    ///
    /// Returns `ValidationError` if the opening yields no usable turn.
    pub fn start_clinical(
        config: SessionConfig,
        opening: ClinicalOpening,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let state = ClinicalState {
            remote_id: opening.remote_id,
            patient_name: opening.patient_name,
            scenario_context: opening.scenario_context,
            stage: opening.stage,
            hints_remaining: CLINICAL_HINT_BUDGET,
            turns: vec![ClinicalTurn {
                id: ItemId::turn(1),
                kind: ClinicalTurnKind::Presentation,
                content: opening.initial_presentation,
                stage: opening.stage,
                question_posed: None,
                guidance: None,
                is_correct_path: None,
            }],
            debrief: None,
        };
        Self::begin(config, SessionKind::Clinical(state), now)
    }

    #[must_use]
    pub fn clinical(&self) -> Option<&ClinicalState> {
        match self.kind() {
            SessionKind::Clinical(state) => Some(state),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Returns `ValidationError` under the same rules as [`Session::check_answer`].
    pub fn record_clinical_reply(
        &mut self,
        item_id: &ItemId,
        raw: &str,
        at: DateTime<Utc>,
    ) -> Result<&RecordedAnswer, ValidationError> {
        self.ensure_modality(Modality::Clinical)?;
        self.record(item_id, raw, None, at)
    }

    /// The learner's reply to the open turn, if one has been recorded.
    #[must_use]
    pub fn pending_reply(&self) -> Option<&str> {
        let open = self.answer_target()?;
        self.answer(open).map(|a| a.answer.as_str())
    }

    /// Validate a hint request.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::HintsUnsupported` outside clinical cases and
    /// `ValidationError::HintBudgetExhausted` once every hint has been used.
    pub fn check_hint(&self) -> Result<(), ValidationError> {
        self.ensure_active()?;
        let state = self
            .clinical()
            .ok_or(ValidationError::HintsUnsupported(self.modality()))?;
        if state.hints_remaining == 0 {
            return Err(ValidationError::HintBudgetExhausted);
        }
        Ok(())
    }

    /// Append a hint turn and spend one hint. Status does not change.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` under the same rules as [`Session::check_hint`].
    pub fn apply_hint(&mut self, reply: ClinicalReply, at: DateTime<Utc>) -> Result<(), ValidationError> {
        self.check_hint()?;
        if let SessionKind::Clinical(state) = &mut self.kind {
            state.hints_remaining = (state.hints_remaining - 1).min(reply.available_hints);
            let content = reply.hint.clone().unwrap_or_else(|| reply.content.clone());
            state.push(ClinicalTurnKind::Hint, content, &reply);
        }
        self.cursor = self.item_count() - 1;
        self.furthest = self.cursor;
        self.touch(at);
        Ok(())
    }

    /// Append the service's response to the learner's last message.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the open turn has not been answered or the
    /// session is not an active clinical case.
    pub fn apply_clinical_reply(
        &mut self,
        reply: ClinicalReply,
        at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.ensure_modality(Modality::Clinical)?;
        self.check_advance()?;

        let finished = reply.session_complete;
        if let SessionKind::Clinical(state) = &mut self.kind {
            state.push(ClinicalTurnKind::Response, reply.content.clone(), &reply);
            state.stage = reply.stage;
            state.hints_remaining = state.hints_remaining.min(reply.available_hints);
            if finished {
                state.stage = ClinicalStage::Complete;
                state.hints_remaining = 0;
                state.debrief = reply.debrief;
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionConfigDraft;
    use crate::time::fixed_now;

    fn case() -> Session {
        let config = SessionConfigDraft::new().validate(Modality::Clinical).unwrap();
        let opening = ClinicalOpening {
            remote_id: "case-1".into(),
            patient_name: "Maria".into(),
            scenario_context: "Emergency department".into(),
            initial_presentation: "Sudden right-sided weakness.".into(),
            stage: ClinicalStage::Initial,
        };
        Session::start_clinical(config, opening, fixed_now()).unwrap()
    }

    fn reply(content: &str, available_hints: u32) -> ClinicalReply {
        ClinicalReply {
            content: content.into(),
            stage: ClinicalStage::GatheringInfo,
            available_hints,
            question_posed: None,
            guidance: None,
            is_correct_path: Some(true),
            hint: None,
            session_complete: false,
            debrief: None,
        }
    }

    #[test]
    fn hints_are_capped_at_the_budget() {
        let mut session = case();
        for left in (0..CLINICAL_HINT_BUDGET).rev() {
            let mut hint = reply("Consider the vascular territory.", left);
            hint.hint = Some(format!("hint with {left} left"));
            session.apply_hint(hint, fixed_now()).unwrap();
            assert_eq!(session.clinical().unwrap().hints_remaining(), left);
        }
        let turns = session.item_count();

        let err = session.apply_hint(reply("more", 0), fixed_now()).unwrap_err();
        assert_eq!(err, ValidationError::HintBudgetExhausted);
        assert_eq!(session.item_count(), turns);
        assert_eq!(session.clinical().unwrap().turns()[1].content, "hint with 2 left");
        assert!(!session.is_complete());
    }

    #[test]
    fn hint_turns_are_not_answerable() {
        let mut session = case();
        session.apply_hint(reply("Think MCA.", 2), fixed_now()).unwrap();
        assert_eq!(session.answer_target(), Some(&ItemId::turn(1)));
        assert_eq!(
            session.check_answer(&ItemId::turn(2), "stroke"),
            Err(ValidationError::NotCurrentItem {
                expected: ItemId::turn(1),
                got: ItemId::turn(2)
            })
        );
    }

    #[test]
    fn hints_are_only_offered_for_clinical_cases() {
        let session = crate::session::tests::quiz_session(1);
        assert_eq!(
            session.check_hint(),
            Err(ValidationError::HintsUnsupported(Modality::Quiz))
        );
    }

    #[test]
    fn completion_stores_the_debrief() {
        let mut session = case();
        session
            .record_clinical_reply(&ItemId::turn(1), "Check glucose, then CT head", fixed_now())
            .unwrap();
        assert_eq!(session.pending_reply(), Some("Check glucose, then CT head"));
        session.apply_clinical_reply(reply("Good. CT is clear.", 3), fixed_now()).unwrap();
        assert_eq!(session.pending_reply(), None);
        assert_eq!(session.clinical().unwrap().stage(), ClinicalStage::GatheringInfo);

        session
            .record_clinical_reply(&ItemId::turn(2), "Left MCA ischaemic stroke", fixed_now())
            .unwrap();
        let mut last = reply("Correct diagnosis.", 3);
        last.session_complete = true;
        last.debrief = Some(ClinicalDebrief {
            performance_summary: "Strong reasoning".into(),
            clinical_reasoning_score: 0.9,
            final_diagnosis_correct: true,
            ..ClinicalDebrief::default()
        });
        session.apply_clinical_reply(last, fixed_now()).unwrap();

        let state = session.clinical().unwrap();
        assert!(session.is_complete());
        assert_eq!(state.stage(), ClinicalStage::Complete);
        assert_eq!(state.hints_remaining(), 0);
        assert!(state.debrief().unwrap().final_diagnosis_correct);
        assert_eq!(session.score(), None);
    }

    #[test]
    fn stage_parses_from_wire_names() {
        assert_eq!("gathering_info".parse(), Ok(ClinicalStage::GatheringInfo));
        assert!("triage".parse::<ClinicalStage>().is_err());
    }
}
