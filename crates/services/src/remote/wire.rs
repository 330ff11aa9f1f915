//! JSON bodies exchanged with the exercise service, and their validation into
//! domain values.
//!
//! A body that does not decode is a transport problem; a body that decodes but
//! breaks the contract (no items, duplicate ids, scores out of range) becomes a
//! [`RemoteRejection`].

use serde::Deserialize;
use std::collections::HashSet;

use study_core::model::{Difficulty, FlashcardEvaluation, ItemId, QuizEvaluation};
use study_core::session::{
    ClinicalDebrief, ClinicalOpening, ClinicalReply, ClinicalStage, FlashcardAnalysis,
    FlashcardState, QuestionKind, QuizQuestion, QuizState, TeachingReply,
};

use crate::error::RemoteRejection;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_stage(raw: &str) -> Result<ClinicalStage, RemoteRejection> {
    raw.parse().map_err(RemoteRejection::contract)
}

fn hint_count(raw: i64) -> Result<u32, RemoteRejection> {
    u32::try_from(raw)
        .map_err(|_| RemoteRejection::contract(format!("invalid available hint count: {raw}")))
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct QuizStartResponse {
    pub quiz_id: String,
    pub questions: Vec<QuizQuestionBody>,
    pub topic: String,
    pub difficulty_level: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct QuizQuestionBody {
    pub question_id: String,
    pub question: String,
    pub question_type: QuestionKind,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
}

impl QuizStartResponse {
    /// # Errors
    ///
    /// Returns `RemoteRejection` for an empty quiz, blank or duplicate question ids,
    /// or a multiple-choice question without options.
    pub fn into_domain(self) -> Result<QuizState, RemoteRejection> {
        if self.questions.is_empty() {
            return Err(RemoteRejection::contract("the service returned no questions"));
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(self.questions.len());
        for body in self.questions {
            let id: ItemId = body
                .question_id
                .parse()
                .map_err(|_| RemoteRejection::contract("a question is missing its id"))?;
            if !seen.insert(id.clone()) {
                return Err(RemoteRejection::contract(format!("duplicate question id: {id}")));
            }
            let options = body.options.unwrap_or_default();
            if body.question_type == QuestionKind::Mcq && options.is_empty() {
                return Err(RemoteRejection::contract(format!(
                    "multiple-choice question {id} has no options"
                )));
            }
            questions.push(QuizQuestion {
                id,
                kind: body.question_type,
                prompt: body.question,
                options,
                reference_answer: body.correct_answer,
            });
        }

        Ok(QuizState::new(
            self.quiz_id,
            self.topic,
            self.difficulty_level,
            questions,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct QuizAnswerResponse {
    pub feedback: QuizFeedbackBody,
}

#[derive(Debug, Deserialize)]
pub struct QuizFeedbackBody {
    pub is_correct: bool,
    pub feedback: String,
    #[serde(default)]
    pub explanation: Option<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub related_anatomy: Option<String>,
}

impl QuizAnswerResponse {
    #[must_use]
    pub fn into_domain(self) -> QuizEvaluation {
        let body = self.feedback;
        QuizEvaluation {
            is_correct: body.is_correct,
            feedback: body.feedback,
            explanation: non_blank(body.explanation),
            reference_answer: body.correct_answer,
            related_topic: non_blank(body.related_anatomy),
        }
    }
}

//
// ─── TEACHING ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct TeachingResponse {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub next_step: Option<String>,
    #[serde(default)]
    pub concepts_covered: Vec<String>,
}

impl TeachingResponse {
    /// # Errors
    ///
    /// Returns `RemoteRejection` when an unfinished dialogue turn carries neither a
    /// question nor an explanation.
    pub fn into_domain(self) -> Result<TeachingReply, RemoteRejection> {
        let question = non_blank(self.question);
        let explanation = non_blank(self.explanation);
        if !self.is_complete && question.is_none() && explanation.is_none() {
            return Err(RemoteRejection::contract("the tutor returned an empty turn"));
        }
        Ok(TeachingReply {
            question,
            explanation,
            hint: non_blank(self.hint),
            is_complete: self.is_complete,
            next_step: non_blank(self.next_step),
            concepts_covered: self.concepts_covered,
        })
    }
}

//
// ─── CLINICAL ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct ClinicalStartResponse {
    pub session_id: String,
    pub initial_presentation: String,
    pub patient_name: String,
    pub scenario_context: String,
    pub stage: String,
    pub available_hints: i64,
}

impl ClinicalStartResponse {
    /// # Errors
    ///
    /// Returns `RemoteRejection` for an unknown stage, a negative hint count, or an
    /// empty presentation.
    pub fn into_domain(self) -> Result<ClinicalOpening, RemoteRejection> {
        hint_count(self.available_hints)?;
        if self.initial_presentation.trim().is_empty() {
            return Err(RemoteRejection::contract("the case has no presentation"));
        }
        Ok(ClinicalOpening {
            remote_id: self.session_id,
            patient_name: self.patient_name,
            scenario_context: self.scenario_context,
            initial_presentation: self.initial_presentation,
            stage: parse_stage(&self.stage)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ClinicalInteractResponse {
    pub ai_response: String,
    #[serde(default)]
    pub revealed_information: Option<String>,
    pub stage: String,
    #[serde(default)]
    pub question_posed: Option<String>,
    #[serde(default)]
    pub is_correct_path: Option<bool>,
    #[serde(default)]
    pub guidance: Option<String>,
    #[serde(default)]
    pub hint_given: Option<String>,
    pub available_hints: i64,
    #[serde(default)]
    pub session_complete: bool,
    /// Free-form completion report; read leniently by [`debrief_from_value`].
    #[serde(default)]
    pub completion_data: Option<serde_json::Value>,
}

impl ClinicalInteractResponse {
    /// An unreadable `completion_data` is logged and dropped; the turn itself is kept.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejection` for an unknown stage or a negative hint count.
    pub fn into_domain(self) -> Result<ClinicalReply, RemoteRejection> {
        let available_hints = hint_count(self.available_hints)?;
        let stage = parse_stage(&self.stage)?;
        let debrief = self
            .completion_data
            .and_then(|value| match debrief_from_value(value) {
                Ok(debrief) => Some(debrief),
                Err(reason) => {
                    tracing::warn!(%reason, "ignoring unreadable clinical debrief");
                    None
                }
            });

        let content = match non_blank(self.revealed_information) {
            Some(revealed) => format!("{}\n\n{revealed}", self.ai_response),
            None => self.ai_response,
        };

        Ok(ClinicalReply {
            content,
            stage,
            available_hints,
            question_posed: non_blank(self.question_posed),
            guidance: non_blank(self.guidance),
            is_correct_path: self.is_correct_path,
            hint: non_blank(self.hint_given),
            session_complete: self.session_complete,
            debrief,
        })
    }
}

/// Read a completion report whose fields may be missing or loosely typed.
///
/// Numbers may arrive as strings and lists as a single string. Missing fields take
/// their defaults.
///
/// # Errors
///
/// Returns a reason when the value is not an object or the reasoning score is not
/// a number within `0..=1`.
pub fn debrief_from_value(value: serde_json::Value) -> Result<ClinicalDebrief, String> {
    use serde_json::Value;

    let fields = match value {
        Value::Object(fields) => fields,
        other => return Err(format!("expected an object, got {other}")),
    };

    let text = |key: &str| match fields.get(key) {
        Some(Value::String(text)) => Some(text.trim().to_owned()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let list = |key: &str| -> Vec<String> {
        match fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => non_blank(Some(text.trim().to_owned())),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(text)) => non_blank(Some(text.trim().to_owned()))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    };

    let clinical_reasoning_score = match fields.get("clinical_reasoning_score") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("unreadable reasoning score: {n}"))?,
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("unreadable reasoning score: {raw:?}"))?,
        Some(other) => return Err(format!("unreadable reasoning score: {other}")),
    };
    if !clinical_reasoning_score.is_finite() || !(0.0..=1.0).contains(&clinical_reasoning_score) {
        return Err(format!(
            "clinical reasoning score out of range: {clinical_reasoning_score}"
        ));
    }

    let final_diagnosis_correct = match fields.get("final_diagnosis_correct") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(raw)) => raw.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };

    Ok(ClinicalDebrief {
        performance_summary: text("performance_summary")
            .or_else(|| text("summary"))
            .unwrap_or_default(),
        correct_decisions: list("correct_decisions"),
        missed_points: list("missed_points"),
        clinical_reasoning_score,
        final_diagnosis_correct,
        learning_points: list("learning_points"),
        recommended_topics: list("recommended_topics"),
    })
}

//
// ─── FLASHCARDS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct FlashcardsResponse {
    pub flash_cards: Vec<FlashcardBody>,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardBody {
    #[serde(default, alias = "question")]
    pub front: Option<String>,
    #[serde(default, alias = "answer")]
    pub back: Option<String>,
}

impl FlashcardsResponse {
    /// Cards are kept even when a side is blank: a missing front reads `?` and a
    /// missing back stays empty.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejection` for an empty deck.
    pub fn into_domain(self) -> Result<FlashcardState, RemoteRejection> {
        if self.flash_cards.is_empty() {
            return Err(RemoteRejection::contract("the service returned no flashcards"));
        }
        let cards = self
            .flash_cards
            .into_iter()
            .map(|card| {
                let front = non_blank(card.front.map(|f| f.trim().to_owned()))
                    .unwrap_or_else(|| "?".to_owned());
                let back = card.back.map(|b| b.trim().to_owned()).unwrap_or_default();
                (front, back)
            })
            .collect();
        Ok(FlashcardState::new(self.topic, cards))
    }
}

#[derive(Debug, Deserialize)]
pub struct FlashcardEvaluationResponse {
    pub score: f64,
    pub feedback: String,
    pub is_correct: bool,
    #[serde(default)]
    pub is_partial: bool,
}

impl FlashcardEvaluationResponse {
    /// # Errors
    ///
    /// Returns `RemoteRejection` if the score is outside `0..=1`.
    pub fn into_domain(self) -> Result<FlashcardEvaluation, RemoteRejection> {
        FlashcardEvaluation::new(self.score, self.feedback, self.is_correct, self.is_partial)
            .map_err(|err| RemoteRejection::contract(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct FlashcardAnalysisResponse {
    pub performance_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_to_improve: Vec<String>,
    #[serde(default)]
    pub recommended_topics: Vec<String>,
    #[serde(default)]
    pub next_difficulty: Option<String>,
}

impl FlashcardAnalysisResponse {
    #[must_use]
    pub fn into_domain(self) -> FlashcardAnalysis {
        FlashcardAnalysis {
            performance_summary: self.performance_summary,
            strengths: self.strengths,
            areas_to_improve: self.areas_to_improve,
            recommended_topics: self.recommended_topics,
            next_difficulty: self.next_difficulty.and_then(|raw| raw.parse().ok()),
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Build a rejection from a non-success response.
///
/// Uses `detail` (a string, or the first `msg` of a validation error list) or
/// `message` from the body when present.
#[must_use]
pub fn rejection_from_body(status: u16, body: &str) -> RemoteRejection {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed.and_then(|err| {
        let detail = match err.detail {
            Some(serde_json::Value::String(text)) => Some(text),
            Some(serde_json::Value::Array(items)) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_owned),
            _ => None,
        };
        non_blank(detail).or_else(|| non_blank(err.message))
    });
    RemoteRejection::new(
        Some(status),
        message.unwrap_or_else(|| format!("the study service rejected the request (status {status})")),
    )
}
