//! Contract with the remote exercise service.
//!
//! Requests are plain serializable payloads. Responses are validated into
//! `study_core` types before they reach the session manager, so every
//! implementation returns domain values or a [`RemoteError`].

use async_trait::async_trait;
use serde::Serialize;

use study_core::model::{Difficulty, FlashcardEvaluation, QuizEvaluation, SystemFilter};
use study_core::session::{
    CardResult, ClinicalOpening, ClinicalReply, FlashcardAnalysis, FlashcardState, QuizState,
    TeachingReply,
};

use crate::error::RemoteError;

mod http;
pub mod wire;

pub use http::HttpExerciseService;

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStartRequest {
    pub user_id: String,
    pub topic: Option<String>,
    pub difficulty_level: Difficulty,
    pub system_filter: Option<SystemFilter>,
    pub num_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnswerRequest {
    pub user_id: String,
    pub quiz_id: String,
    pub question_id: String,
    pub answer: String,
}

/// Used both to open a dialogue (`previous_responses` empty) and to continue it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeachingRequest {
    pub user_id: String,
    pub topic: String,
    pub difficulty_level: Difficulty,
    pub previous_responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalStartRequest {
    pub user_id: String,
    pub topic: Option<String>,
    pub difficulty_level: Difficulty,
    pub system_filter: Option<SystemFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalInteractRequest {
    pub user_id: String,
    pub session_id: String,
    pub user_message: String,
    pub request_hint: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashcardsRequest {
    pub user_id: String,
    pub topic: Option<String>,
    pub num_cards: u32,
    pub difficulty_level: Difficulty,
    pub system_filter: Option<SystemFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashcardEvaluateRequest {
    pub user_id: String,
    pub question: String,
    pub correct_answer: String,
    pub user_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashcardAnalyzeRequest {
    pub user_id: String,
    pub topic: String,
    pub total_score: f64,
    pub max_score: f64,
    pub card_results: Vec<CardResult>,
}

//
// ─── SERVICE CONTRACT ──────────────────────────────────────────────────────────
//

/// One method per remote operation. Every call is a single attempt.
#[async_trait]
pub trait ExerciseService: Send + Sync {
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn start_quiz(&self, request: &QuizStartRequest) -> Result<QuizState, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn submit_quiz_answer(
        &self,
        request: &QuizAnswerRequest,
    ) -> Result<QuizEvaluation, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn teach(&self, request: &TeachingRequest) -> Result<TeachingReply, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn start_clinical(
        &self,
        request: &ClinicalStartRequest,
    ) -> Result<ClinicalOpening, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn interact_clinical(
        &self,
        request: &ClinicalInteractRequest,
    ) -> Result<ClinicalReply, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn generate_flashcards(
        &self,
        request: &FlashcardsRequest,
    ) -> Result<FlashcardState, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn evaluate_flashcard(
        &self,
        request: &FlashcardEvaluateRequest,
    ) -> Result<FlashcardEvaluation, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    async fn analyze_flashcards(
        &self,
        request: &FlashcardAnalyzeRequest,
    ) -> Result<FlashcardAnalysis, RemoteError>;
}
