#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use storage::repository::{
    InMemoryRepository, RecordKey, RecordRepository, StorageError, StoredRecord,
};

use services::remote::{
    ClinicalInteractRequest, ClinicalStartRequest, FlashcardAnalyzeRequest,
    FlashcardEvaluateRequest, FlashcardsRequest, QuizAnswerRequest, QuizStartRequest,
    TeachingRequest,
};
use services::{ExerciseService, RemoteError, TransportError};
use study_core::model::{FlashcardEvaluation, ItemId, QuizEvaluation};
use study_core::session::{
    ClinicalOpening, ClinicalReply, ClinicalStage, FlashcardAnalysis, FlashcardState,
    QuestionKind, QuizQuestion, QuizState, TeachingReply,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Script<T> = Mutex<VecDeque<Result<T, RemoteError>>>;

fn pop<T>(script: &Script<T>, what: &str) -> Result<T, RemoteError> {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(TransportError::Other(format!("no scripted {what}")).into()))
}

/// Scripted exercise service. Each operation pops its next reply from a queue.
#[derive(Default)]
pub struct FakeService {
    pub start_failure: Mutex<Option<RemoteError>>,
    pub quiz_answers: Script<QuizEvaluation>,
    pub flashcard_scores: Script<FlashcardEvaluation>,
    pub teaching_replies: Script<TeachingReply>,
    pub clinical_replies: Script<ClinicalReply>,
    pub analyses: Script<FlashcardAnalysis>,

    pub quiz_answer_requests: Mutex<Vec<QuizAnswerRequest>>,
    pub teaching_requests: Mutex<Vec<TeachingRequest>>,
    pub clinical_requests: Mutex<Vec<ClinicalInteractRequest>>,
    pub analyze_requests: Mutex<Vec<FlashcardAnalyzeRequest>>,

    /// When set, quiz answers wait for `release` after signalling `entered`.
    pub gated: bool,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    pub fn fail_next_start(&self, err: RemoteError) {
        *self.start_failure.lock().unwrap() = Some(err);
    }

    pub fn push_quiz_answer(&self, reply: Result<QuizEvaluation, RemoteError>) {
        self.quiz_answers.lock().unwrap().push_back(reply);
    }

    pub fn push_flashcard_score(&self, reply: Result<FlashcardEvaluation, RemoteError>) {
        self.flashcard_scores.lock().unwrap().push_back(reply);
    }

    pub fn push_teaching(&self, reply: Result<TeachingReply, RemoteError>) {
        self.teaching_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_clinical(&self, reply: Result<ClinicalReply, RemoteError>) {
        self.clinical_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_analysis(&self, reply: Result<FlashcardAnalysis, RemoteError>) {
        self.analyses.lock().unwrap().push_back(reply);
    }

    fn take_start_failure(&self) -> Result<(), RemoteError> {
        match self.start_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExerciseService for FakeService {
    async fn start_quiz(&self, request: &QuizStartRequest) -> Result<QuizState, RemoteError> {
        self.take_start_failure()?;
        let questions = (1..=request.num_questions)
            .map(|i| QuizQuestion {
                id: ItemId::new(format!("q{i}")),
                kind: QuestionKind::ShortAnswer,
                prompt: format!("Question {i}"),
                options: Vec::new(),
                reference_answer: format!("Answer {i}"),
            })
            .collect();
        Ok(QuizState::new(
            "quiz-1",
            request.topic.clone().unwrap_or_else(|| "Neuroanatomy".into()),
            request.difficulty_level,
            questions,
        ))
    }

    async fn submit_quiz_answer(
        &self,
        request: &QuizAnswerRequest,
    ) -> Result<QuizEvaluation, RemoteError> {
        self.quiz_answer_requests.lock().unwrap().push(request.clone());
        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        pop(&self.quiz_answers, "quiz answer")
    }

    async fn teach(&self, request: &TeachingRequest) -> Result<TeachingReply, RemoteError> {
        self.take_start_failure()?;
        self.teaching_requests.lock().unwrap().push(request.clone());
        pop(&self.teaching_replies, "teaching reply")
    }

    async fn start_clinical(
        &self,
        _request: &ClinicalStartRequest,
    ) -> Result<ClinicalOpening, RemoteError> {
        self.take_start_failure()?;
        Ok(ClinicalOpening {
            remote_id: "case-1".into(),
            patient_name: "Maria".into(),
            scenario_context: "Emergency department, 14:00".into(),
            initial_presentation: "A 67-year-old with sudden right-sided weakness.".into(),
            stage: ClinicalStage::Initial,
        })
    }

    async fn interact_clinical(
        &self,
        request: &ClinicalInteractRequest,
    ) -> Result<ClinicalReply, RemoteError> {
        self.clinical_requests.lock().unwrap().push(request.clone());
        pop(&self.clinical_replies, "clinical reply")
    }

    async fn generate_flashcards(
        &self,
        request: &FlashcardsRequest,
    ) -> Result<FlashcardState, RemoteError> {
        self.take_start_failure()?;
        let cards = (1..=request.num_cards)
            .map(|i| (format!("Front {i}"), format!("Back {i}")))
            .collect();
        Ok(FlashcardState::new(
            request.topic.clone().unwrap_or_else(|| "Brainstem".into()),
            cards,
        ))
    }

    async fn evaluate_flashcard(
        &self,
        _request: &FlashcardEvaluateRequest,
    ) -> Result<FlashcardEvaluation, RemoteError> {
        pop(&self.flashcard_scores, "flashcard score")
    }

    async fn analyze_flashcards(
        &self,
        request: &FlashcardAnalyzeRequest,
    ) -> Result<FlashcardAnalysis, RemoteError> {
        self.analyze_requests.lock().unwrap().push(request.clone());
        pop(&self.analyses, "analysis")
    }
}

pub fn verdict(is_correct: bool) -> QuizEvaluation {
    QuizEvaluation {
        is_correct,
        feedback: if is_correct { "Correct!" } else { "Not quite." }.into(),
        explanation: Some("The facial nerve exits via the stylomastoid foramen.".into()),
        reference_answer: "Facial nerve".into(),
        related_topic: Some("Cranial nerve VII".into()),
    }
}

pub fn card_score(score: f64) -> FlashcardEvaluation {
    FlashcardEvaluation::new(score, format!("scored {score}"), score >= 1.0, score > 0.0 && score < 1.0)
        .unwrap()
}

pub fn analysis() -> FlashcardAnalysis {
    FlashcardAnalysis {
        performance_summary: "Half of the material is secure.".into(),
        strengths: vec!["Cranial nerve nuclei".into()],
        areas_to_improve: vec!["Ascending tracts".into()],
        recommended_topics: vec!["Medulla".into()],
        next_difficulty: None,
    }
}

pub fn clinical_reply(content: &str, stage: ClinicalStage, available_hints: u32) -> ClinicalReply {
    ClinicalReply {
        content: content.into(),
        stage,
        available_hints,
        question_posed: None,
        guidance: None,
        is_correct_path: None,
        hint: None,
        session_complete: false,
        debrief: None,
    }
}

pub fn teaching_question(question: &str, concepts: &[&str]) -> TeachingReply {
    TeachingReply {
        question: Some(question.into()),
        concepts_covered: concepts.iter().map(|c| (*c).to_string()).collect(),
        ..TeachingReply::default()
    }
}

/// Record repository over `InMemoryRepository` that can hold or fail writes.
#[derive(Default)]
pub struct ScriptedRepository {
    inner: InMemoryRepository,
    fail_puts: bool,
    gate_next_put: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedRepository {
    /// Every `put_record` fails with a connection error.
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    /// The next `put_record` signals `entered` and waits for `release`.
    pub fn gate_next_put(&self) {
        self.gate_next_put.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordRepository for ScriptedRepository {
    async fn get_record(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StorageError> {
        self.inner.get_record(key).await
    }

    async fn put_record(
        &self,
        key: &RecordKey,
        payload: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if self.fail_puts {
            return Err(StorageError::Connection("disk full".into()));
        }
        if self.gate_next_put.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.put_record(key, payload, updated_at).await
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<(), StorageError> {
        self.inner.delete_record(key).await
    }

    async fn list_names(&self, scope: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_names(scope).await
    }
}
