use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use study_core::model::{FlashcardEvaluation, QuizEvaluation};
use study_core::session::{
    ClinicalOpening, ClinicalReply, FlashcardAnalysis, FlashcardState, QuizState, TeachingReply,
};

use super::wire::{
    ClinicalInteractResponse, ClinicalStartResponse, FlashcardAnalysisResponse,
    FlashcardEvaluationResponse, FlashcardsResponse, QuizAnswerResponse, QuizStartResponse,
    TeachingResponse, rejection_from_body,
};
use super::{
    ClinicalInteractRequest, ClinicalStartRequest, ExerciseService, FlashcardAnalyzeRequest,
    FlashcardEvaluateRequest, FlashcardsRequest, QuizAnswerRequest, QuizStartRequest,
    TeachingRequest,
};
use crate::config::StudyConfig;
use crate::error::{RemoteError, TransportError};

const QUIZ_START: &str = "quiz/start";
const QUIZ_ANSWER: &str = "quiz/answer";
const TEACH: &str = "teach";
const FLASHCARDS: &str = "study/flashcards";
const FLASHCARDS_EVALUATE: &str = "study/flashcards/evaluate";
const FLASHCARDS_ANALYZE: &str = "study/flashcards/analyze";
const CLINICAL_START: &str = "study/clinical/start";
const CLINICAL_INTERACT: &str = "study/clinical/interact";

/// `ExerciseService` over JSON/HTTP.
#[derive(Clone)]
pub struct HttpExerciseService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpExerciseService {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: &StudyConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url().as_str().trim_end_matches('/').to_owned(),
            api_key: config.api_key().map(str::to_owned),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RemoteError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "exercise service request");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::debug!(%url, status = status.as_u16(), "exercise service rejected request");
            return Err(rejection_from_body(status.as_u16(), &body_text).into());
        }

        let text = response.text().await.map_err(map_send_error)?;
        serde_json::from_str(&text)
            .map_err(|err| TransportError::Malformed(format!("{path}: {err}")).into())
    }
}

/// Classify a `reqwest` failure for the learner.
pub(crate) fn map_send_error(err: reqwest::Error) -> RemoteError {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Unreachable
    } else if err.is_decode() {
        TransportError::Malformed(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    };
    transport.into()
}

#[async_trait]
impl ExerciseService for HttpExerciseService {
    async fn start_quiz(&self, request: &QuizStartRequest) -> Result<QuizState, RemoteError> {
        let body: QuizStartResponse = self.post(QUIZ_START, request).await?;
        Ok(body.into_domain()?)
    }

    async fn submit_quiz_answer(
        &self,
        request: &QuizAnswerRequest,
    ) -> Result<QuizEvaluation, RemoteError> {
        let body: QuizAnswerResponse = self.post(QUIZ_ANSWER, request).await?;
        Ok(body.into_domain())
    }

    async fn teach(&self, request: &TeachingRequest) -> Result<TeachingReply, RemoteError> {
        let body: TeachingResponse = self.post(TEACH, request).await?;
        Ok(body.into_domain()?)
    }

    async fn start_clinical(
        &self,
        request: &ClinicalStartRequest,
    ) -> Result<ClinicalOpening, RemoteError> {
        let body: ClinicalStartResponse = self.post(CLINICAL_START, request).await?;
        Ok(body.into_domain()?)
    }

    async fn interact_clinical(
        &self,
        request: &ClinicalInteractRequest,
    ) -> Result<ClinicalReply, RemoteError> {
        let body: ClinicalInteractResponse = self.post(CLINICAL_INTERACT, request).await?;
        Ok(body.into_domain()?)
    }

    async fn generate_flashcards(
        &self,
        request: &FlashcardsRequest,
    ) -> Result<FlashcardState, RemoteError> {
        let body: FlashcardsResponse = self.post(FLASHCARDS, request).await?;
        Ok(body.into_domain()?)
    }

    async fn evaluate_flashcard(
        &self,
        request: &FlashcardEvaluateRequest,
    ) -> Result<FlashcardEvaluation, RemoteError> {
        let body: FlashcardEvaluationResponse = self.post(FLASHCARDS_EVALUATE, request).await?;
        Ok(body.into_domain()?)
    }

    async fn analyze_flashcards(
        &self,
        request: &FlashcardAnalyzeRequest,
    ) -> Result<FlashcardAnalysis, RemoteError> {
        let body: FlashcardAnalysisResponse = self.post(FLASHCARDS_ANALYZE, request).await?;
        Ok(body.into_domain())
    }
}

impl std::fmt::Debug for HttpExerciseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExerciseService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
