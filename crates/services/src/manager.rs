//! Session Manager: the only entry point that mutates study sessions.
//!
//! Every operation follows the same two phases. Phase one takes the modality's
//! busy guard, copies the live session and validates the action locally. Phase
//! two awaits the exercise service (if needed), applies the result to the copy
//! and commits it back to the `SessionStore`. Any failure before the commit
//! leaves the live session untouched. Persistence runs after the commit and is
//! best effort.

use std::collections::HashMap;
use std::sync::Arc;

use storage::repository::{RecordKey, Storage, StorageError};
use study_core::model::{ItemId, Modality, RecordedAnswer, SessionConfigDraft, SessionStatus};
use study_core::session::{FlashcardAnalysis, QuizState};
use study_core::{Clock, Session, ValidationError};

use crate::error::{RemoteRejection, SessionError};
use crate::remote::{
    ClinicalInteractRequest, ClinicalStartRequest, ExerciseService, FlashcardAnalyzeRequest,
    FlashcardEvaluateRequest, FlashcardsRequest, QuizAnswerRequest, QuizStartRequest,
    TeachingRequest,
};
use crate::store::{BusyGuard, SessionStore};

/// Record name for a modality's persisted session.
#[must_use]
pub fn session_record_name(modality: Modality) -> String {
    format!("session.{modality}")
}

pub struct SessionManager {
    service: Arc<dyn ExerciseService>,
    storage: Storage,
    store: Arc<SessionStore>,
    clock: Clock,
    scope: String,
    /// Serializes record writes, deletes and restores per modality.
    writes: HashMap<Modality, tokio::sync::Mutex<()>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        service: Arc<dyn ExerciseService>,
        storage: Storage,
        store: Arc<SessionStore>,
        clock: Clock,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            service,
            storage,
            store,
            clock,
            scope: scope.into(),
            writes: Modality::ALL
                .into_iter()
                .map(|modality| (modality, tokio::sync::Mutex::new(())))
                .collect(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    //
    // ─── READ ──────────────────────────────────────────────────────────────────
    //

    /// Copy of the live session for rendering.
    #[must_use]
    pub fn session(&self, modality: Modality) -> Option<Session> {
        self.store.snapshot(modality)
    }

    #[must_use]
    pub fn is_busy(&self, modality: Modality) -> bool {
        self.store.is_busy(modality)
    }

    #[must_use]
    pub fn status(&self, modality: Modality) -> SessionStatus {
        self.session(modality)
            .map_or(SessionStatus::NotStarted, |s| s.status())
    }

    //
    // ─── START ─────────────────────────────────────────────────────────────────
    //

    /// Start a new session, replacing any existing one for the modality.
    ///
    /// Nothing is stored unless the service call succeeds.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` for a malformed config, `SessionError::Busy`
    /// while another call for the modality is in flight, and `SessionError::Remote` if
    /// the service fails or returns unusable content.
    pub async fn start(
        &self,
        modality: Modality,
        draft: SessionConfigDraft,
    ) -> Result<Session, SessionError> {
        let config = draft.validate(modality)?;
        let guard = self.store.lock(modality)?;
        let now = self.clock.now();
        tracing::debug!(%modality, "requesting opening content");

        let built = match modality {
            Modality::Quiz => {
                let request = QuizStartRequest {
                    user_id: self.scope.clone(),
                    topic: config.topic().map(str::to_owned),
                    difficulty_level: config.difficulty(),
                    system_filter: config.system_filter(),
                    num_questions: config.item_count().unwrap_or_default(),
                };
                let state: QuizState = self.service.start_quiz(&request).await?;
                Session::start_quiz(config, state, now)
            }
            Modality::Teaching => {
                let request = TeachingRequest {
                    user_id: self.scope.clone(),
                    topic: config.topic().unwrap_or_default().to_owned(),
                    difficulty_level: config.difficulty(),
                    previous_responses: Vec::new(),
                };
                let opening = self.service.teach(&request).await?;
                Session::start_teaching(config, opening, now)
            }
            Modality::Clinical => {
                let request = ClinicalStartRequest {
                    user_id: self.scope.clone(),
                    topic: config.topic().map(str::to_owned),
                    difficulty_level: config.difficulty(),
                    system_filter: config.system_filter(),
                };
                let opening = self.service.start_clinical(&request).await?;
                Session::start_clinical(config, opening, now)
            }
            Modality::Flashcards => {
                let request = FlashcardsRequest {
                    user_id: self.scope.clone(),
                    topic: config.topic().map(str::to_owned),
                    num_cards: config.item_count().unwrap_or_default(),
                    difficulty_level: config.difficulty(),
                    system_filter: config.system_filter(),
                };
                let state = self.service.generate_flashcards(&request).await?;
                Session::start_flashcards(config, state, now)
            }
        };
        let session = built.map_err(|err| RemoteRejection::contract(err.to_string()))?;

        self.store.commit(&guard, session.clone())?;
        tracing::info!(
            %modality,
            session_id = %session.id(),
            items = session.item_count(),
            "session started"
        );
        self.persist(&guard, &session).await;
        Ok(session)
    }

    //
    // ─── ANSWER ────────────────────────────────────────────────────────────────
    //

    /// Record an answer for `item_id`.
    ///
    /// Quiz and flashcard answers are graded by the service first; teaching and
    /// clinical replies are recorded locally and sent on the next `advance`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` when the answer is blank, the item is not the
    /// one awaiting an answer, or it was already answered; `SessionError::Remote` if
    /// grading fails. The session is unchanged on error.
    pub async fn submit_answer(
        &self,
        modality: Modality,
        item_id: &ItemId,
        raw_answer: &str,
    ) -> Result<RecordedAnswer, SessionError> {
        let guard = self.store.lock(modality)?;
        let mut session = guard.session()?;
        let answer = session.check_answer(item_id, raw_answer)?;
        tracing::debug!(%modality, %item_id, "submitting answer");

        let recorded = match modality {
            Modality::Quiz => {
                let quiz = session
                    .quiz()
                    .ok_or(ValidationError::WrongModality {
                        expected: modality,
                        actual: session.modality(),
                    })?;
                let request = QuizAnswerRequest {
                    user_id: self.scope.clone(),
                    quiz_id: quiz.remote_id().to_owned(),
                    question_id: item_id.to_string(),
                    answer: answer.clone(),
                };
                let evaluation = self.service.submit_quiz_answer(&request).await?;
                session
                    .record_quiz_answer(item_id, &answer, evaluation, self.clock.now())?
                    .clone()
            }
            Modality::Flashcards => {
                let card = session
                    .current_card()
                    .ok_or_else(|| ValidationError::UnknownItem(item_id.clone()))?;
                let request = FlashcardEvaluateRequest {
                    user_id: self.scope.clone(),
                    question: card.front.clone(),
                    correct_answer: card.back.clone(),
                    user_answer: answer.clone(),
                };
                let evaluation = self.service.evaluate_flashcard(&request).await?;
                session
                    .record_flashcard_answer(item_id, &answer, evaluation, self.clock.now())?
                    .clone()
            }
            Modality::Teaching => session
                .record_teaching_reply(item_id, &answer, self.clock.now())?
                .clone(),
            Modality::Clinical => session
                .record_clinical_reply(item_id, &answer, self.clock.now())?
                .clone(),
        };

        self.store.commit(&guard, session.clone())?;
        self.persist(&guard, &session).await;
        Ok(recorded)
    }

    //
    // ─── ADVANCE ───────────────────────────────────────────────────────────────
    //

    /// Move the session forward.
    ///
    /// Quiz/flashcards step the cursor and complete after the last item; a
    /// completed flashcard run then requests its analysis. Teaching/clinical send
    /// the learner's reply and append the service's next turn.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` if the current item or open turn is
    /// unanswered or the session is complete; `SessionError::Remote` if the
    /// conversational call fails.
    pub async fn advance(&self, modality: Modality) -> Result<Session, SessionError> {
        let guard = self.store.lock(modality)?;
        let mut session = guard.session()?;
        session.check_advance()?;
        let now = self.clock.now();

        match modality {
            Modality::Quiz | Modality::Flashcards => {
                session.advance_cursor(now)?;
            }
            Modality::Teaching => {
                let topic = session
                    .teaching()
                    .map(|t| t.topic().to_owned())
                    .unwrap_or_default();
                let request = TeachingRequest {
                    user_id: self.scope.clone(),
                    topic,
                    difficulty_level: session.config().difficulty(),
                    previous_responses: session.prior_responses(),
                };
                tracing::debug!(%modality, turns = session.item_count(), "continuing dialogue");
                let reply = self.service.teach(&request).await?;
                session.apply_teaching_reply(reply, self.clock.now())?;
            }
            Modality::Clinical => {
                let request = self.clinical_request(&session, false)?;
                tracing::debug!(%modality, turns = session.item_count(), "sending clinical reply");
                let reply = self.service.interact_clinical(&request).await?;
                session.apply_clinical_reply(reply, self.clock.now())?;
            }
        }

        self.store.commit(&guard, session.clone())?;
        tracing::debug!(%modality, cursor = session.cursor(), "advanced");
        if session.is_complete() {
            tracing::info!(
                %modality,
                session_id = %session.id(),
                score = ?session.score(),
                "session completed"
            );
        }
        self.persist(&guard, &session).await;

        if session.needs_analysis() {
            match self.analyze(&session).await {
                Ok(analysis) => {
                    let attached = self
                        .attach_analysis(&guard, session.clone(), analysis)
                        .await?;
                    if let Some(updated) = attached {
                        session = updated;
                    }
                }
                Err(err) => {
                    tracing::warn!(%modality, error = %err, "flashcard analysis failed");
                }
            }
        }
        Ok(session)
    }

    //
    // ─── HINTS ─────────────────────────────────────────────────────────────────
    //

    /// Spend one clinical hint.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` when the budget is exhausted or the session
    /// is not a clinical case; `SessionError::Remote` if the call fails, in which case
    /// no hint is spent.
    pub async fn request_hint(&self, modality: Modality) -> Result<Session, SessionError> {
        let guard = self.store.lock(modality)?;
        let mut session = guard.session()?;
        session.check_hint()?;

        let request = self.clinical_request(&session, true)?;
        let reply = self.service.interact_clinical(&request).await?;
        session.apply_hint(reply, self.clock.now())?;

        self.store.commit(&guard, session.clone())?;
        tracing::debug!(
            %modality,
            hints_left = ?session.clinical().map(|c| c.hints_remaining()),
            "hint given"
        );
        self.persist(&guard, &session).await;
        Ok(session)
    }

    //
    // ─── NAVIGATION / RESET / RESTORE ──────────────────────────────────────────
    //

    /// Review an earlier quiz/flashcard item.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` for indexes past the furthest visited item
    /// or for conversational modalities.
    pub async fn navigate(&self, modality: Modality, index: usize) -> Result<Session, SessionError> {
        let guard = self.store.lock(modality)?;
        let mut session = guard.session()?;
        session.navigate(index, self.clock.now())?;
        self.store.commit(&guard, session.clone())?;
        self.persist(&guard, &session).await;
        Ok(session)
    }

    /// Discard the live and persisted session for `modality`.
    ///
    /// Any call still in flight for the modality will not commit. A record write
    /// already under way finishes first and is then removed.
    pub async fn reset(&self, modality: Modality) {
        let _writes = self.write_lock(modality).await;
        let dropped = self.store.clear(modality);
        tracing::info!(
            %modality,
            session_id = ?dropped.as_ref().map(Session::id),
            "session reset"
        );
        match self.record_key(modality) {
            Ok(key) => {
                if let Err(err) = self.storage.remove(&key).await {
                    tracing::warn!(%modality, error = %err, "failed to remove persisted session");
                }
            }
            Err(err) => tracing::warn!(%modality, error = %err, "failed to remove persisted session"),
        }
    }

    /// Load the persisted session for `modality` into memory.
    ///
    /// A live session always wins over the stored one. Unreadable records are
    /// deleted and treated as absent.
    pub async fn restore(&self, modality: Modality) -> Option<Session> {
        if self.is_busy(modality) {
            return self.session(modality);
        }
        if let Some(live) = self.session(modality) {
            return Some(live);
        }

        let key = match self.record_key(modality) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(%modality, error = %err, "cannot restore session");
                return None;
            }
        };

        let _writes = self.write_lock(modality).await;
        match self.storage.load_json::<Session>(&key).await {
            Ok(Some(session)) if session.modality() == modality => {
                tracing::debug!(%modality, session_id = %session.id(), "session restored");
                self.store.install_if_empty(session)
            }
            Ok(Some(session)) => {
                tracing::warn!(
                    %modality,
                    found = %session.modality(),
                    "persisted session has the wrong modality; discarding"
                );
                self.discard(&key).await;
                None
            }
            Ok(None) => None,
            Err(StorageError::Serialization(reason)) => {
                tracing::warn!(%modality, %reason, "corrupt persisted session; discarding");
                self.discard(&key).await;
                None
            }
            Err(err) => {
                tracing::warn!(%modality, error = %err, "failed to read persisted session");
                None
            }
        }
    }

    //
    // ─── FLASHCARD ANALYSIS ────────────────────────────────────────────────────
    //

    /// Request the analysis of a completed flashcard run that has none yet.
    ///
    /// Returns the stored analysis without a call if it already exists.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` / `SessionError::Validation` if there is no
    /// completed flashcard session, and `SessionError::Remote` if the call fails.
    pub async fn retry_analysis(&self) -> Result<FlashcardAnalysis, SessionError> {
        let modality = Modality::Flashcards;
        let guard = self.store.lock(modality)?;
        let session = guard.session()?;
        if !session.is_complete() {
            return Err(ValidationError::NotComplete.into());
        }
        if let Some(existing) = session.flashcards().and_then(|s| s.analysis()) {
            return Ok(existing.clone());
        }

        let analysis = self.analyze(&session).await?;
        self.attach_analysis(&guard, session, analysis.clone()).await?;
        Ok(analysis)
    }

    async fn analyze(&self, session: &Session) -> Result<FlashcardAnalysis, SessionError> {
        let topic = session
            .flashcards()
            .map(|s| s.topic().to_owned())
            .unwrap_or_default();
        let summary = session
            .score_summary()
            .ok_or(ValidationError::NotComplete)?;
        let request = FlashcardAnalyzeRequest {
            user_id: self.scope.clone(),
            topic,
            total_score: summary.total,
            max_score: summary.max,
            card_results: session.card_results(),
        };
        tracing::debug!(total = summary.total, max = summary.max, "requesting flashcard analysis");
        Ok(self.service.analyze_flashcards(&request).await?)
    }

    async fn attach_analysis(
        &self,
        guard: &BusyGuard<'_>,
        mut session: Session,
        analysis: FlashcardAnalysis,
    ) -> Result<Option<Session>, SessionError> {
        session.store_analysis(analysis, self.clock.now())?;
        match self.store.commit(guard, session.clone()) {
            Ok(()) => {}
            Err(SessionError::Superseded { .. }) => return Ok(None),
            Err(err) => return Err(err),
        }
        tracing::info!(session_id = %session.id(), "flashcard analysis stored");
        self.persist(guard, &session).await;
        Ok(Some(session))
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    fn clinical_request(
        &self,
        session: &Session,
        request_hint: bool,
    ) -> Result<ClinicalInteractRequest, SessionError> {
        let state = session.clinical().ok_or(ValidationError::WrongModality {
            expected: Modality::Clinical,
            actual: session.modality(),
        })?;
        Ok(ClinicalInteractRequest {
            user_id: self.scope.clone(),
            session_id: state.remote_id().to_owned(),
            user_message: session.pending_reply().unwrap_or_default().to_owned(),
            request_hint,
        })
    }

    fn record_key(&self, modality: Modality) -> Result<RecordKey, StorageError> {
        RecordKey::new(self.scope.as_str(), session_record_name(modality))
    }

    async fn write_lock(&self, modality: Modality) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.writes.get(&modality) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Best-effort write; failures are logged and never surface to the caller.
    ///
    /// Skipped once a reset has superseded `guard`, so a discarded session is
    /// never written back.
    async fn persist(&self, guard: &BusyGuard<'_>, session: &Session) {
        let modality = session.modality();
        let _writes = self.write_lock(modality).await;
        if !self.store.is_current(guard) {
            tracing::debug!(%modality, session_id = %session.id(), "session superseded; not persisted");
            return;
        }
        let result = match self.record_key(modality) {
            Ok(key) => {
                self.storage
                    .save_json(&key, session, session.last_updated_at())
                    .await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => tracing::debug!(%modality, session_id = %session.id(), "session persisted"),
            Err(err) => tracing::warn!(
                %modality,
                session_id = %session.id(),
                error = %err,
                "failed to persist session"
            ),
        }
    }

    async fn discard(&self, key: &RecordKey) {
        if let Err(err) = self.storage.remove(key).await {
            tracing::warn!(%key, error = %err, "failed to discard persisted session");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("scope", &self.scope)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
