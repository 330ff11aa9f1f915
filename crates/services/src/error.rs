//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::ValidationError;
use study_core::model::Modality;

//
// ─── REMOTE ────────────────────────────────────────────────────────────────────
//

/// The exercise service could not be reached or answered with something unreadable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    #[error("the study service took too long to respond; please try again")]
    Timeout,
    #[error("could not reach the study service; check your connection")]
    Unreachable,
    #[error("the study service sent a response that could not be read: {0}")]
    Malformed(String),
    #[error("request to the study service failed: {0}")]
    Other(String),
}

/// The service was reachable but declined the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteRejection {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteRejection {
    #[must_use]
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A well-formed reply that breaks the response contract.
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

/// Errors emitted by `ExerciseService` implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Rejected(#[from] RemoteRejection),
}

//
// ─── SESSION MANAGER ───────────────────────────────────────────────────────────
//

/// Errors emitted by `SessionManager`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a {modality} request is already in progress")]
    Busy { modality: Modality },
    #[error("no active {modality} session")]
    NoSession { modality: Modality },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("the {modality} session was replaced while the request was in flight")]
    Superseded { modality: Modality },
}

impl SessionError {
    /// Text suitable for showing to the learner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Remote(RemoteError::Rejected(rejection)) => rejection.message.clone(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Remote(RemoteError::Transport(_)))
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Remote(err.into())
    }
}

impl From<RemoteRejection> for SessionError {
    fn from(err: RemoteRejection) -> Self {
        SessionError::Remote(err.into())
    }
}

//
// ─── CONFIG AND BOOTSTRAP ──────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid request timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("invalid scope: {0}")]
    InvalidScope(String),
}

/// Errors emitted while bootstrapping study services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
