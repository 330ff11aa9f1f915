#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod manager;
pub mod remote;
pub mod store;

pub use study_core::Clock;

pub use app_services::StudyServices;
pub use config::{StudyConfig, StudyConfigDraft};
pub use error::{
    AppServicesError, ConfigError, RemoteError, RemoteRejection, SessionError, TransportError,
};
pub use manager::SessionManager;
pub use remote::{ExerciseService, HttpExerciseService};
pub use store::SessionStore;
