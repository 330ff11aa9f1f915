use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::StudyConfig;
use crate::error::AppServicesError;
use crate::manager::SessionManager;
use crate::remote::{ExerciseService, HttpExerciseService};
use crate::store::SessionStore;

/// Assembles the session manager with its storage and exercise service.
#[derive(Clone)]
pub struct StudyServices {
    manager: Arc<SessionManager>,
    store: Arc<SessionStore>,
}

impl StudyServices {
    /// Build services backed by `SQLite` storage and the HTTP exercise service.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or HTTP client setup fails.
    pub async fn new_sqlite(config: &StudyConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(config.database_url()).await?;
        let service: Arc<dyn ExerciseService> = Arc::new(HttpExerciseService::new(config)?);
        tracing::info!(
            base_url = config.base_url().as_str(),
            scope = config.scope(),
            "study services ready"
        );
        Ok(Self::assemble(service, storage, clock, config.scope()))
    }

    /// Build services over in-memory storage with the given exercise service.
    #[must_use]
    pub fn in_memory(service: Arc<dyn ExerciseService>, clock: Clock) -> Self {
        Self::assemble(
            service,
            Storage::in_memory(),
            clock,
            crate::config::DEFAULT_SCOPE,
        )
    }

    /// Build services over an existing `Storage`.
    #[must_use]
    pub fn with_storage(
        service: Arc<dyn ExerciseService>,
        storage: Storage,
        clock: Clock,
        scope: &str,
    ) -> Self {
        Self::assemble(service, storage, clock, scope)
    }

    fn assemble(
        service: Arc<dyn ExerciseService>,
        storage: Storage,
        clock: Clock,
        scope: &str,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        let manager = Arc::new(SessionManager::new(
            service,
            storage,
            Arc::clone(&store),
            clock,
            scope,
        ));
        Self { manager, store }
    }

    #[must_use]
    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.manager)
    }

    #[must_use]
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }
}
