use std::sync::Arc;

use sandbox::{Sandbox, SandboxConfig};
use storage::repository::Storage;

use crate::challenge_service::ChallengeService;
use crate::error::AppServicesError;
use crate::lessons::LessonLoopService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    lesson_loop: Arc<LessonLoopService>,
    challenges: Arc<ChallengeService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, config: SandboxConfig) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(&storage, config))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(config: SandboxConfig) -> Self {
        Self::with_storage(&Storage::in_memory(), config)
    }

    fn with_storage(storage: &Storage, config: SandboxConfig) -> Self {
        let sandbox = Sandbox::new(config);
        let lesson_loop = Arc::new(LessonLoopService::new(
            sandbox.clone(),
            Arc::clone(&storage.progress),
        ));
        let challenges = Arc::new(ChallengeService::new(sandbox));
        Self {
            lesson_loop,
            challenges,
        }
    }

    #[must_use]
    pub fn lesson_loop(&self) -> Arc<LessonLoopService> {
        Arc::clone(&self.lesson_loop)
    }

    #[must_use]
    pub fn challenges(&self) -> Arc<ChallengeService> {
        Arc::clone(&self.challenges)
    }
}
