use std::sync::Arc;

use chrono::Duration;
use storage::repository::{Storage, StorageError};

use crate::Clock;
use crate::auth_service::AuthService;
use crate::error::AppServicesError;
use crate::exam_service::ExamService;
use crate::pomodoro_service::PomodoroService;
use crate::progress_service::ProgressService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    auth: Arc<AuthService>,
    exams: Arc<ExamService>,
    progress: Arc<ProgressService>,
    pomodoros: Arc<PomodoroService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let auth = Arc::new(AuthService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.auth_sessions),
        ));
        let exams = Arc::new(ExamService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.users),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.pomodoros),
            Arc::clone(&storage.users),
        ));
        let pomodoros = Arc::new(PomodoroService::new(clock, Arc::clone(&storage.pomodoros)));

        Self {
            clock,
            storage,
            auth,
            exams,
            progress,
            pomodoros,
        }
    }

    /// Replace the login session lifetime.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.auth = Arc::new(self.auth.as_ref().clone().with_session_ttl(ttl));
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn pomodoros(&self) -> Arc<PomodoroService> {
        Arc::clone(&self.pomodoros)
    }

    /// Round-trip the store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` when the store is unreachable.
    pub async fn health(&self) -> Result<(), StorageError> {
        self.storage.health.ping().await
    }
}
