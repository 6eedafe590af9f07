use std::sync::Arc;

use prep_core::model::{PomodoroDraft, PomodoroSession, PomodoroSessionId, StudyTotals, UserId};
use prep_core::pagination::{Page, PaginationMeta};
use prep_core::time::{start_of_day, start_of_week};
use serde::Serialize;
use storage::repository::{PomodoroRepository, StorageError};
use tracing::info;

use crate::Clock;
use crate::error::PomodoroServiceError;

/// Completed work sessions and study hours over three windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroStats {
    pub total_sessions: u64,
    pub total_study_hours: f64,
    pub today_sessions: u64,
    pub today_study_hours: f64,
    pub week_sessions: u64,
    pub week_study_hours: f64,
}

impl PomodoroStats {
    fn from_totals(total: StudyTotals, today: StudyTotals, week: StudyTotals) -> Self {
        Self {
            total_sessions: total.sessions,
            total_study_hours: total.hours(),
            today_sessions: today.sessions,
            today_study_hours: today.hours(),
            week_sessions: week.sessions,
            week_study_hours: week.hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroHistory {
    pub sessions: Vec<PomodoroSession>,
    pub pagination: PaginationMeta,
    pub stats: PomodoroStats,
}

/// Starts, completes and summarises Pomodoro sessions.
#[derive(Clone)]
pub struct PomodoroService {
    clock: Clock,
    pomodoros: Arc<dyn PomodoroRepository>,
}

impl PomodoroService {
    #[must_use]
    pub fn new(clock: Clock, pomodoros: Arc<dyn PomodoroRepository>) -> Self {
        Self { clock, pomodoros }
    }

    /// Open a new, incomplete session starting now.
    ///
    /// # Errors
    ///
    /// Returns `PomodoroServiceError::Validation` for a non-positive
    /// duration and `PomodoroServiceError::Storage` if the insert fails.
    pub async fn start(
        &self,
        user_id: UserId,
        draft: PomodoroDraft,
    ) -> Result<PomodoroSession, PomodoroServiceError> {
        let (duration, is_break) = draft.resolve()?;
        let session = self
            .pomodoros
            .insert_pomodoro(user_id, duration, is_break, self.clock.now())
            .await?;
        info!(user_id = %user_id, session_id = %session.id, duration, is_break, "started pomodoro");
        Ok(session)
    }

    /// Mark one of the user's sessions as completed.
    ///
    /// # Errors
    ///
    /// Returns `PomodoroServiceError::NotFound` when the session does not
    /// belong to the user, `PomodoroServiceError::AlreadyCompleted` when it
    /// was finished before and `PomodoroServiceError::Storage` on failure.
    pub async fn complete(
        &self,
        user_id: UserId,
        session_id: PomodoroSessionId,
    ) -> Result<PomodoroSession, PomodoroServiceError> {
        let mut session = self
            .pomodoros
            .get_pomodoro(user_id, session_id)
            .await?
            .ok_or(PomodoroServiceError::NotFound)?;
        session.complete(self.clock.now())?;
        match self.pomodoros.save_pomodoro_completion(&session).await {
            Ok(()) => {}
            // A concurrent request finished it first, or it was removed.
            Err(StorageError::NotFound) => {
                let current = self.pomodoros.get_pomodoro(user_id, session_id).await?;
                return Err(match current {
                    Some(_) => PomodoroServiceError::AlreadyCompleted,
                    None => PomodoroServiceError::NotFound,
                });
            }
            Err(other) => return Err(PomodoroServiceError::Storage(other)),
        }
        info!(user_id = %user_id, session_id = %session.id, "completed pomodoro");
        Ok(session)
    }

    /// Sessions newest first, plus totals for all time, today and this
    /// week (weeks start on Sunday, UTC).
    ///
    /// # Errors
    ///
    /// Returns `PomodoroServiceError::Storage` if a read fails.
    pub async fn history(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<PomodoroHistory, PomodoroServiceError> {
        let now = self.clock.now();
        let sessions = self.pomodoros.list_pomodoros(user_id, page).await?;
        let total = self.pomodoros.work_totals(user_id, None).await?;
        let today = self
            .pomodoros
            .work_totals(user_id, Some(start_of_day(now)))
            .await?;
        let week = self
            .pomodoros
            .work_totals(user_id, Some(start_of_week(now)))
            .await?;

        Ok(PomodoroHistory {
            sessions: sessions.items,
            pagination: sessions.meta,
            stats: PomodoroStats::from_totals(total, today, week),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use prep_core::model::Role;
    use prep_core::time::{fixed_clock, fixed_now};

    use crate::test_support::{storage, user};

    #[tokio::test]
    async fn start_applies_defaults() {
        let storage = storage("pomodoro_defaults").await;
        let service = PomodoroService::new(fixed_clock(), Arc::clone(&storage.pomodoros));
        let student = user(&storage, "p@example.com", Role::Individual, None).await;

        let session = service.start(student.id, PomodoroDraft::default()).await.unwrap();
        assert_eq!(session.duration, 25);
        assert!(!session.is_break);
        assert!(!session.completed);
        assert_eq!(session.started_at, fixed_now());

        let err = service
            .start(
                student.id,
                PomodoroDraft {
                    duration: Some(0),
                    is_break: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PomodoroServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn complete_once_and_only_own_sessions() {
        let storage = storage("pomodoro_complete").await;
        let service = PomodoroService::new(fixed_clock(), Arc::clone(&storage.pomodoros));
        let owner = user(&storage, "owner@example.com", Role::Individual, None).await;
        let other = user(&storage, "other@example.com", Role::Individual, None).await;

        let session = service.start(owner.id, PomodoroDraft::default()).await.unwrap();

        let err = service.complete(other.id, session.id).await.unwrap_err();
        assert!(matches!(err, PomodoroServiceError::NotFound));

        let done = service.complete(owner.id, session.id).await.unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(fixed_now()));

        let err = service.complete(owner.id, session.id).await.unwrap_err();
        assert!(matches!(err, PomodoroServiceError::AlreadyCompleted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completes_finish_a_session_once() {
        let storage = storage("pomodoro_concurrent").await;
        let service = PomodoroService::new(fixed_clock(), Arc::clone(&storage.pomodoros));
        let owner = user(&storage, "race@example.com", Role::Individual, None).await;

        for _ in 0..20 {
            let session = service.start(owner.id, PomodoroDraft::default()).await.unwrap();
            let first = service.clone();
            let second = service.clone();
            let (a, b) = tokio::join!(
                tokio::spawn(async move { first.complete(owner.id, session.id).await }),
                tokio::spawn(async move { second.complete(owner.id, session.id).await }),
            );
            let results = [a.unwrap(), b.unwrap()];

            let finished = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(finished, 1);
            assert!(results.iter().any(|r| matches!(
                r,
                Err(PomodoroServiceError::AlreadyCompleted)
            )));
        }
    }

    #[tokio::test]
    async fn history_windows_and_breaks() {
        let storage = storage("pomodoro_history").await;
        let student = user(&storage, "h@example.com", Role::Individual, None).await;
        let now = fixed_now();

        // Tuesday evening today, Monday this week, and the previous Saturday.
        for (started, minutes, is_break) in [
            (now - Duration::hours(1), 25, false),
            (now - Duration::hours(2), 5, true),
            (now - Duration::days(1), 50, false),
            (now - Duration::days(3), 30, false),
        ] {
            let earlier = PomodoroService::new(Clock::fixed(started), Arc::clone(&storage.pomodoros));
            let draft = PomodoroDraft {
                duration: Some(minutes),
                is_break: Some(is_break),
            };
            let session = earlier.start(student.id, draft).await.unwrap();
            earlier.complete(student.id, session.id).await.unwrap();
        }
        let service = PomodoroService::new(fixed_clock(), Arc::clone(&storage.pomodoros));
        service.start(student.id, PomodoroDraft::default()).await.unwrap();

        let history = service.history(student.id, Page::new(Some(1), Some(2))).await.unwrap();
        assert_eq!(history.sessions.len(), 2);
        assert_eq!(history.sessions[0].started_at, now);
        assert_eq!(history.pagination.total, 5);
        assert!(history.pagination.has_next);

        let stats = history.stats;
        assert_eq!(stats.total_sessions, 3);
        assert!((stats.total_study_hours - 1.8).abs() < f64::EPSILON);
        assert_eq!(stats.today_sessions, 1);
        assert!((stats.today_study_hours - 0.4).abs() < f64::EPSILON);
        assert_eq!(stats.week_sessions, 2);
        assert!((stats.week_study_hours - 1.3).abs() < f64::EPSILON);
    }
}
