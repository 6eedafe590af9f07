use std::sync::Arc;

use prep_core::model::{
    CurrentUser, ExamSummary, ProgressStatus, TopicId, UserId, UserProgress,
};
use prep_core::pagination::{Page, Paginated};
use prep_core::progress::{ProgressCounts, ProgressReport, build_report};
use serde::{Deserialize, Serialize};
use storage::repository::{
    AssignmentRepository, CurriculumRepository, ExamRepository, NotesWrite, PomodoroRepository,
    ProgressFilter, ProgressRepository, StorageError, UserRepository,
};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressServiceError;
use crate::exam_service::visibility_for;

/// Body of a full progress write: status and notes together.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub topic_id: TopicId,
    pub status: ProgressStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGoals {
    pub target_score: Option<u32>,
    pub daily_study_hours: Option<u8>,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_exams: u64,
    pub active_exams: u64,
    pub total_subjects: u64,
    #[serde(flatten)]
    pub topics: ProgressCounts,
    pub total_study_hours: f64,
    pub total_pomodoro_sessions: u64,
    pub active_exam: Option<ExamSummary>,
    pub user: StudyGoals,
}

/// Progress recording and the reports built from it.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    curriculum: Arc<dyn CurriculumRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    pomodoros: Arc<dyn PomodoroRepository>,
    users: Arc<dyn UserRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        curriculum: Arc<dyn CurriculumRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        progress: Arc<dyn ProgressRepository>,
        pomodoros: Arc<dyn PomodoroRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            curriculum,
            assignments,
            progress,
            pomodoros,
            users,
        }
    }

    /// The nested section/subject/topic report for the user's active exam.
    ///
    /// A user without an active exam gets an empty report, not an error.
    /// Nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if any read fails.
    pub async fn detail_report(&self, user_id: UserId) -> Result<ProgressReport, ProgressServiceError> {
        let Some(exam) = self.assignments.active_exam_for_user(user_id).await? else {
            debug!(user_id = %user_id, "no active exam, empty report");
            return Ok(ProgressReport::empty());
        };
        let outline = self.curriculum.exam_outline(exam.id).await?;
        let statuses = self.progress.statuses_for_exam(user_id, exam.id).await?;
        Ok(build_report(exam.summary(), &outline, &statuses))
    }

    /// Dashboard headline numbers for `user`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if any read fails.
    pub async fn dashboard_stats(
        &self,
        user: &CurrentUser,
    ) -> Result<DashboardStats, ProgressServiceError> {
        let goals = self
            .users
            .get_user(user.id)
            .await?
            .map_or(
                StudyGoals {
                    target_score: None,
                    daily_study_hours: None,
                },
                |u| StudyGoals {
                    target_score: u.target_score,
                    daily_study_hours: u.daily_study_hours,
                },
            );
        let exam_totals = self.exams.exam_totals(visibility_for(user)).await?;
        let study = self.pomodoros.work_totals(user.id, None).await?;

        let mut total_subjects = 0;
        let mut topics = ProgressCounts::default();
        let active_exam = self.assignments.active_exam_for_user(user.id).await?;
        if let Some(exam) = &active_exam {
            let outline = self.curriculum.exam_outline(exam.id).await?;
            let statuses = self.progress.statuses_for_exam(user.id, exam.id).await?;
            let tally = |wanted: ProgressStatus| {
                statuses.values().filter(|s| **s == wanted).count() as u64
            };
            total_subjects = outline.subject_count() as u64;
            topics = ProgressCounts::from_status_counts(
                outline.topic_count() as u64,
                tally(ProgressStatus::Completed),
                tally(ProgressStatus::InProgress),
                tally(ProgressStatus::Reviewed),
            );
        }

        Ok(DashboardStats {
            total_exams: exam_totals.total,
            active_exams: exam_totals.active,
            total_subjects,
            topics,
            total_study_hours: study.hours(),
            total_pomodoro_sessions: study.sessions,
            active_exam: active_exam.map(|exam| exam.summary()),
            user: goals,
        })
    }

    /// Record status and notes for a topic; last write wins.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::TopicNotFound` for missing or deleted
    /// topics, `ProgressServiceError::Validation` for oversized notes and
    /// `ProgressServiceError::Storage` if the write fails.
    pub async fn record_progress(
        &self,
        user_id: UserId,
        update: ProgressUpdate,
    ) -> Result<UserProgress, ProgressServiceError> {
        self.write(
            user_id,
            update.topic_id,
            update.status,
            update.notes,
            NotesWrite::Replace,
        )
        .await
    }

    /// Change only the status of a topic, keeping any notes. REVIEWED is
    /// not accepted here.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::StatusNotAllowed` for REVIEWED, plus
    /// the errors of [`ProgressService::record_progress`].
    pub async fn set_topic_status(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        status: ProgressStatus,
    ) -> Result<UserProgress, ProgressServiceError> {
        if status == ProgressStatus::Reviewed {
            return Err(ProgressServiceError::StatusNotAllowed(status));
        }
        self.write(user_id, topic_id, status, None, NotesWrite::Keep)
            .await
    }

    /// The user's progress rows, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn list_progress(
        &self,
        user_id: UserId,
        filter: ProgressFilter,
        page: Page,
    ) -> Result<Paginated<UserProgress>, ProgressServiceError> {
        let rows = self.progress.list_progress(user_id, filter, page).await?;
        Ok(rows)
    }

    async fn write(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        status: ProgressStatus,
        notes: Option<String>,
        notes_write: NotesWrite,
    ) -> Result<UserProgress, ProgressServiceError> {
        if self.curriculum.get_topic(topic_id).await?.is_none() {
            return Err(ProgressServiceError::TopicNotFound);
        }
        let row = UserProgress::record(user_id, topic_id, status, notes, self.clock.now())?;
        let stored = self
            .progress
            .upsert_progress(&row, notes_write)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => ProgressServiceError::TopicNotFound,
                other => ProgressServiceError::Storage(other),
            })?;
        info!(user_id = %user_id, topic_id = %topic_id, status = status.as_str(), "recorded progress");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use prep_core::model::{
        AssignmentTarget, Exam, NodeDraft, Role, Topic, ValidatedNode,
    };
    use prep_core::progress::TopicState;
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::repository::Storage;

    use crate::test_support::{FailingProgress, exam, storage, user};

    fn service(storage: &Storage) -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.pomodoros),
            Arc::clone(&storage.users),
        )
    }

    fn node(code: &str, order: i64) -> ValidatedNode {
        NodeDraft {
            name: code.to_owned(),
            code: code.to_owned(),
            description: None,
            order,
        }
        .validate()
        .unwrap()
    }

    struct Kpss {
        exam: Exam,
        paragraf: Topic,
        dil_bilgisi: Topic,
        yazim: Topic,
        problemler: Topic,
    }

    /// KPSS > Genel Yetenek > {Türkçe: 3 topics, Matematik: 1 topic}.
    async fn kpss(storage: &Storage) -> Kpss {
        let exam = exam(storage, "KPSS").await;
        let now = fixed_now();
        let c = &storage.curriculum;
        let gy = c.insert_section(exam.id, &node("GENEL_YETENEK", 1), now).await.unwrap();
        let turkce = c.insert_subject(gy.id, &node("TURKCE", 1), now).await.unwrap();
        let matematik = c.insert_subject(gy.id, &node("MATEMATIK", 2), now).await.unwrap();
        let paragraf = c.insert_topic(turkce.id, &node("PARAGRAF", 1), now).await.unwrap();
        let dil_bilgisi = c.insert_topic(turkce.id, &node("DIL_BILGISI", 2), now).await.unwrap();
        let yazim = c.insert_topic(turkce.id, &node("YAZIM", 3), now).await.unwrap();
        let problemler = c.insert_topic(matematik.id, &node("PROBLEMLER", 1), now).await.unwrap();
        Kpss {
            exam,
            paragraf,
            dil_bilgisi,
            yazim,
            problemler,
        }
    }

    async fn assign(storage: &Storage, exam: &Exam, user_id: UserId) {
        storage
            .assignments
            .assign_exam(exam.id, AssignmentTarget::User(user_id), fixed_now())
            .await
            .unwrap();
    }

    fn status(id: TopicId, s: ProgressStatus) -> ProgressUpdate {
        ProgressUpdate {
            topic_id: id,
            status: s,
            notes: None,
        }
    }

    #[tokio::test]
    async fn no_active_exam_yields_empty_report() {
        let storage = storage("progress_empty").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;

        let report = progress.detail_report(student.id).await.unwrap();
        assert_eq!(report, ProgressReport::empty());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["exam"].is_null());
        assert_eq!(json["sections"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn one_completed_topic_of_three_is_33_percent() {
        let storage = storage("progress_kpss_33").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;
        assign(&storage, &kpss.exam, student.id).await;

        progress
            .record_progress(student.id, status(kpss.paragraf.id, ProgressStatus::Completed))
            .await
            .unwrap();

        let report = progress.detail_report(student.id).await.unwrap();
        assert_eq!(report.exam.as_ref().map(|e| e.code.as_str()), Some("KPSS"));
        let turkce = &report.sections[0].subjects[0];
        assert_eq!(turkce.code, "TURKCE");
        assert_eq!(turkce.counts.total_topics, 3);
        assert_eq!(turkce.counts.completed_topics, 1);
        assert_eq!(turkce.counts.not_started_topics, 2);
        assert_eq!(turkce.counts.progress_percentage, 33);
        assert_eq!(turkce.topics[0].status, TopicState::Completed);
        assert_eq!(turkce.topics[1].status, TopicState::NotStarted);
    }

    #[tokio::test]
    async fn reviewed_counts_as_done_but_is_tracked_apart() {
        let storage = storage("progress_kpss_reviewed").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;
        assign(&storage, &kpss.exam, student.id).await;

        for (topic, s) in [
            (kpss.paragraf.id, ProgressStatus::Completed),
            (kpss.dil_bilgisi.id, ProgressStatus::Reviewed),
            (kpss.yazim.id, ProgressStatus::InProgress),
        ] {
            progress.record_progress(student.id, status(topic, s)).await.unwrap();
        }

        let report = progress.detail_report(student.id).await.unwrap();
        let section = &report.sections[0];
        let turkce = &section.subjects[0];
        assert_eq!(turkce.counts.completed_topics, 1);
        assert_eq!(turkce.counts.reviewed_topics, 1);
        assert_eq!(turkce.counts.in_progress_topics, 1);
        assert_eq!(turkce.counts.not_started_topics, 0);
        assert_eq!(turkce.counts.progress_percentage, 67);
        assert_eq!(turkce.topics[1].status, TopicState::Completed);

        assert_eq!(section.counts.total_topics, 4);
        assert_eq!(section.counts.progress_percentage, 50);
    }

    #[tokio::test]
    async fn last_write_wins_and_completed_at_follows_status() {
        let storage = storage("progress_last_write").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;

        let done = progress
            .record_progress(student.id, status(kpss.problemler.id, ProgressStatus::Completed))
            .await
            .unwrap();
        assert_eq!(done.completed_at, Some(fixed_now()));

        let reopened = progress
            .set_topic_status(student.id, kpss.problemler.id, ProgressStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(reopened.status, ProgressStatus::InProgress);
        assert_eq!(reopened.completed_at, None);

        let rows = progress
            .list_progress(student.id, ProgressFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(rows.meta.total, 1);
    }

    #[tokio::test]
    async fn status_only_update_keeps_notes() {
        let storage = storage("progress_keep_notes").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;

        progress
            .record_progress(
                student.id,
                ProgressUpdate {
                    topic_id: kpss.paragraf.id,
                    status: ProgressStatus::InProgress,
                    notes: Some("  chapter 3  ".into()),
                },
            )
            .await
            .unwrap();
        let updated = progress
            .set_topic_status(student.id, kpss.paragraf.id, ProgressStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("chapter 3"));

        let err = progress
            .set_topic_status(student.id, kpss.paragraf.id, ProgressStatus::Reviewed)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::StatusNotAllowed(_)));
    }

    #[tokio::test]
    async fn unknown_topic_is_not_found() {
        let storage = storage("progress_unknown_topic").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;

        let err = progress
            .record_progress(student.id, status(TopicId::new(4_242), ProgressStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::TopicNotFound));
    }

    #[tokio::test]
    async fn oversized_notes_are_rejected() {
        let storage = storage("progress_long_notes").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;

        let err = progress
            .record_progress(
                student.id,
                ProgressUpdate {
                    topic_id: kpss.paragraf.id,
                    status: ProgressStatus::InProgress,
                    notes: Some("x".repeat(5_001)),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn dashboard_stats_derive_not_started() {
        let storage = storage("progress_dashboard").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;
        assign(&storage, &kpss.exam, student.id).await;
        exam(&storage, "UNASSIGNED").await;

        progress
            .record_progress(student.id, status(kpss.paragraf.id, ProgressStatus::Completed))
            .await
            .unwrap();
        progress
            .record_progress(student.id, status(kpss.yazim.id, ProgressStatus::NotStarted))
            .await
            .unwrap();

        let pomodoros = &storage.pomodoros;
        for minutes in [25, 50] {
            let mut session = pomodoros
                .insert_pomodoro(student.id, minutes, false, fixed_now() - Duration::hours(2))
                .await
                .unwrap();
            session.complete(fixed_now()).unwrap();
            pomodoros.save_pomodoro_completion(&session).await.unwrap();
        }
        pomodoros
            .insert_pomodoro(student.id, 25, false, fixed_now())
            .await
            .unwrap();

        let stats = progress.dashboard_stats(&student.current()).await.unwrap();
        assert_eq!(stats.total_exams, 1);
        assert_eq!(stats.active_exams, 1);
        assert_eq!(stats.total_subjects, 2);
        assert_eq!(stats.topics.total_topics, 4);
        assert_eq!(stats.topics.completed_topics, 1);
        assert_eq!(stats.topics.not_started_topics, 3);
        assert_eq!(stats.total_pomodoro_sessions, 2);
        assert!((stats.total_study_hours - 1.3).abs() < f64::EPSILON);
        assert_eq!(stats.active_exam.map(|e| e.id), Some(kpss.exam.id));
        assert_eq!(stats.user.target_score, Some(75));

        let json = serde_json::to_value(
            progress.dashboard_stats(&student.current()).await.unwrap(),
        )
        .unwrap();
        assert_eq!(json["notStartedTopics"], 3);
        assert_eq!(json["user"]["dailyStudyHours"], 3);
    }

    #[tokio::test]
    async fn dashboard_without_exam_is_all_zero() {
        let storage = storage("progress_dashboard_empty").await;
        let progress = service(&storage);
        let student = user(&storage, "s@example.com", Role::Individual, None).await;

        let stats = progress.dashboard_stats(&student.current()).await.unwrap();
        assert_eq!(stats.topics, ProgressCounts::default());
        assert_eq!(stats.total_subjects, 0);
        assert!(stats.active_exam.is_none());
        assert!(stats.total_study_hours.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn report_surfaces_storage_failure() {
        let storage = storage("progress_failing").await;
        let student = user(&storage, "s@example.com", Role::Individual, None).await;
        let kpss = kpss(&storage).await;
        assign(&storage, &kpss.exam, student.id).await;
        let progress = ProgressService::new(
            fixed_clock(),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.assignments),
            Arc::new(FailingProgress),
            Arc::clone(&storage.pomodoros),
            Arc::clone(&storage.users),
        );

        let err = progress.detail_report(student.id).await.unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Storage(StorageError::Connection(_))
        ));
    }
}
