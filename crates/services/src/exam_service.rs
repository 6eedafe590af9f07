use std::sync::Arc;

use prep_core::model::{
    AssignmentDraft, AssignmentTarget, CurrentUser, Exam, ExamAssignment, ExamDraft, ExamId,
    ExamPatch, NodeDraft, Role, ScoreRange, Section, SectionId, SectionOutline, Subject,
    SubjectId, SubjectOutline, Topic,
};
use prep_core::pagination::{Page, Paginated};
use prep_core::permissions::{
    can_create_exam, can_manage_institution, can_manage_user, can_update_exam, can_view_exam,
};
use serde::Serialize;
use storage::repository::{
    AssignmentRepository, CurriculumRepository, ExamRepository, ExamVisibility, StorageError,
    UserRepository,
};
use tracing::info;

use crate::Clock;
use crate::error::ExamServiceError;

/// An exam together with its live curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetail {
    #[serde(flatten)]
    pub exam: Exam,
    pub sections: Vec<SectionOutline>,
}

/// Public onboarding entry: an active exam and its score scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableExam {
    pub id: ExamId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub score_range: ScoreRange,
}

/// Which exams `user` may list: administrators see every exam, everyone
/// else the exams assigned to them or to their institution.
#[must_use]
pub fn visibility_for(user: &CurrentUser) -> ExamVisibility {
    match user.role {
        Role::Admin => ExamVisibility::All,
        _ => ExamVisibility::AssignedTo {
            user_id: user.id,
            institution_id: user.institution_id,
        },
    }
}

fn conflict(what: &'static str) -> impl FnOnce(StorageError) -> ExamServiceError {
    move |err| match err {
        StorageError::Conflict => ExamServiceError::Conflict(what),
        other => ExamServiceError::Storage(other),
    }
}

/// Exam catalogue, curriculum editing and exam assignment.
#[derive(Clone)]
pub struct ExamService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    curriculum: Arc<dyn CurriculumRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    users: Arc<dyn UserRepository>,
}

impl ExamService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        curriculum: Arc<dyn CurriculumRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            curriculum,
            assignments,
            users,
        }
    }

    /// Exams visible to `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if repository access fails.
    pub async fn list_exams(
        &self,
        user: &CurrentUser,
        page: Page,
    ) -> Result<Paginated<Exam>, ExamServiceError> {
        let exams = self
            .exams
            .list_visible_exams(visibility_for(user), page)
            .await?;
        Ok(exams)
    }

    /// Active exams ordered by name, with their score scales.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if repository access fails.
    pub async fn available_exams(&self) -> Result<Vec<AvailableExam>, ExamServiceError> {
        let exams = self.exams.list_available_exams().await?;
        Ok(exams
            .into_iter()
            .map(|exam| AvailableExam {
                score_range: ScoreRange::for_code(&exam.code),
                id: exam.id,
                name: exam.name,
                code: exam.code,
                description: exam.description,
            })
            .collect())
    }

    /// Fetch an exam with its sections, subjects and topics.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` for missing or deleted exams,
    /// `ExamServiceError::Forbidden` when `user` may not view it, and
    /// `ExamServiceError::Storage` if repository access fails.
    pub async fn get_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
    ) -> Result<ExamDetail, ExamServiceError> {
        let exam = self.viewable_exam(user, exam_id).await?;
        let outline = self.curriculum.exam_outline(exam.id).await?;
        Ok(ExamDetail {
            exam,
            sections: outline.sections,
        })
    }

    /// Subjects of an exam across all its sections, each with its topics.
    ///
    /// # Errors
    ///
    /// Same as [`ExamService::get_exam`].
    pub async fn list_subjects(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
    ) -> Result<Vec<SubjectOutline>, ExamServiceError> {
        let exam = self.viewable_exam(user, exam_id).await?;
        let outline = self.curriculum.exam_outline(exam.id).await?;
        Ok(outline.subjects().cloned().collect())
    }

    /// Create an exam. An institution admin's exam is assigned to their
    /// institution so they can go on managing it.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Forbidden` for roles that cannot create
    /// exams, `ExamServiceError::Validation` for bad input and
    /// `ExamServiceError::Conflict` when the code is taken.
    pub async fn create_exam(
        &self,
        user: &CurrentUser,
        draft: ExamDraft,
    ) -> Result<Exam, ExamServiceError> {
        if !can_create_exam(user) {
            return Err(ExamServiceError::Forbidden);
        }
        let validated = draft.validate()?;
        let now = self.clock.now();
        let exam = self
            .exams
            .insert_exam(&validated, now)
            .await
            .map_err(conflict("exam code"))?;

        if user.role == Role::InstitutionAdmin {
            if let Some(institution_id) = user.institution_id {
                self.assignments
                    .assign_exam(exam.id, AssignmentTarget::Institution(institution_id), now)
                    .await?;
            }
        }

        info!(user_id = %user.id, exam_id = %exam.id, code = %exam.code, "created exam");
        Ok(exam)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound`, `ExamServiceError::Forbidden`,
    /// `ExamServiceError::Validation`, or `ExamServiceError::Conflict` when
    /// the new code belongs to another live exam.
    pub async fn update_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
        patch: ExamPatch,
    ) -> Result<Exam, ExamServiceError> {
        let exam = self.editable_exam(user, exam_id).await?;
        let updated = exam.apply_patch(patch, self.clock.now())?;

        if updated.code != exam.code {
            if let Some(other) = self.exams.find_exam_by_code(&updated.code).await? {
                if other.id != exam.id {
                    return Err(ExamServiceError::Conflict("exam code"));
                }
            }
        }

        self.exams
            .update_exam(&updated)
            .await
            .map_err(conflict("exam code"))?;
        info!(user_id = %user.id, exam_id = %exam.id, "updated exam");
        Ok(updated)
    }

    /// Soft-delete an exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` or `ExamServiceError::Forbidden`.
    pub async fn delete_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
    ) -> Result<(), ExamServiceError> {
        let exam = self.editable_exam(user, exam_id).await?;
        self.exams
            .soft_delete_exam(exam.id, self.clock.now())
            .await?;
        info!(user_id = %user.id, exam_id = %exam.id, "deleted exam");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the exam is missing,
    /// `ExamServiceError::Forbidden` if `user` cannot edit it and
    /// `ExamServiceError::Conflict` on a duplicate code within the exam.
    pub async fn create_section(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
        draft: NodeDraft,
    ) -> Result<Section, ExamServiceError> {
        let exam = self.editable_exam(user, exam_id).await?;
        let node = draft.validate()?;
        let section = self
            .curriculum
            .insert_section(exam.id, &node, self.clock.now())
            .await
            .map_err(conflict("section code"))?;
        info!(exam_id = %exam.id, section_id = %section.id, "created section");
        Ok(section)
    }

    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the section is missing,
    /// `ExamServiceError::Forbidden` if `user` cannot edit its exam and
    /// `ExamServiceError::Conflict` on a duplicate code within the section.
    pub async fn create_subject(
        &self,
        user: &CurrentUser,
        section_id: SectionId,
        draft: NodeDraft,
    ) -> Result<Subject, ExamServiceError> {
        let section = self
            .curriculum
            .get_section(section_id)
            .await?
            .ok_or(ExamServiceError::NotFound("section"))?;
        self.editable_exam(user, section.exam_id).await?;
        let node = draft.validate()?;
        let subject = self
            .curriculum
            .insert_subject(section.id, &node, self.clock.now())
            .await
            .map_err(conflict("subject code"))?;
        info!(section_id = %section.id, subject_id = %subject.id, "created subject");
        Ok(subject)
    }

    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the subject is missing,
    /// `ExamServiceError::Forbidden` if `user` cannot edit its exam and
    /// `ExamServiceError::Conflict` on a duplicate code within the subject.
    pub async fn create_topic(
        &self,
        user: &CurrentUser,
        subject_id: SubjectId,
        draft: NodeDraft,
    ) -> Result<Topic, ExamServiceError> {
        let subject = self
            .curriculum
            .get_subject(subject_id)
            .await?
            .ok_or(ExamServiceError::NotFound("subject"))?;
        let section = self
            .curriculum
            .get_section(subject.section_id)
            .await?
            .ok_or(ExamServiceError::NotFound("section"))?;
        self.editable_exam(user, section.exam_id).await?;
        let node = draft.validate()?;
        let topic = self
            .curriculum
            .insert_topic(subject.id, &node, self.clock.now())
            .await
            .map_err(conflict("topic code"))?;
        info!(subject_id = %subject.id, topic_id = %topic.id, "created topic");
        Ok(topic)
    }

    /// Assign an exam to a user, an institution, or both.
    ///
    /// Institution admins may only target their own institution and its
    /// members.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Validation` when no target is given,
    /// `ExamServiceError::Forbidden` when `user` may not assign to the
    /// target and `ExamServiceError::NotFound` for unknown exams or users.
    pub async fn assign_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
        draft: AssignmentDraft,
    ) -> Result<ExamAssignment, ExamServiceError> {
        if !can_create_exam(user) {
            return Err(ExamServiceError::Forbidden);
        }
        let target = draft.target()?;
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or(ExamServiceError::NotFound("exam"))?;

        if let Some(institution_id) = target.institution_id() {
            if !can_manage_institution(user, Some(institution_id)) {
                return Err(ExamServiceError::Forbidden);
            }
        }
        if let Some(target_user) = target.user_id() {
            let member = self
                .users
                .get_user(target_user)
                .await?
                .ok_or(ExamServiceError::NotFound("user"))?;
            if !can_manage_user(user, member.id, member.institution_id) {
                return Err(ExamServiceError::Forbidden);
            }
        }

        let assignment = self
            .assignments
            .assign_exam(exam.id, target, self.clock.now())
            .await
            .map_err(|err| match err {
                StorageError::NotFound => ExamServiceError::NotFound("assignment target"),
                other => ExamServiceError::Storage(other),
            })?;
        info!(user_id = %user.id, exam_id = %exam.id, assignment_id = %assignment.id, "assigned exam");
        Ok(assignment)
    }

    async fn viewable_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
    ) -> Result<Exam, ExamServiceError> {
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or(ExamServiceError::NotFound("exam"))?;
        let institution = self.assignments.exam_institution(exam.id).await?;
        if !can_view_exam(user, institution) {
            return Err(ExamServiceError::Forbidden);
        }
        Ok(exam)
    }

    async fn editable_exam(
        &self,
        user: &CurrentUser,
        exam_id: ExamId,
    ) -> Result<Exam, ExamServiceError> {
        if !can_create_exam(user) {
            return Err(ExamServiceError::Forbidden);
        }
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or(ExamServiceError::NotFound("exam"))?;
        let institution = self.assignments.exam_institution(exam.id).await?;
        if !can_update_exam(user, institution) {
            return Err(ExamServiceError::Forbidden);
        }
        Ok(exam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use prep_core::model::{ExamStatus, InstitutionId, UserId};
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::repository::Storage;

    use crate::test_support::{exam, storage, user};

    fn service(storage: &Storage) -> ExamService {
        ExamService::new(
            fixed_clock(),
            Arc::clone(&storage.exams),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.users),
        )
    }

    fn node(code: &str, order: i64) -> NodeDraft {
        NodeDraft {
            name: format!("{code} name"),
            code: code.into(),
            description: None,
            order,
        }
    }

    fn exam_draft(code: &str) -> ExamDraft {
        ExamDraft {
            name: "Practice exam".into(),
            code: code.into(),
            ..ExamDraft::default()
        }
    }

    #[tokio::test]
    async fn only_admin_roles_create_exams() {
        let storage = storage("exam_create_roles").await;
        let exams = service(&storage);
        let admin = user(&storage, "admin@example.com", Role::Admin, None).await.current();
        let student = user(&storage, "s@example.com", Role::Individual, None).await.current();

        let created = exams.create_exam(&admin, exam_draft("mock-1")).await.unwrap();
        assert_eq!(created.code, "MOCK-1");
        assert_eq!(created.status, ExamStatus::Active);

        let err = exams.create_exam(&student, exam_draft("MOCK2")).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));

        let err = exams.create_exam(&admin, exam_draft("mock-1")).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn institution_admin_manages_own_exams_only() {
        let storage = storage("exam_institution_admin").await;
        let exams = service(&storage);
        let ours = storage.users.insert_institution("Ours", fixed_now()).await.unwrap();
        let theirs = storage.users.insert_institution("Theirs", fixed_now()).await.unwrap();
        let manager = user(&storage, "m@example.com", Role::InstitutionAdmin, Some(ours))
            .await
            .current();
        let rival = user(&storage, "r@example.com", Role::InstitutionAdmin, Some(theirs))
            .await
            .current();

        let created = exams.create_exam(&manager, exam_draft("INST1")).await.unwrap();
        assert_eq!(
            storage.assignments.exam_institution(created.id).await.unwrap(),
            Some(ours)
        );

        let patch = ExamPatch {
            name: Some("Renamed exam".into()),
            ..ExamPatch::default()
        };
        let updated = exams.update_exam(&manager, created.id, patch.clone()).await.unwrap();
        assert_eq!(updated.name, "Renamed exam");

        let err = exams.update_exam(&rival, created.id, patch).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));
        let err = exams.get_exam(&rival, created.id).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));

        let section = exams.create_section(&manager, created.id, node("GY", 1)).await.unwrap();
        assert_eq!(section.exam_id, created.id);
        let err = exams
            .create_section(&rival, created.id, node("GK", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));
    }

    #[tokio::test]
    async fn update_rejects_code_of_another_exam() {
        let storage = storage("exam_update_conflict").await;
        let exams = service(&storage);
        let admin = user(&storage, "a@example.com", Role::Admin, None).await.current();
        let first = exam(&storage, "FIRST").await;
        exam(&storage, "SECOND").await;

        let same_code = ExamPatch {
            code: Some("first".into()),
            ..ExamPatch::default()
        };
        assert!(exams.update_exam(&admin, first.id, same_code).await.is_ok());

        let taken = ExamPatch {
            code: Some("SECOND".into()),
            ..ExamPatch::default()
        };
        let err = exams.update_exam(&admin, first.id, taken).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleted_exams_disappear() {
        let storage = storage("exam_delete").await;
        let exams = service(&storage);
        let admin = user(&storage, "a@example.com", Role::Admin, None).await.current();
        let doomed = exam(&storage, "DOOMED").await;

        exams.delete_exam(&admin, doomed.id).await.unwrap();
        let err = exams.get_exam(&admin, doomed.id).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::NotFound("exam")));
        let err = exams.delete_exam(&admin, doomed.id).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::NotFound("exam")));
        assert!(exams.available_exams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn curriculum_is_built_under_existing_parents() {
        let storage = storage("exam_curriculum").await;
        let exams = service(&storage);
        let admin = user(&storage, "a@example.com", Role::Admin, None).await.current();
        let kpss = exam(&storage, "KPSS").await;

        let section = exams.create_section(&admin, kpss.id, node("GY", 1)).await.unwrap();
        let subject = exams.create_subject(&admin, section.id, node("TR", 1)).await.unwrap();
        exams.create_topic(&admin, subject.id, node("PARAGRAF", 2)).await.unwrap();
        exams.create_topic(&admin, subject.id, node("DIL", 1)).await.unwrap();

        let err = exams
            .create_topic(&admin, subject.id, node("DIL", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Conflict(_)));

        let err = exams
            .create_subject(&admin, SectionId::new(9_999), node("XX", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::NotFound("section")));

        let err = exams
            .create_section(&admin, kpss.id, node("NEG", -1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Validation(_)));

        let detail = exams.get_exam(&admin, kpss.id).await.unwrap();
        let codes: Vec<_> = detail.sections[0].subjects[0]
            .topics
            .iter()
            .map(|t| t.code.as_str())
            .collect();
        assert_eq!(codes, vec!["DIL", "PARAGRAF"]);

        let subjects = exams.list_subjects(&admin, kpss.id).await.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].topics.len(), 2);
    }

    #[tokio::test]
    async fn listing_respects_visibility() {
        let storage = storage("exam_listing").await;
        let exams = service(&storage);
        let admin = user(&storage, "a@example.com", Role::Admin, None).await.current();
        let student = user(&storage, "s@example.com", Role::Individual, None).await.current();
        let assigned = exam(&storage, "ASSIGNED").await;
        exam(&storage, "OTHER").await;

        exams
            .assign_exam(
                &admin,
                assigned.id,
                AssignmentDraft {
                    user_id: Some(student.id),
                    institution_id: None,
                },
            )
            .await
            .unwrap();

        let all = exams.list_exams(&admin, Page::default()).await.unwrap();
        assert_eq!(all.meta.total, 2);
        let mine = exams.list_exams(&student, Page::default()).await.unwrap();
        assert_eq!(mine.meta.total, 1);
        assert_eq!(mine.items[0].id, assigned.id);
    }

    #[tokio::test]
    async fn assignment_rules() {
        let storage = storage("exam_assignment_rules").await;
        let exams = service(&storage);
        let ours = storage.users.insert_institution("Ours", fixed_now()).await.unwrap();
        let manager = user(&storage, "m@example.com", Role::InstitutionAdmin, Some(ours))
            .await
            .current();
        let member = user(&storage, "member@example.com", Role::Individual, Some(ours)).await;
        let outsider = user(&storage, "out@example.com", Role::Individual, None).await;
        let student = member.current();
        let target = exam(&storage, "TARGET").await;

        let err = exams
            .assign_exam(&manager, target.id, AssignmentDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Validation(_)));

        let ok = exams
            .assign_exam(
                &manager,
                target.id,
                AssignmentDraft {
                    user_id: Some(member.id),
                    institution_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(ok.user_id, Some(member.id));

        let err = exams
            .assign_exam(
                &manager,
                target.id,
                AssignmentDraft {
                    user_id: Some(outsider.id),
                    institution_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));

        let err = exams
            .assign_exam(
                &manager,
                target.id,
                AssignmentDraft {
                    user_id: None,
                    institution_id: Some(InstitutionId::new(ours.value() + 1)),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));

        let err = exams
            .assign_exam(
                &student,
                target.id,
                AssignmentDraft {
                    user_id: Some(student.id),
                    institution_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden));

        let err = exams
            .assign_exam(
                &manager,
                target.id,
                AssignmentDraft {
                    user_id: Some(UserId::new(9_999)),
                    institution_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::NotFound("user")));
    }

    #[tokio::test]
    async fn available_exams_carry_score_ranges() {
        let storage = storage("exam_available").await;
        let exams = service(&storage);
        exam(&storage, "YKS_TYT").await;
        exam(&storage, "ALES").await;

        let available = exams.available_exams().await.unwrap();
        let ales = available.iter().find(|e| e.code == "ALES").unwrap();
        assert!((ales.score_range.step - 0.5).abs() < f32::EPSILON);
        let tyt = available.iter().find(|e| e.code == "YKS_TYT").unwrap();
        assert_eq!(tyt.score_range.max_score, 500);

        let json = serde_json::to_value(ales).unwrap();
        assert_eq!(json["maxScore"], 100);
        assert_eq!(json["minScore"], 0);
    }
}
