use chrono::{DateTime, Utc};
use prep_core::model::{
    ExamId, ExamOutline, Section, SectionId, Subject, SubjectId, Topic, TopicId, ValidatedNode,
};

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, query_err, section_from_row, section_id_from_i64, subject_from_row,
    subject_id_from_i64, topic_from_row, topic_id_from_i64,
};
use crate::repository::{CurriculumRepository, StorageError};

#[async_trait::async_trait]
impl CurriculumRepository for SqliteRepository {
    async fn insert_section(
        &self,
        exam_id: ExamId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Section, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO sections (exam_id, code, name, description, sort_order, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("exam_id", exam_id.value())?)
        .bind(&node.code)
        .bind(&node.name)
        .bind(&node.description)
        .bind(i64::from(node.order))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(Section {
            id: section_id_from_i64(res.last_insert_rowid())?,
            exam_id,
            code: node.code.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            order: node.order,
        })
    }

    async fn insert_subject(
        &self,
        section_id: SectionId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Subject, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO subjects (section_id, code, name, description, sort_order, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("section_id", section_id.value())?)
        .bind(&node.code)
        .bind(&node.name)
        .bind(&node.description)
        .bind(i64::from(node.order))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(Subject {
            id: subject_id_from_i64(res.last_insert_rowid())?,
            section_id,
            code: node.code.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            order: node.order,
        })
    }

    async fn insert_topic(
        &self,
        subject_id: SubjectId,
        node: &ValidatedNode,
        now: DateTime<Utc>,
    ) -> Result<Topic, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO topics (subject_id, code, name, description, sort_order, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .bind(&node.code)
        .bind(&node.name)
        .bind(&node.description)
        .bind(i64::from(node.order))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(Topic {
            id: topic_id_from_i64(res.last_insert_rowid())?,
            subject_id,
            code: node.code.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            order: node.order,
        })
    }

    async fn get_section(&self, id: SectionId) -> Result<Option<Section>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT s.id, s.exam_id, s.code, s.name, s.description, s.sort_order
            FROM sections s
            JOIN exams e ON e.id = s.exam_id
            WHERE s.id = ?1 AND s.deleted_at IS NULL AND e.deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("section_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(section_from_row).transpose()
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT sb.id, sb.section_id, sb.code, sb.name, sb.description, sb.sort_order
            FROM subjects sb
            JOIN sections s ON s.id = sb.section_id
            JOIN exams e ON e.id = s.exam_id
            WHERE sb.id = ?1
              AND sb.deleted_at IS NULL AND s.deleted_at IS NULL AND e.deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("subject_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(subject_from_row).transpose()
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT t.id, t.subject_id, t.code, t.name, t.description, t.sort_order
            FROM topics t
            JOIN subjects sb ON sb.id = t.subject_id
            JOIN sections s ON s.id = sb.section_id
            JOIN exams e ON e.id = s.exam_id
            WHERE t.id = ?1
              AND t.deleted_at IS NULL AND sb.deleted_at IS NULL
              AND s.deleted_at IS NULL AND e.deleted_at IS NULL
            ",
        )
        .bind(id_to_i64("topic_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(topic_from_row).transpose()
    }

    async fn exam_outline(&self, exam_id: ExamId) -> Result<ExamOutline, StorageError> {
        let exam = id_to_i64("exam_id", exam_id.value())?;

        let section_rows = sqlx::query(
            r"
            SELECT id, exam_id, code, name, description, sort_order
            FROM sections
            WHERE exam_id = ?1 AND deleted_at IS NULL
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .bind(exam)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let subject_rows = sqlx::query(
            r"
            SELECT sb.id, sb.section_id, sb.code, sb.name, sb.description, sb.sort_order
            FROM subjects sb
            JOIN sections s ON s.id = sb.section_id
            WHERE s.exam_id = ?1 AND s.deleted_at IS NULL AND sb.deleted_at IS NULL
            ORDER BY sb.sort_order ASC, sb.id ASC
            ",
        )
        .bind(exam)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let topic_rows = sqlx::query(
            r"
            SELECT t.id, t.subject_id, t.code, t.name, t.description, t.sort_order
            FROM topics t
            JOIN subjects sb ON sb.id = t.subject_id
            JOIN sections s ON s.id = sb.section_id
            WHERE s.exam_id = ?1
              AND s.deleted_at IS NULL AND sb.deleted_at IS NULL AND t.deleted_at IS NULL
            ORDER BY t.sort_order ASC, t.id ASC
            ",
        )
        .bind(exam)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let sections = section_rows
            .iter()
            .map(section_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let subjects = subject_rows
            .iter()
            .map(subject_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let topics = topic_rows
            .iter()
            .map(topic_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExamOutline::assemble(sections, subjects, topics))
    }
}
