use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, SectionId, SubjectId, TopicId};
use crate::model::validation::{self, ValidationError, DESCRIPTION_MAX_LEN};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error(transparent)]
    Field(#[from] ValidationError),

    #[error("order must be >= 0")]
    NegativeOrder,
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Shared unvalidated input for sections, subjects and topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDraft {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i64,
}

impl NodeDraft {
    /// # Errors
    ///
    /// Returns `CurriculumError` when a field is invalid or the order is negative.
    pub fn validate(self) -> Result<ValidatedNode, CurriculumError> {
        let name = validation::name("name", &self.name)?;
        let code = validation::code("code", &self.code)?;
        let description =
            validation::optional_text("description", self.description, DESCRIPTION_MAX_LEN)?;
        let order = u32::try_from(self.order).map_err(|_| CurriculumError::NegativeOrder)?;
        Ok(ValidatedNode {
            name,
            code,
            description,
            order,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNode {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub order: u32,
}

//
// ─── ENTITIES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub exam_id: ExamId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub section_id: SectionId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub order: u32,
}

//
// ─── OUTLINE ───────────────────────────────────────────────────────────────────
//

/// The ordered section → subject → topic tree of one exam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExamOutline {
    pub sections: Vec<SectionOutline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionOutline {
    #[serde(flatten)]
    pub section: Section,
    pub subjects: Vec<SubjectOutline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectOutline {
    #[serde(flatten)]
    pub subject: Subject,
    pub topics: Vec<Topic>,
}

impl ExamOutline {
    /// Build the tree from flat rows. Children whose parent is not among the
    /// given rows are dropped; every level is ordered by `(order, id)`.
    #[must_use]
    pub fn assemble(
        mut sections: Vec<Section>,
        mut subjects: Vec<Subject>,
        mut topics: Vec<Topic>,
    ) -> Self {
        sections.sort_by_key(|s| (s.order, s.id));
        subjects.sort_by_key(|s| (s.order, s.id));
        topics.sort_by_key(|t| (t.order, t.id));

        let mut topics_by_subject: HashMap<SubjectId, Vec<Topic>> = HashMap::new();
        for topic in topics {
            topics_by_subject
                .entry(topic.subject_id)
                .or_default()
                .push(topic);
        }

        let mut subjects_by_section: HashMap<SectionId, Vec<SubjectOutline>> = HashMap::new();
        for subject in subjects {
            let topics = topics_by_subject.remove(&subject.id).unwrap_or_default();
            subjects_by_section
                .entry(subject.section_id)
                .or_default()
                .push(SubjectOutline { subject, topics });
        }

        let sections = sections
            .into_iter()
            .map(|section| {
                let subjects = subjects_by_section.remove(&section.id).unwrap_or_default();
                SectionOutline { section, subjects }
            })
            .collect();

        Self { sections }
    }

    pub fn subjects(&self) -> impl Iterator<Item = &SubjectOutline> {
        self.sections.iter().flat_map(|s| s.subjects.iter())
    }

    #[must_use]
    pub fn topic_ids(&self) -> Vec<TopicId> {
        self.subjects()
            .flat_map(|s| s.topics.iter().map(|t| t.id))
            .collect()
    }

    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.subjects().count()
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.subjects().map(|s| s.topics.len()).sum()
    }
}
