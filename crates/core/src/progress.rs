//! Roll-up of per-topic progress into subject and section reports.
//!
//! Buckets are disjoint: `completed` holds COMPLETED rows only and
//! `reviewed` holds REVIEWED rows only, so the four buckets always sum to
//! the topic total. The percentage treats both as done.
//! `completed + in_progress + not_started` therefore falls short of the
//! total once any topic is REVIEWED.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{
    ExamOutline, ExamSummary, ProgressStatus, SectionId, SectionOutline, SubjectId,
    SubjectOutline, TopicId,
};

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// The tri-state status exposed per topic; REVIEWED collapses into `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicState {
    NotStarted,
    InProgress,
    Completed,
}

impl From<ProgressStatus> for TopicState {
    fn from(status: ProgressStatus) -> Self {
        match status {
            ProgressStatus::NotStarted => TopicState::NotStarted,
            ProgressStatus::InProgress => TopicState::InProgress,
            ProgressStatus::Completed | ProgressStatus::Reviewed => TopicState::Completed,
        }
    }
}

//
// ─── COUNTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCounts {
    pub total_topics: u64,
    pub completed_topics: u64,
    pub in_progress_topics: u64,
    pub not_started_topics: u64,
    pub reviewed_topics: u64,
    pub progress_percentage: u8,
}

impl ProgressCounts {
    /// Counts from aggregate status tallies. Not-started is whatever is left
    /// of `total`, never a stored count.
    #[must_use]
    pub fn from_status_counts(total: u64, completed: u64, in_progress: u64, reviewed: u64) -> Self {
        let not_started = total.saturating_sub(completed + in_progress + reviewed);
        Self {
            total_topics: total,
            completed_topics: completed,
            in_progress_topics: in_progress,
            not_started_topics: not_started,
            reviewed_topics: reviewed,
            progress_percentage: completion_percentage(completed + reviewed, total),
        }
    }

    fn record(&mut self, status: ProgressStatus) {
        self.total_topics += 1;
        match status {
            ProgressStatus::NotStarted => self.not_started_topics += 1,
            ProgressStatus::InProgress => self.in_progress_topics += 1,
            ProgressStatus::Completed => self.completed_topics += 1,
            ProgressStatus::Reviewed => self.reviewed_topics += 1,
        }
    }

    fn absorb(&mut self, other: &ProgressCounts) {
        self.total_topics += other.total_topics;
        self.completed_topics += other.completed_topics;
        self.in_progress_topics += other.in_progress_topics;
        self.not_started_topics += other.not_started_topics;
        self.reviewed_topics += other.reviewed_topics;
    }

    fn finish(mut self) -> Self {
        self.progress_percentage =
            completion_percentage(self.completed_topics + self.reviewed_topics, self.total_topics);
        self
    }
}

/// `round(100 * done / total)` with halves rounded up; 0 when `total` is 0.
#[must_use]
pub fn completion_percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    let pct = (200 * done + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicReport {
    pub id: TopicId,
    pub code: String,
    pub name: String,
    pub order: u32,
    pub status: TopicState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectReport {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    pub order: u32,
    #[serde(flatten)]
    pub counts: ProgressCounts,
    pub topics: Vec<TopicReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub id: SectionId,
    pub code: String,
    pub name: String,
    pub order: u32,
    #[serde(flatten)]
    pub counts: ProgressCounts,
    pub subjects: Vec<SubjectReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub exam: Option<ExamSummary>,
    pub sections: Vec<SectionReport>,
}

impl ProgressReport {
    /// The report for a user without an active exam.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            exam: None,
            sections: Vec::new(),
        }
    }

    /// Totals across every section.
    #[must_use]
    pub fn totals(&self) -> ProgressCounts {
        let mut counts = ProgressCounts::default();
        for section in &self.sections {
            counts.absorb(&section.counts);
        }
        counts.finish()
    }
}

/// Build the nested report for `exam` from its outline and the user's
/// recorded statuses. Topics absent from `statuses` are not started.
#[must_use]
pub fn build_report(
    exam: ExamSummary,
    outline: &ExamOutline,
    statuses: &HashMap<TopicId, ProgressStatus>,
) -> ProgressReport {
    let sections = outline
        .sections
        .iter()
        .map(|section| section_report(section, statuses))
        .collect();
    ProgressReport {
        exam: Some(exam),
        sections,
    }
}

fn section_report(
    outline: &SectionOutline,
    statuses: &HashMap<TopicId, ProgressStatus>,
) -> SectionReport {
    let subjects: Vec<SubjectReport> = outline
        .subjects
        .iter()
        .map(|subject| subject_report(subject, statuses))
        .collect();

    let mut counts = ProgressCounts::default();
    for subject in &subjects {
        counts.absorb(&subject.counts);
    }

    let section = &outline.section;
    SectionReport {
        id: section.id,
        code: section.code.clone(),
        name: section.name.clone(),
        order: section.order,
        counts: counts.finish(),
        subjects,
    }
}

fn subject_report(
    outline: &SubjectOutline,
    statuses: &HashMap<TopicId, ProgressStatus>,
) -> SubjectReport {
    let mut counts = ProgressCounts::default();
    let topics = outline
        .topics
        .iter()
        .map(|topic| {
            let status = statuses.get(&topic.id).copied().unwrap_or_default();
            counts.record(status);
            TopicReport {
                id: topic.id,
                code: topic.code.clone(),
                name: topic.name.clone(),
                order: topic.order,
                status: status.into(),
            }
        })
        .collect();

    let subject = &outline.subject;
    SubjectReport {
        id: subject.id,
        code: subject.code.clone(),
        name: subject.name.clone(),
        order: subject.order,
        counts: counts.finish(),
        topics,
    }
}
