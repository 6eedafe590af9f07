use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExamId;
use crate::model::validation::{self, ValidationError, DESCRIPTION_MAX_LEN};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error(transparent)]
    Field(#[from] ValidationError),

    #[error("end date must be on or after start date")]
    InvalidDateRange,

    #[error("unknown exam status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle state of an exam definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl ExamStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamStatus::Active => "ACTIVE",
            ExamStatus::Inactive => "INACTIVE",
            ExamStatus::Archived => "ARCHIVED",
        }
    }

    /// Parse the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::UnknownStatus` for anything other than the three
    /// known values.
    pub fn parse(raw: &str) -> Result<Self, ExamError> {
        match raw {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(ExamError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// Unvalidated exam input, as received from callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDraft {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub status: Option<ExamStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ExamDraft {
    /// Validate names, code alphabet and the date range.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` describing the first failing rule.
    pub fn validate(self) -> Result<ValidatedExam, ExamError> {
        let name = validation::name("name", &self.name)?;
        let code = validation::code("code", &self.code)?;
        let description =
            validation::optional_text("description", self.description, DESCRIPTION_MAX_LEN)?;
        check_date_range(self.start_date, self.end_date)?;

        Ok(ValidatedExam {
            name,
            code,
            description,
            status: self.status.unwrap_or_default(),
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

fn check_date_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ExamError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ExamError::InvalidDateRange),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedExam {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub status: ExamStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Partial update for an exam. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub status: Option<ExamStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: ExamId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub status: ExamStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ExamStatus::Active
    }

    #[must_use]
    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
        }
    }

    /// Produce the updated exam after applying `patch`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if any patched field fails validation or the
    /// resulting date range is inverted.
    pub fn apply_patch(&self, patch: ExamPatch, now: DateTime<Utc>) -> Result<Exam, ExamError> {
        let name = match patch.name {
            Some(raw) => validation::name("name", &raw)?,
            None => self.name.clone(),
        };
        let code = match patch.code {
            Some(raw) => validation::code("code", &raw)?,
            None => self.code.clone(),
        };
        let description = match patch.description {
            Some(raw) => {
                validation::optional_text("description", Some(raw), DESCRIPTION_MAX_LEN)?
            }
            None => self.description.clone(),
        };
        let start_date = patch.start_date.or(self.start_date);
        let end_date = patch.end_date.or(self.end_date);
        check_date_range(start_date, end_date)?;

        Ok(Exam {
            id: self.id,
            name,
            code,
            description,
            status: patch.status.unwrap_or(self.status),
            start_date,
            end_date,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

/// The `{id, name, code}` view of an exam embedded in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamSummary {
    pub id: ExamId,
    pub name: String,
    pub code: String,
}

//
// ─── SCORE RANGES ──────────────────────────────────────────────────────────────
//

/// Score scale shown during onboarding when choosing a target score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRange {
    pub min_score: u32,
    pub max_score: u32,
    pub step: f32,
}

impl ScoreRange {
    /// Look up the scale for a known exam code, defaulting to 0..=100 in steps of 1.
    #[must_use]
    pub fn for_code(code: &str) -> Self {
        let (max_score, step) = match code {
            "ALES" => (100, 0.5),
            "DGS" | "YKS_TYT" | "YKS_AYT" | "YKS_YDT" => (500, 1.0),
            _ => (100, 1.0),
        };
        Self {
            min_score: 0,
            max_score,
            step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft() -> ExamDraft {
        ExamDraft {
            name: "KPSS".into(),
            code: "kpss".into(),
            ..ExamDraft::default()
        }
    }

    #[test]
    fn validate_normalizes_code_and_defaults_status() {
        let exam = draft().validate().unwrap();
        assert_eq!(exam.code, "KPSS");
        assert_eq!(exam.status, ExamStatus::Active);
    }

    #[test]
    fn validate_rejects_inverted_dates() {
        let mut d = draft();
        d.start_date = Some(fixed_now());
        d.end_date = Some(fixed_now() - Duration::days(1));
        assert_eq!(d.validate().unwrap_err(), ExamError::InvalidDateRange);
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let exam = Exam {
            id: ExamId::new(1),
            name: "KPSS".into(),
            code: "KPSS".into(),
            description: Some("Genel".into()),
            status: ExamStatus::Active,
            start_date: None,
            end_date: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        let later = fixed_now() + Duration::hours(1);
        let patched = exam
            .apply_patch(
                ExamPatch {
                    status: Some(ExamStatus::Archived),
                    ..ExamPatch::default()
                },
                later,
            )
            .unwrap();
        assert_eq!(patched.name, "KPSS");
        assert_eq!(patched.description.as_deref(), Some("Genel"));
        assert_eq!(patched.status, ExamStatus::Archived);
        assert_eq!(patched.updated_at, later);
        assert!(!patched.is_active());
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [ExamStatus::Active, ExamStatus::Inactive, ExamStatus::Archived] {
            assert_eq!(ExamStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ExamStatus::parse("DRAFT").is_err());
    }

    #[test]
    fn score_ranges_follow_exam_code() {
        assert_eq!(ScoreRange::for_code("DGS").max_score, 500);
        assert!((ScoreRange::for_code("ALES").step - 0.5).abs() < f32::EPSILON);
        assert_eq!(ScoreRange::for_code("UNKNOWN").max_score, 100);
    }
}
