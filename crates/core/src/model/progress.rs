use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{TopicId, UserId};
use crate::model::validation::{self, ValidationError, NOTES_MAX_LEN};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Field(#[from] ValidationError),

    #[error("unknown progress status: {0}")]
    UnknownStatus(String),
}

/// A user's self-reported state for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Reviewed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "NOT_STARTED",
            ProgressStatus::InProgress => "IN_PROGRESS",
            ProgressStatus::Completed => "COMPLETED",
            ProgressStatus::Reviewed => "REVIEWED",
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for unrecognised values.
    pub fn parse(raw: &str) -> Result<Self, ProgressError> {
        match raw {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "REVIEWED" => Ok(Self::Reviewed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub status: ProgressStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// Build the row to upsert for a status change.
    ///
    /// `completed_at` is stamped only for `Completed`; every other status
    /// clears it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` when the notes are too long.
    pub fn record(
        user_id: UserId,
        topic_id: TopicId,
        status: ProgressStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        let notes = validation::optional_text("notes", notes, NOTES_MAX_LEN)?;
        let completed_at = (status == ProgressStatus::Completed).then_some(now);
        Ok(Self {
            user_id,
            topic_id,
            status,
            notes,
            completed_at,
            updated_at: now,
        })
    }
}
