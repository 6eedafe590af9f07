use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AssignmentId, ExamId, InstitutionId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error("an assignment needs a user, an institution, or both")]
    MissingTarget,
}

/// Who an exam is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTarget {
    User(UserId),
    Institution(InstitutionId),
    Both(UserId, InstitutionId),
}

impl AssignmentTarget {
    /// # Errors
    ///
    /// Returns `AssignmentError::MissingTarget` when both parts are absent.
    pub fn from_parts(
        user_id: Option<UserId>,
        institution_id: Option<InstitutionId>,
    ) -> Result<Self, AssignmentError> {
        match (user_id, institution_id) {
            (Some(user), Some(institution)) => Ok(Self::Both(user, institution)),
            (Some(user), None) => Ok(Self::User(user)),
            (None, Some(institution)) => Ok(Self::Institution(institution)),
            (None, None) => Err(AssignmentError::MissingTarget),
        }
    }

    #[must_use]
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(user) | Self::Both(user, _) => Some(user),
            Self::Institution(_) => None,
        }
    }

    #[must_use]
    pub fn institution_id(self) -> Option<InstitutionId> {
        match self {
            Self::Institution(institution) | Self::Both(_, institution) => Some(institution),
            Self::User(_) => None,
        }
    }
}

/// Request body for assigning an exam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDraft {
    pub user_id: Option<UserId>,
    pub institution_id: Option<InstitutionId>,
}

impl AssignmentDraft {
    /// # Errors
    ///
    /// See [`AssignmentTarget::from_parts`].
    pub fn target(self) -> Result<AssignmentTarget, AssignmentError> {
        AssignmentTarget::from_parts(self.user_id, self.institution_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAssignment {
    pub id: AssignmentId,
    pub exam_id: ExamId,
    pub user_id: Option<UserId>,
    pub institution_id: Option<InstitutionId>,
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_at_least_one_part() {
        assert_eq!(
            AssignmentTarget::from_parts(None, None),
            Err(AssignmentError::MissingTarget)
        );
        let both = AssignmentTarget::from_parts(Some(UserId::new(1)), Some(InstitutionId::new(2)))
            .unwrap();
        assert_eq!(both.user_id(), Some(UserId::new(1)));
        assert_eq!(both.institution_id(), Some(InstitutionId::new(2)));
        let inst = AssignmentTarget::from_parts(None, Some(InstitutionId::new(2))).unwrap();
        assert_eq!(inst.user_id(), None);
    }
}
