use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{PomodoroSessionId, UserId};

pub const DEFAULT_POMODORO_MINUTES: u32 = 25;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PomodoroError {
    #[error("duration must be > 0 minutes")]
    InvalidDuration,

    #[error("session already completed")]
    AlreadyCompleted,
}

/// Request body for starting a session; both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroDraft {
    pub duration: Option<i64>,
    pub is_break: Option<bool>,
}

impl PomodoroDraft {
    /// Resolve to `(duration_minutes, is_break)` with defaults applied.
    ///
    /// # Errors
    ///
    /// Returns `PomodoroError::InvalidDuration` for non-positive durations.
    pub fn resolve(&self) -> Result<(u32, bool), PomodoroError> {
        let duration = match self.duration {
            None => DEFAULT_POMODORO_MINUTES,
            Some(minutes) => u32::try_from(minutes)
                .ok()
                .filter(|m| *m > 0)
                .ok_or(PomodoroError::InvalidDuration)?,
        };
        Ok((duration, self.is_break.unwrap_or(false)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: PomodoroSessionId,
    pub user_id: UserId,
    pub duration: u32,
    pub is_break: bool,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PomodoroSession {
    /// Mark the session finished at `now`.
    ///
    /// # Errors
    ///
    /// Returns `PomodoroError::AlreadyCompleted` if it was finished before.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), PomodoroError> {
        if self.completed {
            return Err(PomodoroError::AlreadyCompleted);
        }
        self.completed = true;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Count and summed minutes of completed work sessions in some window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudyTotals {
    pub sessions: u64,
    pub minutes: u64,
}

impl StudyTotals {
    /// Minutes as hours, rounded to one decimal place.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hours(&self) -> f64 {
        (self.minutes as f64 / 60.0 * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn draft_defaults_to_twenty_five_minute_work_session() {
        assert_eq!(PomodoroDraft::default().resolve().unwrap(), (25, false));
        let draft = PomodoroDraft {
            duration: Some(0),
            is_break: None,
        };
        assert_eq!(draft.resolve(), Err(PomodoroError::InvalidDuration));
    }

    #[test]
    fn completing_twice_fails() {
        let mut session = PomodoroSession {
            id: PomodoroSessionId::new(1),
            user_id: UserId::new(1),
            duration: 25,
            is_break: false,
            completed: false,
            started_at: fixed_now(),
            completed_at: None,
        };
        session.complete(fixed_now()).unwrap();
        assert_eq!(session.completed_at, Some(fixed_now()));
        assert_eq!(
            session.complete(fixed_now()),
            Err(PomodoroError::AlreadyCompleted)
        );
    }

    #[test]
    fn hours_round_to_one_decimal() {
        let totals = StudyTotals {
            sessions: 3,
            minutes: 75,
        };
        assert!((totals.hours() - 1.3).abs() < f64::EPSILON);
        assert!((StudyTotals::default().hours()).abs() < f64::EPSILON);
    }
}
