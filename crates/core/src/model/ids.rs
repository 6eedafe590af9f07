use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an identifier from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(u64);

            impl $name {
                #[must_use]
                pub fn new(id: u64) -> Self {
                    Self(id)
                }

                /// Returns the underlying u64 value
                #[must_use]
                pub fn value(&self) -> u64 {
                    self.0
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = ParseIdError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.trim()
                        .parse::<u64>()
                        .map(Self::new)
                        .map_err(|_| ParseIdError {
                            kind: stringify!($name),
                        })
                }
            }
        )*
    };
}

define_ids!(
    /// Unique identifier for an Exam
    ExamId,
    /// Unique identifier for a Section within an exam
    SectionId,
    /// Unique identifier for a Subject within a section
    SubjectId,
    /// Unique identifier for a Topic within a subject
    TopicId,
    /// Unique identifier for a User
    UserId,
    /// Unique identifier for an Institution
    InstitutionId,
    /// Unique identifier for an exam assignment
    AssignmentId,
    /// Unique identifier for a Pomodoro session
    PomodoroSessionId,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_id_display() {
        let id = ExamId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "ExamId(42)");
    }

    #[test]
    fn topic_id_from_str() {
        let id: TopicId = " 123 ".parse().unwrap();
        assert_eq!(id, TopicId::new(123));
    }

    #[test]
    fn id_from_str_invalid() {
        let err = "abc".parse::<UserId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse UserId from string");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&SectionId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: SectionId = serde_json::from_str("7").unwrap();
        assert_eq!(back, SectionId::new(7));
    }
}
