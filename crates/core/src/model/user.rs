use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{InstitutionId, UserId};
use crate::model::validation::{self, ValidationError};

pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const TARGET_SCORE_MAX: u32 = 1000;
pub const DAILY_STUDY_HOURS_MIN: u8 = 1;
pub const DAILY_STUDY_HOURS_MAX: u8 = 24;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error(transparent)]
    Field(#[from] ValidationError),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters")]
    PasswordLength,

    #[error("password must contain an upper-case letter, a lower-case letter and a digit")]
    WeakPassword,

    #[error("target score must be between 0 and {TARGET_SCORE_MAX}")]
    InvalidTargetScore,

    #[error("daily study hours must be between {DAILY_STUDY_HOURS_MIN} and {DAILY_STUDY_HOURS_MAX}")]
    InvalidDailyStudyHours,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    InstitutionAdmin,
    Individual,
    Viewer,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::InstitutionAdmin => "INSTITUTION_ADMIN",
            Role::Individual => "INDIVIDUAL",
            Role::Viewer => "VIEWER",
        }
    }

    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for unrecognised values.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        match raw {
            "ADMIN" => Ok(Self::Admin),
            "INSTITUTION_ADMIN" => Ok(Self::InstitutionAdmin),
            "INDIVIDUAL" => Ok(Self::Individual),
            "VIEWER" => Ok(Self::Viewer),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }
}

//
// ─── EMAIL / PASSWORD ──────────────────────────────────────────────────────────
//

/// A trimmed, lower-cased email address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// # Errors
    ///
    /// Returns `UserError::InvalidEmail` when the address is too long or
    /// lacks a non-empty local part and domain.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.chars().count() > EMAIL_MAX_LEN || normalized.contains(char::is_whitespace)
        {
            return Err(UserError::InvalidEmail);
        }
        match normalized.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(normalized))
            }
            _ => Err(UserError::InvalidEmail),
        }
    }

    /// Wrap a value already normalized by storage.
    #[must_use]
    pub fn from_persisted(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Email({})", self.0)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check the password policy: 8..=128 characters with mixed case and a digit.
///
/// # Errors
///
/// Returns `UserError::PasswordLength` or `UserError::WeakPassword`.
pub fn check_password_policy(password: &str) -> Result<(), UserError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(UserError::PasswordLength);
    }
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(UserError::WeakPassword);
    }
    Ok(())
}

//
// ─── REGISTRATION ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub target_score: Option<i64>,
    pub daily_study_hours: Option<i64>,
    pub exam_code: Option<String>,
}

impl fmt::Debug for RegistrationDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDraft")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("exam_code", &self.exam_code)
            .finish_non_exhaustive()
    }
}

impl RegistrationDraft {
    /// # Errors
    ///
    /// Returns `UserError` for the first field that breaks its rule.
    pub fn validate(self) -> Result<ValidatedRegistration, UserError> {
        let email = Email::parse(&self.email)?;
        check_password_policy(&self.password)?;
        let first_name = validation::name("firstName", &self.first_name)?;
        let last_name = validation::name("lastName", &self.last_name)?;

        let target_score = self
            .target_score
            .map(|score| {
                u32::try_from(score)
                    .ok()
                    .filter(|s| *s <= TARGET_SCORE_MAX)
                    .ok_or(UserError::InvalidTargetScore)
            })
            .transpose()?;
        let daily_study_hours = self
            .daily_study_hours
            .map(|hours| {
                u8::try_from(hours)
                    .ok()
                    .filter(|h| (DAILY_STUDY_HOURS_MIN..=DAILY_STUDY_HOURS_MAX).contains(h))
                    .ok_or(UserError::InvalidDailyStudyHours)
            })
            .transpose()?;
        let exam_code = self
            .exam_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        Ok(ValidatedRegistration {
            email,
            password: self.password,
            first_name,
            last_name,
            target_score,
            daily_study_hours,
            exam_code,
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub email: Email,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub target_score: Option<u32>,
    pub daily_study_hours: Option<u8>,
    pub exam_code: Option<String>,
}

impl fmt::Debug for ValidatedRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedRegistration")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

/// Record handed to storage when creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub institution_id: Option<InstitutionId>,
    pub target_score: Option<u32>,
    pub daily_study_hours: Option<u8>,
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub institution_id: Option<InstitutionId>,
    pub target_score: Option<u32>,
    pub daily_study_hours: Option<u8>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn current(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            role: self.role,
            institution_id: self.institution_id,
        }
    }
}

/// The authenticated principal, as seen by permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub role: Role,
    pub institution_id: Option<InstitutionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RegistrationDraft {
        RegistrationDraft {
            email: "  Ayse@Example.COM ".into(),
            password: "Secret123".into(),
            first_name: "Ayşe".into(),
            last_name: "Yılmaz".into(),
            ..RegistrationDraft::default()
        }
    }

    #[test]
    fn email_is_normalized() {
        let email = Email::parse(" Ayse@Example.COM").unwrap();
        assert_eq!(email.as_str(), "ayse@example.com");
    }

    #[test]
    fn email_requires_local_and_domain() {
        for raw in ["", "ayse", "@example.com", "ayse@", "a b@example.com", "a@b@c"] {
            assert_eq!(Email::parse(raw), Err(UserError::InvalidEmail), "{raw}");
        }
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(Email::parse(&long).is_err());
    }

    #[test]
    fn password_policy() {
        assert!(check_password_policy("Secret123").is_ok());
        assert_eq!(check_password_policy("Sh0rt"), Err(UserError::PasswordLength));
        assert_eq!(check_password_policy("alllower123"), Err(UserError::WeakPassword));
        assert_eq!(check_password_policy("NoDigitsHere"), Err(UserError::WeakPassword));
    }

    #[test]
    fn registration_validates_optional_targets() {
        let mut d = draft();
        d.target_score = Some(80);
        d.daily_study_hours = Some(4);
        d.exam_code = Some(" kpss ".into());
        let valid = d.validate().unwrap();
        assert_eq!(valid.email.as_str(), "ayse@example.com");
        assert_eq!(valid.target_score, Some(80));
        assert_eq!(valid.daily_study_hours, Some(4));
        assert_eq!(valid.exam_code.as_deref(), Some("KPSS"));

        let mut d = draft();
        d.target_score = Some(1001);
        assert_eq!(d.validate().unwrap_err(), UserError::InvalidTargetScore);

        let mut d = draft();
        d.daily_study_hours = Some(0);
        assert_eq!(d.validate().unwrap_err(), UserError::InvalidDailyStudyHours);
    }

    #[test]
    fn debug_never_prints_password() {
        let rendered = format!("{:?}", draft());
        assert!(!rendered.contains("Secret123"));
    }

    #[test]
    fn role_round_trips() {
        for role in [Role::Admin, Role::InstitutionAdmin, Role::Individual, Role::Viewer] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert_eq!(
            serde_json::to_string(&Role::InstitutionAdmin).unwrap(),
            "\"INSTITUTION_ADMIN\""
        );
    }
}
