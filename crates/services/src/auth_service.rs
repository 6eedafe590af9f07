use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use prep_core::model::{
    AssignmentTarget, AuthSession, CurrentUser, DEFAULT_SESSION_TTL_DAYS, Email, NewUser,
    RegistrationDraft, Role, SessionToken, User, UserId, check_password_policy,
};
use storage::repository::{
    AssignmentRepository, AuthSessionRepository, ExamRepository, StorageError, UserRepository,
};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::AuthError;
use crate::password::{hash_blocking, verify_blocking};

/// A successful login: the user and the session that now identifies them.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: AuthSession,
}

/// Registration, login and session resolution.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    session_ttl: Duration,
    users: Arc<dyn UserRepository>,
    exams: Arc<dyn ExamRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    sessions: Arc<dyn AuthSessionRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        exams: Arc<dyn ExamRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        sessions: Arc<dyn AuthSessionRepository>,
    ) -> Self {
        Self {
            clock,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            users,
            exams,
            assignments,
            sessions,
        }
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Create an individual account.
    ///
    /// When the draft names an exam code that matches a live exam, the exam
    /// is assigned to the new user. An unknown code is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for malformed input,
    /// `AuthError::EmailTaken` when the email is registered already, and
    /// `AuthError::Storage` if persistence fails.
    pub async fn register(&self, draft: RegistrationDraft) -> Result<User, AuthError> {
        let registration = draft.validate()?;
        if self
            .users
            .find_user_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_blocking(registration.password).await?;
        let now = self.clock.now();
        let new_user = NewUser {
            email: registration.email,
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            role: Role::Individual,
            institution_id: None,
            target_score: registration.target_score,
            daily_study_hours: registration.daily_study_hours,
        };
        let user = self
            .users
            .insert_user(&new_user, now)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => AuthError::EmailTaken,
                other => AuthError::Storage(other),
            })?;
        info!(user_id = %user.id, "registered user");

        if let Some(code) = registration.exam_code {
            // The account exists from here on; a failed assignment is logged
            // and the exam can be assigned later.
            if let Err(err) = self.assign_registration_exam(user.id, &code, now).await {
                warn!(user_id = %user.id, exam_code = %code, error = %err, "exam assignment at registration failed");
            }
        }

        Ok(user)
    }

    async fn assign_registration_exam(
        &self,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let Some(exam) = self.exams.find_exam_by_code(code).await? else {
            warn!(user_id = %user_id, exam_code = %code, "unknown exam code at registration");
            return Ok(());
        };
        self.assignments
            .assign_exam(exam.id, AssignmentTarget::User(user_id), now)
            .await?;
        info!(user_id = %user_id, exam_id = %exam.id, "assigned exam at registration");
        Ok(())
    }

    /// Verify credentials and open a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or a
    /// wrong password, `AuthError::Inactive` for disabled accounts, and
    /// `AuthError::Storage` if persistence fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_blocking(password.to_owned(), user.password_hash.clone()).await {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        let now = self.clock.now();
        self.users.record_login(user.id, now).await?;
        let session = AuthSession {
            token: SessionToken::generate(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.insert_auth_session(&session).await?;
        info!(user_id = %user.id, "user logged in");

        let user = User {
            last_login_at: Some(now),
            ..user
        };
        Ok(LoginOutcome { user, session })
    }

    /// Close a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the delete fails.
    pub async fn logout(&self, token: SessionToken) -> Result<(), AuthError> {
        self.sessions.delete_auth_session(token).await?;
        Ok(())
    }

    /// Resolve a session token to the acting user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for unknown or expired sessions
    /// and for deleted or disabled users.
    pub async fn authenticate(&self, token: SessionToken) -> Result<CurrentUser, AuthError> {
        let Some(session) = self.sessions.get_auth_session(token).await? else {
            return Err(AuthError::Unauthenticated);
        };
        if session.is_expired(self.clock.now()) {
            self.sessions.delete_auth_session(token).await?;
            return Err(AuthError::Unauthenticated);
        }
        match self.users.get_user(session.user_id).await? {
            Some(user) if user.is_active => Ok(user.current()),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the delete fails.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let purged = self
            .sessions
            .purge_expired_auth_sessions(self.clock.now())
            .await?;
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        Ok(purged)
    }

    /// Make sure an administrator with `email` exists, creating it with
    /// `password` if needed. An existing account is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the email or password is
    /// unacceptable and `AuthError::Storage` if persistence fails.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        if let Some(existing) = self.users.find_user_by_email(&email).await? {
            if existing.role != Role::Admin {
                warn!(user_id = %existing.id, "bootstrap admin email belongs to a non-admin account");
            }
            return Ok(existing);
        }

        check_password_policy(password)?;
        let password_hash = hash_blocking(password.to_owned()).await?;
        let admin = NewUser {
            email,
            password_hash,
            first_name: "Admin".to_owned(),
            last_name: "User".to_owned(),
            role: Role::Admin,
            institution_id: None,
            target_score: None,
            daily_study_hours: None,
        };
        let user = self.users.insert_user(&admin, self.clock.now()).await?;
        info!(user_id = %user.id, "created bootstrap admin");
        Ok(user)
    }
}
