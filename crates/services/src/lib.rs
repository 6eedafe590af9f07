#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod error;
pub mod exam_service;
pub mod password;
pub mod pomodoro_service;
pub mod progress_service;
pub mod rate_limit;

#[cfg(test)]
mod test_support;

pub use prep_core::Clock;

pub use app_services::AppServices;
pub use auth_service::{AuthService, LoginOutcome};
pub use error::{
    AppServicesError, AuthError, ExamServiceError, PomodoroServiceError, ProgressServiceError,
};
pub use exam_service::{AvailableExam, ExamDetail, ExamService};
pub use pomodoro_service::{PomodoroHistory, PomodoroService, PomodoroStats};
pub use progress_service::{DashboardStats, ProgressService, ProgressUpdate, StudyGoals};
pub use rate_limit::{InMemoryRateLimiter, RateLimitDecision, RateLimitPolicy, RateLimitStore};
