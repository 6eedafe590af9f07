pub mod auth;
pub mod curriculum;
pub mod dashboard;
pub mod exams;
pub mod health;
pub mod pomodoro;
pub mod progress;
