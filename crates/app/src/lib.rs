#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod throttle;

use std::sync::Arc;

use axum::{Router, middleware};
use services::{AppServices, InMemoryRateLimiter, RateLimitPolicy, RateLimitStore};
use tower_http::trace::TraceLayer;

use crate::error::AppError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub limiter: Arc<dyn RateLimitStore>,
    pub login_limiter: Arc<dyn RateLimitStore>,
    pub secure_cookies: bool,
}

impl AppState {
    /// State with in-memory limiters: `policy` for all requests and the
    /// login policy, sharing its window, for credential checks.
    #[must_use]
    pub fn new(services: AppServices, policy: RateLimitPolicy, secure_cookies: bool) -> Self {
        let login = RateLimitPolicy {
            window: policy.window,
            ..RateLimitPolicy::login()
        };
        Self {
            services,
            limiter: Arc::new(InMemoryRateLimiter::new(policy)),
            login_limiter: Arc::new(InMemoryRateLimiter::new(login)),
            secure_cookies,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::health::routes())
        .merge(handlers::auth::routes(&state))
        .merge(handlers::exams::routes())
        .merge(handlers::curriculum::routes())
        .merge(handlers::progress::routes())
        .merge(handlers::dashboard::routes())
        .merge(handlers::pomodoro::routes());

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            throttle::limit_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("route not found".into())
}
