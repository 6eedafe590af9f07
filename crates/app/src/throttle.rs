//! Rate-limit middleware over an injected [`RateLimitStore`].

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::SecondsFormat;
use services::{RateLimitDecision, RateLimitStore};

use crate::AppState;
use crate::error::AppError;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Limit every request by client key.
pub async fn limit_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    enforce(state.limiter.as_ref(), &state, req, next).await
}

/// The stricter limit applied to login attempts.
pub async fn limit_logins(State(state): State<AppState>, req: Request, next: Next) -> Response {
    enforce(state.login_limiter.as_ref(), &state, req, next).await
}

async fn enforce(
    store: &dyn RateLimitStore,
    state: &AppState,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    let decision = store.hit(&key, state.services.clock().now());

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(client = %key, limit = decision.limit, "rate limit exceeded");
        AppError::RateLimited.into_response()
    };
    apply_headers(response.headers_mut(), &decision);
    response
}

/// `X-Forwarded-For` first entry, then `X-Real-IP`, then the peer address.
pub fn client_key(req: &Request) -> String {
    if let Some(first) = header_value(req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_owned();
    }
    if let Some(real_ip) = header_value(req, "x-real-ip") {
        return real_ip.to_owned();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |info| info.0.ip().to_string())
}

fn header_value<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Headers already set by an inner, more specific limiter are kept.
fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    if headers.contains_key(LIMIT_HEADER) {
        return;
    }
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    let reset = decision
        .reset_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(RESET_HEADER, value);
    }
}

/// Evict ended windows and expired login sessions on a fixed interval.
pub async fn purge_task(state: AppState, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let now = state.services.clock().now();
        let windows = state.limiter.purge_expired(now) + state.login_limiter.purge_expired(now);
        match state.services.auth().purge_expired_sessions().await {
            Ok(sessions) => {
                tracing::debug!(windows, sessions, "purged expired entries");
            }
            Err(err) => tracing::warn!(error = %err, "session purge failed"),
        }
    }
}
