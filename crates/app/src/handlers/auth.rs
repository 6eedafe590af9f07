use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Router, middleware};
use chrono::{DateTime, Utc};
use prep_core::model::{RegistrationDraft, User};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;
use crate::extractors::{ApiJson, SESSION_COOKIE_NAME, SessionCredential};
use crate::response::ApiResponse;
use crate::throttle;

pub fn routes(state: &AppState) -> Router<AppState> {
    let login = Router::new()
        .route("/auth/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            throttle::limit_logins,
        ));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .merge(login)
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Serialize)]
struct LogoutData {
    message: &'static str,
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; Max-Age={max_age_secs}; Path=/; SameSite=Lax{secure}"
    ))
    .map_err(|err| AppError::Internal(err.to_string()))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<RegistrationDraft>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.services.auth().register(draft).await?;
    Ok(ApiResponse::created(user))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.services.auth();
    let outcome = auth.login(&body.email, &body.password).await?;

    let token = outcome.session.token.to_string();
    let cookie = session_cookie(
        &token,
        auth.session_ttl().num_seconds(),
        state.secure_cookies,
    )?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        headers,
        ApiResponse::ok(LoginData {
            token,
            expires_at: outcome.session.expires_at,
            user: outcome.user,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    SessionCredential(token): SessionCredential,
) -> Result<impl IntoResponse, AppError> {
    state.services.auth().logout(token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie("", 0, state.secure_cookies)?);
    Ok((
        headers,
        ApiResponse::ok(LogoutData {
            message: "logged out",
        }),
    ))
}
