//! Request ids, bearer auth and the inbound request cap.

use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const API_KEYS_VAR: &str = "TUNDA_API_KEYS";

/// Request id stored as a request extension and echoed as `x-request-id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Accepted bearer tokens. An empty set means auth is off.
#[derive(Debug, Clone)]
pub struct AuthState {
    tokens: Arc<HashSet<String>>,
}

impl AuthState {
    /// Reads comma-separated tokens from `TUNDA_API_KEYS`.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Development may run without tokens; every other environment must
    /// configure at least one.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let tokens: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if tokens.is_empty() {
            anyhow::ensure!(
                is_development,
                "{API_KEYS_VAR} must list at least one bearer token outside development"
            );
            tracing::warn!("{API_KEYS_VAR} is empty; bearer auth is off");
        }

        Ok(Self {
            tokens: Arc::new(tokens),
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    fn admits(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers.get(AUTHORIZATION)).is_some_and(|t| self.tokens.contains(t))
    }
}

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    used: usize,
}

/// Fixed-window cap shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    limit: usize,
    period: Duration,
    window: Arc<Mutex<Window>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            limit,
            period,
            window: Arc::new(Mutex::new(Window {
                opened_at: Instant::now(),
                used: 0,
            })),
        }
    }

    /// Counts one request; `false` once the current window is spent.
    pub async fn try_admit(&self) -> bool {
        let mut window = self.window.lock().await;
        if window.opened_at.elapsed() >= self.period {
            window.opened_at = Instant::now();
            window.used = 0;
        }
        if window.used >= self.limit {
            return false;
        }
        window.used += 1;
        true
    }
}

#[derive(Serialize)]
struct Rejection {
    error: RejectionDetail,
}

#[derive(Serialize)]
struct RejectionDetail {
    code: &'static str,
    message: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    let body = Rejection {
        error: RejectionDetail { code, message },
    };
    (status, Json(body)).into_response()
}

/// Uses the caller's `x-request-id` when present, otherwise a fresh `UUIDv4`.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled() || auth.admits(req.headers()) {
        return next.run(req).await;
    }
    reject(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "missing or invalid bearer token",
    )
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    if !rate_limit.try_admit().await {
        tracing::debug!("inbound rate limit reached");
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }
    next.run(req).await
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
