//! Inbound request limiter for the API routes

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

/// Process-wide limiter shared by every client
pub struct InboundLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_minute: u32,
}

impl InboundLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let quota = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(quota)),
            per_minute: quota.get(),
        }
    }

    /// Take one cell; false when the quota is exhausted
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Middleware rejecting requests over quota with 429
pub async fn limit(
    State(limiter): State<Arc<InboundLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check() {
        return next.run(request).await;
    }

    warn!("Inbound limit of {} requests/minute exceeded", limiter.per_minute);
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "rate_limited",
            "message": format!("limit of {} requests per minute exceeded", limiter.per_minute),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_enforced() {
        let limiter = InboundLimiter::per_minute(2);
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn test_zero_quota_allows_one() {
        let limiter = InboundLimiter::per_minute(0);
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
