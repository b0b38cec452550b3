//! # Rate Limiting
//!
//! One process-wide token bucket shared by every tree endpoint. Its rate is
//! `server.rate_limit` (or `ARBOR_RATE_LIMIT`) requests per second, and `0`
//! removes the layer from the router altogether.
//!
//! `/health` is never metered, so load balancer probes keep answering while
//! admin traffic is being throttled.

use crate::config::ServerConfig;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// The limiter shared by all requests of one router.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Limiter for the configured rate, or `None` when limiting is disabled.
pub fn limiter_for(server: &ServerConfig) -> Option<GlobalRateLimiter> {
    let rps = NonZeroU32::new(server.rate_limit)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_second(rps))))
}

/// Reject tree requests over the configured rate with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    match limiter.check() {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(
                event = "rate_limited",
                method = %request.method(),
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn server(rate_limit: u32) -> ServerConfig {
        ServerConfig {
            rate_limit,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn zero_disables_limiting() {
        assert!(limiter_for(&server(0)).is_none());
    }

    #[test]
    fn default_rate_admits_requests() {
        let limiter = limiter_for(&ServerConfig::default()).expect("limiter");
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn burst_is_bounded_by_rate() {
        let limiter = limiter_for(&server(2)).expect("limiter");
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
