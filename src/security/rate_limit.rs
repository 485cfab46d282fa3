//! Keyed rate limiting.
//!
//! The gate consults a [`RateLimiter`] and forwards its rejection verbatim.
//! [`TokenBucketLimiter`] is the in-process implementation: one token bucket
//! per client key, `max_requests` capacity, refilled continuously over
//! `window_secs`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::Serialize;

use crate::config::LimiterConfig;

/// Message returned with every 429.
pub const RATE_LIMITED_MESSAGE: &str = "Demasiadas solicitudes. Intente nuevamente más tarde.";

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitVerdict {
    Allow,
    Reject(RateLimitRejection),
}

/// A refused request. Renders as `429 Too Many Requests`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitRejection {
    /// Limiter that refused the request, for logs and metrics.
    pub limiter: &'static str,
    /// Configured requests per window.
    pub limit: u32,
    /// Time until one more request would be allowed.
    pub retry_after: Duration,
}

#[derive(Serialize)]
struct RejectionBody {
    error: &'static str,
    #[serde(rename = "retryAfter")]
    retry_after: u64,
}

impl RateLimitRejection {
    /// Whole seconds until retry, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = u64::try_from(self.retry_after.as_millis()).unwrap_or(u64::MAX);
        millis.div_ceil(1000).max(1)
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_secs();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RejectionBody {
                error: RATE_LIMITED_MESSAGE,
                retry_after,
            }),
        )
            .into_response();

        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        response
    }
}

/// Decides whether a client may make another request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateLimitVerdict;
}

/// Limiter that never rejects. Used when a limiter is disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl RateLimiter for AllowAll {
    async fn check(&self, _key: &str) -> RateLimitVerdict {
        RateLimitVerdict::Allow
    }
}

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> Result<(), Duration> {
        self.refill(capacity, refill_rate, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            // Saturates when the window is too long to express.
            Err(Duration::try_from_secs_f64((1.0 - self.tokens) / refill_rate)
                .unwrap_or(Duration::MAX))
        }
    }
}

/// In-memory keyed token bucket limiter.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    name: &'static str,
    buckets: DashMap<String, TokenBucket>,
    limit: u32,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucketLimiter {
    /// `max_requests` per `window`, with a burst of `max_requests`.
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        let capacity = max_requests as f64;
        Self {
            name,
            buckets: DashMap::new(),
            limit: max_requests,
            capacity,
            refill_rate: capacity / window.as_secs_f64(),
        }
    }

    pub fn from_config(name: &'static str, config: &LimiterConfig) -> Self {
        Self::new(name, config.max_requests, Duration::from_secs(config.window_secs))
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitVerdict {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));

        match bucket.try_acquire(self.capacity, self.refill_rate, now) {
            Ok(()) => RateLimitVerdict::Allow,
            Err(retry_after) => RateLimitVerdict::Reject(RateLimitRejection {
                limiter: self.name,
                limit: self.limit,
                retry_after,
            }),
        }
    }

    /// Drop buckets that have been idle for `max_idle` or have refilled completely.
    /// Returns the number of buckets removed.
    pub fn prune(&self, max_idle: Duration) -> usize {
        self.prune_at(max_idle, Instant::now())
    }

    fn prune_at(&self, max_idle: Duration, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let idle_for = now.saturating_duration_since(bucket.last_update);
            bucket.refill(self.capacity, self.refill_rate, now);
            // A full bucket is indistinguishable from a fresh one.
            idle_for < max_idle && bucket.tokens < self.capacity
        });
        before - self.buckets.len()
    }

    /// Number of tracked clients.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn check(&self, key: &str) -> RateLimitVerdict {
        self.check_at(key, Instant::now())
    }
}
