//! Sliding-log rate limiting keyed by client address.
//!
//! Each limiter keeps, per key, the timestamps of accepted requests inside the
//! trailing window. A background sweep drops timestamps older than twice the
//! window and forgets keys whose log becomes empty.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use tracing::debug;

/// Shortest period the background sweep runs at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Shared per-key request log.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    logs: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            logs: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `key` may make another request now; accepted requests are recorded.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut logs = self.logs.lock().expect("RateLimiter lock poisoned");
        let log = logs.entry(key.to_string()).or_default();

        if let Some(cutoff) = now.checked_sub(self.window) {
            while log.front().is_some_and(|at| *at <= cutoff) {
                log.pop_front();
            }
        }

        if log.len() >= self.limit {
            return false;
        }
        log.push_back(now);
        true
    }

    /// Drop timestamps older than twice the window and forget empty keys.
    pub fn sweep_at(&self, now: Instant) {
        let mut logs = self.logs.lock().expect("RateLimiter lock poisoned");
        if let Some(cutoff) = now.checked_sub(self.window * 2) {
            for log in logs.values_mut() {
                while log.front().is_some_and(|at| *at <= cutoff) {
                    log.pop_front();
                }
            }
        }
        logs.retain(|_, log| !log.is_empty());
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.logs.lock().expect("RateLimiter lock poisoned").len()
    }

    /// Sweep every `interval` (at least [`MIN_SWEEP_INTERVAL`]) until the
    /// limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep_at(Instant::now());
                debug!(keys = limiter.tracked_keys(), "rate limiter swept");
            }
        })
    }
}

/// Client identity: first forwarded-for address, then real-ip, then the peer.
pub fn client_key(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor yielding the rate-limit key for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_key(&parts.headers, remote)))
    }
}
