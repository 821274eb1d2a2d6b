//! Shared Axum handler state: the Orchestrator plus the gateway-level
//! concerns that sit in front of it (spec §4.5).

use crate::constants::{RATE_LIMIT_COUNTER_MAX_AGE_SECS, RATE_LIMIT_PER_MINUTE};
use crate::orchestrator::Orchestrator;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-client-IP coarse rate floor (spec §4.5 "Coarse rate floor").
///
/// Not the authoritative limiter — a sliding window of one minute per IP,
/// purged lazily so idle IPs do not accumulate forever.
pub struct RateLimiter {
    counters: DashMap<String, (Instant, u32)>,
    limit_per_minute: u32,
    max_age: Duration,
}

impl RateLimiter {
    /// Builds a limiter allowing `limit_per_minute` requests per client IP
    /// per rolling minute.
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            counters: DashMap::new(),
            limit_per_minute,
            max_age: Duration::from_secs(RATE_LIMIT_COUNTER_MAX_AGE_SECS),
        }
    }

    /// Returns `true` if `client_ip` is still under its per-minute budget,
    /// incrementing its counter either way.
    pub fn check_and_record(&self, client_ip: &str) -> bool {
        let now = Instant::now();
        self.sweep_stale(now);

        let mut entry = self
            .counters
            .entry(client_ip.to_string())
            .or_insert((now, 0));

        if now.duration_since(entry.0) >= Duration::from_secs(60) {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= self.limit_per_minute
    }

    fn sweep_stale(&self, now: Instant) {
        self.counters
            .retain(|_, (started, _)| now.duration_since(*started) < self.max_age);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_PER_MINUTE)
    }
}

/// State shared across every Axum handler.
#[derive(Clone)]
pub struct HandlerState {
    pub orchestrator: Arc<Orchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
    /// When `false`, `POST /cache/clear` requires a matching confirmation
    /// token header (spec §6 "Cache admin").
    pub production_mode: bool,
    pub admin_confirmation_token: Option<String>,
}

impl HandlerState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        production_mode: bool,
        admin_confirmation_token: Option<String>,
    ) -> Self {
        Self {
            orchestrator,
            rate_limiter: Arc::new(RateLimiter::default()),
            production_mode,
            admin_confirmation_token,
        }
    }
}
