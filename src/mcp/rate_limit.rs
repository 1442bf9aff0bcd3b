//! Token-bucket admission control for inbound requests.

use std::time::Instant;

/// A token bucket. Disabled (always admitting) until configured.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    enabled: bool,
    requests_per_second: f64,
    burst_capacity: usize,
    tokens: f64,
    last_refill: Instant,
    total_allowed: u64,
    total_denied: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 0.0,
            burst_capacity: 0,
            tokens: 0.0,
            last_refill: Instant::now(),
            total_allowed: 0,
            total_denied: 0,
        }
    }
}

impl RateLimiter {
    /// Creates a disabled limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables limiting and fills the bucket.
    pub fn configure(&mut self, requests_per_second: f64, burst_capacity: usize) {
        self.configure_at(requests_per_second, burst_capacity, Instant::now());
    }

    /// [`Self::configure`] against an explicit clock.
    #[allow(clippy::cast_precision_loss)]
    pub fn configure_at(&mut self, requests_per_second: f64, burst_capacity: usize, now: Instant) {
        self.enabled = true;
        self.requests_per_second = requests_per_second.max(0.0);
        self.burst_capacity = burst_capacity;
        self.tokens = burst_capacity as f64;
        self.last_refill = now;
        tracing::debug!(requests_per_second, burst_capacity, "Rate limiting enabled");
    }

    /// Turns limiting off. Every later acquire succeeds.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Returns `true` if limiting is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Takes one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// [`Self::try_acquire`] against an explicit clock.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.total_allowed += 1;
            true
        } else {
            self.total_denied += 1;
            false
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = elapsed
            .mul_add(self.requests_per_second, self.tokens)
            .min(self.burst_capacity as f64);
    }

    /// Tokens currently in the bucket, without refilling.
    #[must_use]
    pub const fn available_tokens(&self) -> f64 {
        self.tokens
    }

    /// Configured refill rate.
    #[must_use]
    pub const fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    /// Configured bucket size.
    #[must_use]
    pub const fn burst_capacity(&self) -> usize {
        self.burst_capacity
    }

    /// Requests admitted since the last reset.
    #[must_use]
    pub const fn total_allowed(&self) -> u64 {
        self.total_allowed
    }

    /// Requests rejected since the last reset.
    #[must_use]
    pub const fn total_denied(&self) -> u64 {
        self.total_denied
    }

    /// Zeroes the counters. The bucket and configuration are untouched.
    pub fn reset_stats(&mut self) {
        self.total_allowed = 0;
        self.total_denied = 0;
    }
}
