// ABOUTME: Network configuration types for the FHIR HTTP session and retry policy
// ABOUTME: Handles timeouts, proxy behavior, and exponential backoff with jitter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use fhir_connector_core::constants::retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DISCOVERY_TIMEOUT_SECS,
    HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};
use rand::Rng;

/// HTTP session timeouts
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Request timeout for token and resource calls
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Timeout for the one-shot discovery fetch
    pub discovery_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS),
            discovery_timeout: Duration::from_secs(DISCOVERY_TIMEOUT_SECS),
        }
    }
}

/// Retry budget and backoff for one logical request
///
/// `delay(attempt) = base * 2^(attempt-1) + uniform(0, base/2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Backoff base delay
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit attempt budget and base delay
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Same policy with a different attempt budget
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Deterministic part of the delay after the given failed attempt (1-based)
    #[must_use]
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }

    /// Full delay after the given failed attempt, jitter included
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter_cap = self.base_delay / 2;
        let jitter = if jitter_cap.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=jitter_cap)
        };
        self.exponential_delay(attempt) + jitter
    }
}
