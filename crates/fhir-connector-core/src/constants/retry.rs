// ABOUTME: Retry policy and HTTP timeout defaults for outbound FHIR calls
// ABOUTME: Exponential backoff base, attempt budget, and retryable status codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Default attempt budget per logical request (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Backoff base delay in milliseconds
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Status codes retried with backoff
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Status codes that trigger one token renewal before retrying
pub const AUTH_FAILURE_STATUS_CODES: [u16; 2] = [401, 403];

/// Resource request timeout in seconds
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection timeout in seconds
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Discovery document fetch timeout in seconds
pub const DISCOVERY_TIMEOUT_SECS: u64 = 5;
