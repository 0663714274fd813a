// ABOUTME: Configuration management module for the record connector
// ABOUTME: Environment-driven connector settings, vendor presets, and network policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! - **Environment**: `ConnectorConfig` loaded from `FHIR_*` variables
//! - **Network**: HTTP timeouts and the retry/backoff policy

/// Connector configuration and vendor presets
pub mod environment;
/// HTTP timeouts and retry policy
pub mod network;

pub use environment::{ConnectorConfig, Vendor, VendorPreset};
pub use network::{HttpSettings, RetryPolicy};
