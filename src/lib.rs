// ABOUTME: Main library entry point for the SMART-on-FHIR connector
// ABOUTME: Credential acquisition, resilient requests, pagination, normalization and record caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # FHIR Connector
//!
//! Connectivity layer between an application and a remote electronic health
//! record server speaking FHIR R4 with SMART-on-FHIR authorization.
//!
//! ## Features
//!
//! - **SMART auth**: authorization code + PKCE, refresh token and client
//!   credentials grants, with discovery of endpoints
//! - **Resilient requests**: bounded retries with exponential backoff and
//!   jitter, one token renewal on 401/403, scope preflight
//! - **Pagination**: Bundle `next` links followed in order
//! - **Normalization**: Epic, Cerner and generic servers mapped to one
//!   canonical model
//! - **Patient records**: four collections fetched concurrently and cached
//!   with a TTL
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use fhir_connector::config::ConnectorConfig;
//! use fhir_connector::errors::ConnectorResult;
//! use fhir_connector::services::PatientRecordService;
//!
//! #[tokio::main]
//! async fn main() -> ConnectorResult<()> {
//!     let config = ConnectorConfig::from_env()?;
//!     let service = PatientRecordService::connect(config).await?;
//!
//!     let bundle = service.fetch_patient_record("example").await?;
//!     println!("{} clinical entries", bundle.entry_count());
//!     Ok(())
//! }
//! ```

/// Patient bundle cache
pub mod cache;

/// Connector configuration and vendor presets
pub mod config;

/// Error types shared across the connector
pub mod errors;

/// Structured logging bootstrap
pub mod logging;

/// SMART-on-FHIR authorization client
pub mod oauth2_client;

/// FHIR resource access: requests, pagination, normalization
pub mod providers;

/// Patient record facade
pub mod services;

/// HTTP session construction
pub mod utils;

pub use fhir_connector_core::{constants, models};
