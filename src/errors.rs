// ABOUTME: Re-exports the connector error taxonomy from the core crate
// ABOUTME: Keeps `fhir_connector::errors` as the single import path for callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Error handling
//!
//! Every fallible operation returns [`ConnectorResult`]. Callers branch on the
//! variant:
//!
//! - [`ConnectorError::PermissionDenied`]: re-authenticate or request more scopes
//! - [`ConnectorError::RequestFailed`]: the server stayed unavailable; carries
//!   the failing kind, last status, correlation id and attempt count
//! - [`ConnectorError::ConfigurationError`]: fix deployment settings
//! - [`ConnectorError::ParseError`]: the server sent something undecodable

pub use fhir_connector_core::errors::{ConnectorError, ConnectorResult, FailureKind};
