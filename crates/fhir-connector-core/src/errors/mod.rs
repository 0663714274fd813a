// ABOUTME: Error module for the record connector
// ABOUTME: Re-exports the connector error taxonomy and result alias
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Connector error taxonomy (permission, transient request failure, configuration, parse)
pub mod connector;

pub use connector::{ConnectorError, ConnectorResult, FailureKind};
