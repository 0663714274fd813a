// ABOUTME: Structured error types for remote health-record connectivity
// ABOUTME: Separates permission failures from exhausted transient failures and config errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ResourceKind;

/// Kind tag carried by a [`ConnectorError::RequestFailed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A generic outbound request exhausted its retry budget
    RequestFailed,
    /// The primary `Patient` read failed
    PatientFetchFailed,
    /// The `Condition` collection fetch failed
    ConditionsFetchFailed,
    /// The `MedicationRequest` collection fetch failed
    MedicationsFetchFailed,
    /// The `Observation` collection fetch failed
    ObservationsFetchFailed,
    /// The `Encounter` collection fetch failed
    EncountersFetchFailed,
}

impl FailureKind {
    /// Stable snake_case name used in logs and serialized errors
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestFailed => "request_failed",
            Self::PatientFetchFailed => "patient_fetch_failed",
            Self::ConditionsFetchFailed => "conditions_fetch_failed",
            Self::MedicationsFetchFailed => "medications_fetch_failed",
            Self::ObservationsFetchFailed => "observations_fetch_failed",
            Self::EncountersFetchFailed => "encounters_fetch_failed",
        }
    }

    /// Failure kind used when fetching the given resource kind
    #[must_use]
    pub const fn for_resource(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Patient => Self::PatientFetchFailed,
            ResourceKind::Condition => Self::ConditionsFetchFailed,
            ResourceKind::MedicationRequest => Self::MedicationsFetchFailed,
            ResourceKind::Observation => Self::ObservationsFetchFailed,
            ResourceKind::Encounter => Self::EncountersFetchFailed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the connector
///
/// Callers use the variant to decide between re-authentication
/// (`PermissionDenied`), retrying later or degrading (`RequestFailed`), and
/// fixing deployment settings (`ConfigurationError`).
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Missing, invalid or expired credential, missing scope, or an auth
    /// rejection that survived one refresh-and-retry
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Human readable reason, including the provider's error description when present
        reason: String,
        /// HTTP status observed, if the rejection came from the server
        status_code: Option<u16>,
    },

    /// A transient failure that exhausted the retry budget, or a resource
    /// fetch that could not complete
    #[error("{kind} (status: {}, correlation_id: {correlation_id}, attempts: {attempts}): {message}", .status_code.map_or_else(|| "none".to_owned(), |s| s.to_string()))]
    RequestFailed {
        /// Kind tag identifying the failing operation
        kind: FailureKind,
        /// Last HTTP status observed, if any
        status_code: Option<u16>,
        /// Caller supplied correlation id (defaults to the patient id)
        correlation_id: String,
        /// Number of underlying attempts made
        attempts: u32,
        /// Detail of the last failure
        message: String,
    },

    /// Missing or invalid configuration (endpoints, URLs, environment values)
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// What is missing or invalid
        message: String,
    },

    /// A response body could not be decoded
    #[error("Failed to parse response: {message}")]
    ParseError {
        /// Decoder error detail
        message: String,
    },
}

impl ConnectorError {
    /// Build a permission error without an HTTP status
    #[must_use]
    pub fn permission(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
            status_code: None,
        }
    }

    /// Build a permission error carrying the HTTP status that caused it
    #[must_use]
    pub fn permission_with_status(reason: impl Into<String>, status_code: u16) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
            status_code: Some(status_code),
        }
    }

    /// Build a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Build a parse error
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Whether the caller should prompt for re-authentication
    #[must_use]
    pub const fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Whether retrying the whole operation later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    /// HTTP status attached to the error, if any
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::PermissionDenied { status_code, .. } | Self::RequestFailed { status_code, .. } => {
                *status_code
            }
            Self::ConfigurationError { .. } | Self::ParseError { .. } => None,
        }
    }

    /// Correlation id attached to a request failure
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::RequestFailed { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    /// Failure kind attached to a request failure
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::RequestFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Re-tag an error as a failure of a specific fetch
    ///
    /// Permission and configuration errors pass through untouched so callers
    /// still see that re-authentication or reconfiguration is required.
    #[must_use]
    pub fn with_kind(self, kind: FailureKind, correlation_id: &str) -> Self {
        match self {
            Self::RequestFailed {
                status_code,
                attempts,
                message,
                ..
            } => Self::RequestFailed {
                kind,
                status_code,
                correlation_id: correlation_id.to_owned(),
                attempts,
                message,
            },
            Self::ParseError { message } => Self::RequestFailed {
                kind,
                status_code: None,
                correlation_id: correlation_id.to_owned(),
                attempts: 1,
                message,
            },
            other => other,
        }
    }
}

/// Result alias used by every fallible connector operation
pub type ConnectorResult<T> = Result<T, ConnectorError>;
