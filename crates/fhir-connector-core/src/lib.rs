// ABOUTME: Core types and constants for the SMART-on-FHIR record connector
// ABOUTME: Foundation crate with error taxonomy, canonical resource models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # FHIR Connector Core
//!
//! Foundation crate providing shared types and constants for the record
//! connector. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: `ConnectorError` taxonomy (permission, request, configuration, parse)
//! - **constants**: Vendor presets, OAuth defaults, cache and retry defaults
//! - **models**: Canonical resource shapes and the assembled `PatientBundle`

/// Typed error taxonomy shared by every connector component
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Canonical resource models and the assembled patient bundle
pub mod models;

pub use errors::{ConnectorError, ConnectorResult, FailureKind};
pub use models::{
    Condition, Encounter, MedicationRequest, Observation, Patient, PatientBundle, ResourceKind,
};
