// ABOUTME: Canonical data models for normalized FHIR resources
// ABOUTME: Flat per-kind structs plus the assembled patient bundle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Assembled patient record returned by the record service
pub mod bundle;
/// Canonical per-kind resource shapes
pub mod resources;

pub use bundle::PatientBundle;
pub use resources::{
    Condition, Encounter, MedicationRequest, Observation, Patient, ResourceKind,
};
