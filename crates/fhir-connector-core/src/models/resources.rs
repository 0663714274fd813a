// ABOUTME: Canonical resource shapes produced by the resource normalizer
// ABOUTME: Patient, Condition, MedicationRequest, Observation, and Encounter flat structs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Canonical resource models
//!
//! Vendor payloads differ in where they put display text, medication names
//! and observation values. Every shape here is flat, every field is optional,
//! and vendor-only extensions are kept verbatim in `vendor_extensions` so the
//! canonical fields never depend on them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource kinds the connector knows how to fetch and normalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Demographics of the subject
    Patient,
    /// Problems and diagnoses
    Condition,
    /// Medication orders
    MedicationRequest,
    /// Vitals, labs, and other measurements
    Observation,
    /// Visits and admissions
    Encounter,
}

impl ResourceKind {
    /// The four collections fanned out for a patient bundle
    pub const COLLECTIONS: [Self; 4] = [
        Self::Condition,
        Self::MedicationRequest,
        Self::Observation,
        Self::Encounter,
    ];

    /// FHIR `resourceType` and REST path segment
    #[must_use]
    pub const fn resource_type(self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Condition => "Condition",
            Self::MedicationRequest => "MedicationRequest",
            Self::Observation => "Observation",
            Self::Encounter => "Encounter",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_type())
    }
}

/// Normalized patient demographics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Server-assigned logical id
    pub id: Option<String>,
    /// Display name assembled from the preferred `HumanName`
    pub name: Option<String>,
    /// Administrative gender code
    pub gender: Option<String>,
    /// Birth date as sent by the server (FHIR partial dates preserved)
    pub birth_date: Option<String>,
    /// Whether the record is active
    pub active: Option<bool>,
    /// First identifier value (MRN or equivalent)
    pub identifier: Option<String>,
    /// Extensions whose URL carries a vendor marker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_extensions: Vec<Value>,
}

/// Normalized condition / problem-list entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Server-assigned logical id
    pub id: Option<String>,
    /// Primary code of the condition
    pub code: Option<String>,
    /// Human readable name of the condition
    pub display: Option<String>,
    /// `clinicalStatus` code (active, resolved, ...)
    pub clinical_status: Option<String>,
    /// `verificationStatus` code (confirmed, provisional, ...)
    pub verification_status: Option<String>,
    /// Onset date-time or period start
    pub onset: Option<String>,
    /// Date the condition was recorded
    pub recorded_date: Option<String>,
    /// Extensions whose URL carries a vendor marker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_extensions: Vec<Value>,
}

/// Normalized medication order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationRequest {
    /// Server-assigned logical id
    pub id: Option<String>,
    /// Medication code (`RxNorm` or vendor code)
    pub code: Option<String>,
    /// Medication display name
    pub display: Option<String>,
    /// Order status (active, stopped, ...)
    pub status: Option<String>,
    /// Order intent (order, plan, ...)
    pub intent: Option<String>,
    /// Date the order was authored
    pub authored_on: Option<String>,
    /// Free-text dosage instruction
    pub dosage: Option<String>,
    /// Extensions whose URL carries a vendor marker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_extensions: Vec<Value>,
}

/// Normalized observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Server-assigned logical id
    pub id: Option<String>,
    /// Observation code (LOINC or vendor code)
    pub code: Option<String>,
    /// Human readable name of the observation
    pub display: Option<String>,
    /// First category code (vital-signs, laboratory, ...)
    pub category: Option<String>,
    /// Numeric value when the observation is a quantity
    pub value: Option<f64>,
    /// Unit of the numeric value
    pub unit: Option<String>,
    /// Textual value when the observation is not a quantity
    pub value_text: Option<String>,
    /// Observation status (final, amended, ...)
    pub status: Option<String>,
    /// Effective date-time or period start
    pub effective: Option<String>,
    /// Extensions whose URL carries a vendor marker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_extensions: Vec<Value>,
}

/// Normalized encounter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    /// Server-assigned logical id
    pub id: Option<String>,
    /// Encounter status (finished, in-progress, ...)
    pub status: Option<String>,
    /// Encounter class code (AMB, IMP, ...)
    pub class_code: Option<String>,
    /// Human readable encounter type
    pub type_display: Option<String>,
    /// Period start
    pub start: Option<String>,
    /// Period end
    pub end: Option<String>,
    /// Extensions whose URL carries a vendor marker
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_extensions: Vec<Value>,
}
