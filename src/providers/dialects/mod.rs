// ABOUTME: Vendor dialect trait describing where each EHR puts display text and medications
// ABOUTME: Shared JSON helpers plus the Epic, Cerner, and generic implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Vendor dialects
//!
//! FHIR leaves room for vendors to disagree on which of `CodeableConcept.text`
//! and `Coding.display` is the human readable name, how medications are
//! referenced, and which search parameters are mandatory. A dialect captures
//! those choices; everything else is normalized the same way for all vendors.

use std::fmt;
use std::sync::Arc;

use fhir_connector_core::ResourceKind;
use serde_json::Value;

use crate::config::Vendor;

/// Cerner / Oracle Health dialect
pub mod cerner;
/// Epic dialect
pub mod epic;
/// Dialect for standards-conformant servers without vendor quirks
pub mod generic;

pub use cerner::CernerDialect;
pub use epic::EpicDialect;
pub use generic::GenericDialect;

/// Code and display of a medication
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicationName {
    /// Medication code
    pub code: Option<String>,
    /// Medication display name
    pub display: Option<String>,
}

/// Vendor-specific reading rules
pub trait VendorDialect: Send + Sync + fmt::Debug {
    /// Vendor this dialect describes
    fn vendor(&self) -> Vendor;

    /// Substrings that mark an extension URL as vendor-only
    fn extension_markers(&self) -> &'static [&'static str];

    /// Human readable name of a `CodeableConcept`
    fn concept_display(&self, concept: &Value) -> Option<String>;

    /// Medication code and name of a `MedicationRequest`
    fn medication(&self, resource: &Value) -> MedicationName;

    /// Extra search parameters the vendor requires for a collection search
    fn search_params(&self, _kind: ResourceKind) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    /// Whether an extension URL belongs to this vendor
    fn is_vendor_extension(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.extension_markers()
            .iter()
            .any(|marker| url.contains(marker))
    }
}

/// Dialect for a configured vendor
#[must_use]
pub fn dialect_for(vendor: Vendor) -> Arc<dyn VendorDialect> {
    match vendor {
        Vendor::Epic => Arc::new(EpicDialect),
        Vendor::Cerner => Arc::new(CernerDialect),
        Vendor::Generic => Arc::new(GenericDialect),
    }
}

/// String value of `value[key]`
#[must_use]
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Codings of a `CodeableConcept`
pub fn codings(concept: &Value) -> impl Iterator<Item = &Value> {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Code of the first coding that has one
#[must_use]
pub fn first_code(concept: &Value) -> Option<String> {
    codings(concept).find_map(|c| str_field(c, "code"))
}

/// Display of the first coding that has one
#[must_use]
pub fn first_coding_display(concept: &Value) -> Option<String> {
    codings(concept).find_map(|c| str_field(c, "display"))
}

/// Non-empty `CodeableConcept.text`
#[must_use]
pub fn concept_text(concept: &Value) -> Option<String> {
    str_field(concept, "text").filter(|t| !t.trim().is_empty())
}

/// Display of `medicationReference`
#[must_use]
pub fn medication_reference_display(resource: &Value) -> Option<String> {
    resource
        .get("medicationReference")
        .and_then(|r| str_field(r, "display"))
}

/// Code and display from `medicationCodeableConcept`, read with `dialect`
#[must_use]
pub fn medication_concept(dialect: &dyn VendorDialect, resource: &Value) -> MedicationName {
    resource
        .get("medicationCodeableConcept")
        .map(|concept| MedicationName {
            code: first_code(concept),
            display: dialect.concept_display(concept),
        })
        .unwrap_or_default()
}
