// ABOUTME: Cerner (Oracle Health) dialect: user-selected codings first, inline medication concepts
// ABOUTME: Recognizes cerner.com and oracle.com extension URLs as vendor-only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use fhir_connector_core::constants::oauth::cerner::EXTENSION_MARKERS;
use serde_json::Value;

use super::{
    codings, concept_text, first_coding_display, medication_concept,
    medication_reference_display, str_field, MedicationName, VendorDialect,
};
use crate::config::Vendor;

/// Cerner reading rules
#[derive(Debug, Clone, Copy, Default)]
pub struct CernerDialect;

impl VendorDialect for CernerDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Cerner
    }

    fn extension_markers(&self) -> &'static [&'static str] {
        EXTENSION_MARKERS
    }

    fn concept_display(&self, concept: &Value) -> Option<String> {
        codings(concept)
            .find(|c| c.get("userSelected").and_then(Value::as_bool) == Some(true))
            .and_then(|c| str_field(c, "display"))
            .or_else(|| first_coding_display(concept))
            .or_else(|| concept_text(concept))
    }

    fn medication(&self, resource: &Value) -> MedicationName {
        let mut name = medication_concept(self, resource);
        if name.display.is_none() {
            name.display = medication_reference_display(resource);
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_cerner_prefers_user_selected_coding() {
        let concept = json!({
            "text": "free text",
            "coding": [
                { "display": "SNOMED name" },
                { "display": "Clinician picked", "userSelected": true }
            ]
        });
        assert_eq!(
            CernerDialect.concept_display(&concept).as_deref(),
            Some("Clinician picked")
        );
    }

    #[test]
    fn test_cerner_falls_back_to_reference_display() {
        let order = json!({ "medicationReference": { "display": "amoxicillin" } });
        let name = CernerDialect.medication(&order);
        assert_eq!(name.display.as_deref(), Some("amoxicillin"));
        assert!(name.code.is_none());
    }
}
