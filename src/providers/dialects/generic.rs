// ABOUTME: Generic SMART server dialect with standard FHIR R4 reading rules
// ABOUTME: No vendor extension markers and no mandatory search parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde_json::Value;

use super::{
    concept_text, first_coding_display, medication_concept, medication_reference_display,
    MedicationName, VendorDialect,
};
use crate::config::Vendor;

/// Standard reading rules
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl VendorDialect for GenericDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Generic
    }

    fn extension_markers(&self) -> &'static [&'static str] {
        &[]
    }

    fn concept_display(&self, concept: &Value) -> Option<String> {
        first_coding_display(concept).or_else(|| concept_text(concept))
    }

    fn medication(&self, resource: &Value) -> MedicationName {
        let mut name = medication_concept(self, resource);
        if name.display.is_none() {
            name.display = medication_reference_display(resource);
        }
        name
    }
}
