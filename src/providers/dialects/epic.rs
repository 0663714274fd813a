// ABOUTME: Epic dialect: concept text first, referenced medications, mandatory observation category
// ABOUTME: Recognizes epic.com extension URLs as vendor-only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use fhir_connector_core::constants::oauth::epic::EXTENSION_MARKERS;
use fhir_connector_core::ResourceKind;
use serde_json::Value;

use super::{
    concept_text, first_coding_display, medication_concept, medication_reference_display,
    MedicationName, VendorDialect,
};
use crate::config::Vendor;

/// Epic rejects Observation searches without a category
const OBSERVATION_CATEGORIES: &str = "vital-signs,laboratory,social-history";

/// Epic reading rules
#[derive(Debug, Clone, Copy, Default)]
pub struct EpicDialect;

impl VendorDialect for EpicDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Epic
    }

    fn extension_markers(&self) -> &'static [&'static str] {
        EXTENSION_MARKERS
    }

    fn concept_display(&self, concept: &Value) -> Option<String> {
        concept_text(concept).or_else(|| first_coding_display(concept))
    }

    fn medication(&self, resource: &Value) -> MedicationName {
        let from_concept = medication_concept(self, resource);
        match medication_reference_display(resource) {
            Some(display) => MedicationName {
                code: from_concept.code,
                display: Some(display),
            },
            None => from_concept,
        }
    }

    fn search_params(&self, kind: ResourceKind) -> Vec<(&'static str, &'static str)> {
        match kind {
            ResourceKind::Observation => vec![("category", OBSERVATION_CATEGORIES)],
            _ => Vec::new(),
        }
    }
}
