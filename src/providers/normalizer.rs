// ABOUTME: Maps vendor FHIR resources onto the canonical flat models
// ABOUTME: Moves vendor-only extensions into a side channel before reading recognized fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Resource normalizer
//!
//! Normalization never fails: missing or oddly shaped fields become `None`.

use std::sync::Arc;

use fhir_connector_core::{
    Condition, Encounter, MedicationRequest, Observation, Patient, ResourceKind,
};
use serde_json::Value;

use super::dialects::{dialect_for, first_code, str_field, VendorDialect};
use crate::config::Vendor;

const EXTENSION_FIELDS: [&str; 2] = ["extension", "modifierExtension"];

/// A canonical model the normalizer can produce
pub trait FhirResource: Sized + Send {
    /// Resource kind this model represents
    const KIND: ResourceKind;

    /// Read recognized fields of `resource`, whose vendor extensions have
    /// already been moved into `vendor_extensions`
    fn from_fhir(resource: &Value, dialect: &dyn VendorDialect, vendor_extensions: Vec<Value>)
        -> Self;
}

/// Normalizes resources for one vendor dialect
#[derive(Debug, Clone)]
pub struct ResourceNormalizer {
    dialect: Arc<dyn VendorDialect>,
}

impl ResourceNormalizer {
    /// Normalizer for a configured vendor
    #[must_use]
    pub fn for_vendor(vendor: Vendor) -> Self {
        Self {
            dialect: dialect_for(vendor),
        }
    }

    /// Normalizer with an explicit dialect
    #[must_use]
    pub fn with_dialect(dialect: Arc<dyn VendorDialect>) -> Self {
        Self { dialect }
    }

    /// Dialect in use
    #[must_use]
    pub fn dialect(&self) -> &dyn VendorDialect {
        self.dialect.as_ref()
    }

    /// Copy of `resource` without vendor-only extensions, plus those extensions
    #[must_use]
    pub fn split_vendor_extensions(&self, resource: &Value) -> (Value, Vec<Value>) {
        let mut stripped = resource.clone();
        let mut vendor_only = Vec::new();

        if let Some(object) = stripped.as_object_mut() {
            for field in EXTENSION_FIELDS {
                let Some(Value::Array(extensions)) = object.remove(field) else {
                    continue;
                };
                let (vendor, standard): (Vec<Value>, Vec<Value>) =
                    extensions.into_iter().partition(|ext| {
                        ext.get("url")
                            .and_then(Value::as_str)
                            .is_some_and(|url| self.dialect.is_vendor_extension(url))
                    });
                vendor_only.extend(vendor);
                if !standard.is_empty() {
                    object.insert(field.to_owned(), Value::Array(standard));
                }
            }
        }

        (stripped, vendor_only)
    }

    /// Normalize one resource into its canonical model
    #[must_use]
    pub fn normalize<T: FhirResource>(&self, resource: &Value) -> T {
        let (stripped, vendor_extensions) = self.split_vendor_extensions(resource);
        T::from_fhir(&stripped, self.dialect.as_ref(), vendor_extensions)
    }
}

fn concept_code(resource: &Value, key: &str) -> Option<String> {
    resource.get(key).and_then(first_code)
}

fn display_of(resource: &Value, key: &str, dialect: &dyn VendorDialect) -> Option<String> {
    resource.get(key).and_then(|c| dialect.concept_display(c))
}

/// Status held either as a plain code or as a `CodeableConcept`
fn status_code(resource: &Value, key: &str) -> Option<String> {
    let value = resource.get(key)?;
    value
        .as_str()
        .map(str::to_owned)
        .or_else(|| first_code(value))
        .or_else(|| str_field(value, "text"))
}

/// `{prefix}DateTime`, `{prefix}Instant`, `{prefix}String`, or `{prefix}Period.start`
fn choice_date(resource: &Value, prefix: &str) -> Option<String> {
    ["DateTime", "Instant", "String"]
        .iter()
        .find_map(|suffix| str_field(resource, &format!("{prefix}{suffix}")))
        .or_else(|| {
            resource
                .get(format!("{prefix}Period"))
                .and_then(|p| str_field(p, "start"))
        })
}

fn first_array_item<'a>(resource: &'a Value, key: &str) -> Option<&'a Value> {
    resource.get(key).and_then(Value::as_array).and_then(|a| a.first())
}

fn human_name(name: &Value) -> Option<String> {
    if let Some(text) = str_field(name, "text").filter(|t| !t.trim().is_empty()) {
        return Some(text);
    }
    let mut parts: Vec<String> = name
        .get("given")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|g| g.as_str().map(str::to_owned))
        .collect();
    if let Some(family) = str_field(name, "family") {
        parts.push(family);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

impl FhirResource for Patient {
    const KIND: ResourceKind = ResourceKind::Patient;

    fn from_fhir(
        resource: &Value,
        _dialect: &dyn VendorDialect,
        vendor_extensions: Vec<Value>,
    ) -> Self {
        let names = resource.get("name").and_then(Value::as_array);
        let preferred = names.and_then(|names| {
            names
                .iter()
                .find(|n| n.get("use").and_then(Value::as_str) == Some("official"))
                .or_else(|| names.first())
        });

        Self {
            id: str_field(resource, "id"),
            name: preferred.and_then(human_name),
            gender: str_field(resource, "gender"),
            birth_date: str_field(resource, "birthDate"),
            active: resource.get("active").and_then(Value::as_bool),
            identifier: first_array_item(resource, "identifier").and_then(|i| str_field(i, "value")),
            vendor_extensions,
        }
    }
}

impl FhirResource for Condition {
    const KIND: ResourceKind = ResourceKind::Condition;

    fn from_fhir(
        resource: &Value,
        dialect: &dyn VendorDialect,
        vendor_extensions: Vec<Value>,
    ) -> Self {
        Self {
            id: str_field(resource, "id"),
            code: concept_code(resource, "code"),
            display: display_of(resource, "code", dialect),
            clinical_status: status_code(resource, "clinicalStatus"),
            verification_status: status_code(resource, "verificationStatus"),
            onset: choice_date(resource, "onset"),
            recorded_date: str_field(resource, "recordedDate"),
            vendor_extensions,
        }
    }
}

impl FhirResource for MedicationRequest {
    const KIND: ResourceKind = ResourceKind::MedicationRequest;

    fn from_fhir(
        resource: &Value,
        dialect: &dyn VendorDialect,
        vendor_extensions: Vec<Value>,
    ) -> Self {
        let medication = dialect.medication(resource);
        let dosage = first_array_item(resource, "dosageInstruction").and_then(|d| {
            str_field(d, "text").or_else(|| str_field(d, "patientInstruction"))
        });

        Self {
            id: str_field(resource, "id"),
            code: medication.code,
            display: medication.display,
            status: status_code(resource, "status"),
            intent: str_field(resource, "intent"),
            authored_on: str_field(resource, "authoredOn"),
            dosage,
            vendor_extensions,
        }
    }
}

impl FhirResource for Observation {
    const KIND: ResourceKind = ResourceKind::Observation;

    fn from_fhir(
        resource: &Value,
        dialect: &dyn VendorDialect,
        vendor_extensions: Vec<Value>,
    ) -> Self {
        let quantity = resource.get("valueQuantity");
        let value = quantity
            .and_then(|q| q.get("value"))
            .and_then(Value::as_f64)
            .or_else(|| resource.get("valueInteger").and_then(Value::as_f64));
        let unit = quantity.and_then(|q| str_field(q, "unit").or_else(|| str_field(q, "code")));
        let value_text = str_field(resource, "valueString")
            .or_else(|| display_of(resource, "valueCodeableConcept", dialect))
            .or_else(|| {
                resource
                    .get("valueBoolean")
                    .and_then(Value::as_bool)
                    .map(|b| b.to_string())
            });

        Self {
            id: str_field(resource, "id"),
            code: concept_code(resource, "code"),
            display: display_of(resource, "code", dialect),
            category: first_array_item(resource, "category").and_then(first_code),
            value,
            unit,
            value_text,
            status: status_code(resource, "status"),
            effective: choice_date(resource, "effective"),
            vendor_extensions,
        }
    }
}

impl FhirResource for Encounter {
    const KIND: ResourceKind = ResourceKind::Encounter;

    fn from_fhir(
        resource: &Value,
        dialect: &dyn VendorDialect,
        vendor_extensions: Vec<Value>,
    ) -> Self {
        // R4 `class` is a Coding; R5 made it a list of CodeableConcepts
        let class_code = match resource.get("class") {
            Some(Value::Array(classes)) => classes.first().and_then(first_code),
            Some(coding) => str_field(coding, "code"),
            None => None,
        };
        let period = resource.get("period");

        Self {
            id: str_field(resource, "id"),
            status: status_code(resource, "status"),
            class_code,
            type_display: first_array_item(resource, "type").and_then(|t| dialect.concept_display(t)),
            start: period.and_then(|p| str_field(p, "start")),
            end: period.and_then(|p| str_field(p, "end")),
            vendor_extensions,
        }
    }
}
