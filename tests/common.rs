// ABOUTME: Shared test utilities for connector integration tests
// ABOUTME: Fast-retry configurations, pre-authorized clients and FHIR fixture builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `fhir_connector`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fhir_connector::config::{ConnectorConfig, RetryPolicy};
use fhir_connector::oauth2_client::{CredentialContext, SmartAuthClient};
use serde_json::{json, Value};
use wiremock::MockServer;

/// Scope grant covering every resource the record service reads
pub const FULL_READ_SCOPES: &str = "openid fhirUser patient/*.read";

/// Configuration pointing at a mock server, with millisecond backoff
pub fn test_config(server: &MockServer) -> ConnectorConfig {
    let mut config = ConnectorConfig::new(server.uri());
    config.client_id = Some("test-client".to_owned());
    config.token_url = Some(format!("{}/token", server.uri()));
    config.auth_url = Some(format!("{}/authorize", server.uri()));
    config.scopes = Some("launch/patient openid fhirUser offline_access patient/*.read".to_owned());
    config.retry = RetryPolicy::new(4, Duration::from_millis(5));
    config.trust_env_proxy = false;
    config
}

/// Client for `config` holding `access_token` with full read scopes
pub async fn authorized_client(
    config: ConnectorConfig,
    access_token: &str,
) -> Result<Arc<SmartAuthClient>> {
    let client = SmartAuthClient::new(config)?;
    client
        .set_credentials(CredentialContext::with_token(access_token).with_scopes(FULL_READ_SCOPES))
        .await;
    Ok(Arc::new(client))
}

/// Token endpoint success body
pub fn token_body(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": format!("{access_token}-refresh"),
        "scope": FULL_READ_SCOPES,
    })
}

/// Search-set bundle wrapping `resources`, with an optional `next` link
pub fn search_bundle(resources: Vec<Value>, next: Option<&str>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({ "resource": resource, "search": { "mode": "match" } }))
        .collect();
    let mut links = vec![json!({ "relation": "self", "url": "self" })];
    if let Some(next) = next {
        links.push(json!({ "relation": "next", "url": next }));
    }
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "link": links,
        "entry": entries,
    })
}

pub fn patient_json(id: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "active": true,
        "gender": "female",
        "birthDate": "1987-09-12",
        "name": [{ "use": "official", "family": "Lopez", "given": ["Camila", "Maria"] }],
        "identifier": [{ "system": "urn:oid:1.2.36.146.595.217.0.1", "value": "MRN-12345" }]
    })
}

pub fn condition_json(id: &str, display: &str) -> Value {
    json!({
        "resourceType": "Condition",
        "id": id,
        "clinicalStatus": { "coding": [{ "code": "active" }] },
        "code": { "coding": [{ "system": "http://snomed.info/sct", "code": "38341003", "display": display }] },
        "onsetDateTime": "2019-04-02"
    })
}

pub fn medication_json(id: &str, display: &str) -> Value {
    json!({
        "resourceType": "MedicationRequest",
        "id": id,
        "status": "active",
        "intent": "order",
        "medicationCodeableConcept": { "coding": [{ "code": "314076", "display": display }] },
        "dosageInstruction": [{ "text": "1 tablet daily" }]
    })
}

pub fn observation_json(id: &str, value: f64) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "category": [{ "coding": [{ "code": "vital-signs" }] }],
        "code": { "coding": [{ "code": "8867-4", "display": "Heart rate" }] },
        "valueQuantity": { "value": value, "unit": "beats/minute" },
        "effectiveDateTime": "2024-01-05T10:00:00Z"
    })
}

pub fn encounter_json(id: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": "finished",
        "class": { "code": "AMB" },
        "type": [{ "text": "Office visit" }],
        "period": { "start": "2024-01-05T09:30:00Z", "end": "2024-01-05T10:15:00Z" }
    })
}
