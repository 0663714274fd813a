// ABOUTME: Subcommand implementations for the fhir-connector CLI
// ABOUTME: Each command builds its own client from configuration and prints JSON to stdout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use anyhow::{Context, Result};
use fhir_connector::config::ConnectorConfig;
use fhir_connector::oauth2_client::{
    AuthorizationRequest, CredentialContext, DiscoveryResolver, SmartAuthClient,
};
use fhir_connector::services::PatientRecordService;
use fhir_connector::utils::http_client::build_client;
use serde_json::{json, Value};

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn authorize_url(
    config: ConnectorConfig,
    redirect_uri: String,
    launch: Option<String>,
) -> Result<()> {
    let client = SmartAuthClient::connect(config).await?;
    let mut request = AuthorizationRequest::new(redirect_uri);
    if let Some(launch) = launch {
        request = request.with_launch(launch);
    }
    let authorization = client.build_authorization_url(request).await?;

    print_json(&json!({
        "url": authorization.url,
        "state": authorization.state,
        "code_verifier": authorization.code_verifier,
    }))
}

pub async fn exchange(
    config: ConnectorConfig,
    code: &str,
    redirect_uri: &str,
    verifier: &str,
) -> Result<()> {
    let client = SmartAuthClient::connect(config).await?;
    let credentials = client
        .complete_authorization(code, redirect_uri, Some(verifier))
        .await
        .context("Authorization code exchange failed")?;

    print_json(&json!({
        "access_token": credentials.access_token,
        "refresh_token": credentials.refresh_token,
        "scope": credentials.scope_string(),
        "patient": credentials.patient_id,
        "user": credentials.user_id,
        "expires_at": credentials.expires_at,
    }))
}

pub async fn fetch(
    config: ConnectorConfig,
    patient_id: &str,
    access_token: Option<String>,
) -> Result<()> {
    let auth = Arc::new(SmartAuthClient::connect(config).await?);
    if let Some(token) = access_token {
        auth.set_credentials(CredentialContext::with_token(token)).await;
    }
    let service = PatientRecordService::new(auth);
    let bundle = service
        .fetch_patient_record(patient_id)
        .await
        .with_context(|| format!("Could not assemble the record for patient {patient_id}"))?;

    print_json(&serde_json::to_value(bundle.as_ref())?)
}

pub async fn discover(config: ConnectorConfig) -> Result<()> {
    let http = build_client(&config.http, config.trust_env_proxy)?;
    let url = DiscoveryResolver::discovery_url(&config);
    let document = DiscoveryResolver::new(http, config.http.discovery_timeout)
        .fetch(&url)
        .await
        .with_context(|| format!("Discovery failed at {url}"))?;

    print_json(&json!({
        "discovery_url": url,
        "configuration": document,
    }))
}
