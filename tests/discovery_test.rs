// ABOUTME: Tests for SMART configuration discovery and endpoint precedence
// ABOUTME: Explicit settings beat vendor presets, which beat the discovery document
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use anyhow::Result;
use fhir_connector::config::{ConnectorConfig, Vendor};
use fhir_connector::constants::oauth::epic;
use fhir_connector::errors::ConnectorError;
use fhir_connector::oauth2_client::{
    AuthorizationRequest, DiscoveryResolver, SmartAuthClient, SmartConfiguration,
};
use fhir_connector::utils::http_client::build_client;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WELL_KNOWN: &str = "/.well-known/smart-configuration";

fn base_config(server: &MockServer) -> ConnectorConfig {
    let mut config = ConnectorConfig::new(format!("{}/", server.uri()));
    config.client_id = Some("test-client".to_owned());
    config.trust_env_proxy = false;
    config
}

async fn mount_document(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": "https://login.example.org/authorize",
            "token_endpoint": "https://login.example.org/token",
            "scopes_supported": ["openid", "patient/*.read"],
            "capabilities": ["launch-standalone", "context-standalone-patient"],
            "unknown_field": { "ignored": true }
        })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovery_fills_endpoints_and_scopes() -> Result<()> {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let client = SmartAuthClient::connect(base_config(&server)).await?;
    assert_eq!(
        client.authorization_endpoint(),
        Some("https://login.example.org/authorize")
    );
    assert_eq!(client.token_endpoint(), Some("https://login.example.org/token"));
    assert_eq!(client.requested_scopes(), "openid patient/*.read");
    let document = client.smart_configuration().cloned().unwrap_or_default();
    assert_eq!(document.capabilities.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_explicit_values_beat_discovery() -> Result<()> {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let mut config = base_config(&server);
    config.token_url = Some("https://auth.hospital.example/token".to_owned());
    config.scopes = Some("openid patient/Patient.read".to_owned());
    let client = SmartAuthClient::connect(config).await?;

    assert_eq!(client.token_endpoint(), Some("https://auth.hospital.example/token"));
    assert_eq!(
        client.authorization_endpoint(),
        Some("https://login.example.org/authorize")
    );
    assert_eq!(client.requested_scopes(), "openid patient/Patient.read");
    Ok(())
}

#[tokio::test]
async fn test_vendor_preset_beats_discovery() -> Result<()> {
    let server = MockServer::start().await;
    mount_document(&server, 1).await;

    let mut config = base_config(&server);
    config.vendor = Vendor::Epic;
    let client = SmartAuthClient::connect(config).await?;

    assert_eq!(client.token_endpoint(), Some(epic::TOKEN_URL));
    assert_eq!(client.authorization_endpoint(), Some(epic::AUTH_URL));
    assert_eq!(client.requested_scopes(), "openid patient/*.read");
    Ok(())
}

#[tokio::test]
async fn test_fully_configured_client_skips_discovery() -> Result<()> {
    let server = MockServer::start().await;
    mount_document(&server, 0).await;

    let mut config = base_config(&server);
    config.auth_url = Some(format!("{}/authorize", server.uri()));
    config.token_url = Some(format!("{}/token", server.uri()));
    config.scopes = Some("openid".to_owned());
    let client = SmartAuthClient::connect(config).await?;

    assert!(client.smart_configuration().is_none());
    Ok(())
}

#[tokio::test]
async fn test_explicit_discovery_url_is_always_fetched() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/custom/smart.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_endpoint": "https://other.example.org/token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config(&server);
    config.auth_url = Some(format!("{}/authorize", server.uri()));
    config.token_url = Some(format!("{}/token", server.uri()));
    config.scopes = Some("openid".to_owned());
    config.discovery_url = Some(format!("{}/custom/smart.json", server.uri()));
    let client = SmartAuthClient::connect(config).await?;

    assert_eq!(client.token_endpoint(), Some(format!("{}/token", server.uri())).as_deref());
    assert!(client.smart_configuration().is_some());
    Ok(())
}

#[tokio::test]
async fn test_discovery_failure_falls_back_to_configuration() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartAuthClient::connect(base_config(&server)).await?;
    assert!(client.authorization_endpoint().is_none());
    assert!(client.token_endpoint().is_none());
    assert_eq!(client.requested_scopes(), ConnectorConfig::fallback_scopes());

    let err = client
        .build_authorization_url(AuthorizationRequest::new("http://localhost/callback"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::ConfigurationError { .. }));
    Ok(())
}

#[tokio::test]
async fn test_resolver_reports_fetch_failures() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/not-json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let config = base_config(&server);
    let http = build_client(&config.http, config.trust_env_proxy)?;
    let resolver = DiscoveryResolver::new(http, Duration::from_secs(5));
    assert_eq!(
        DiscoveryResolver::discovery_url(&config),
        format!("{}{WELL_KNOWN}", server.uri())
    );

    let err = resolver
        .fetch(&DiscoveryResolver::discovery_url(&config))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.correlation_id(), Some("discovery"));

    let err = resolver
        .fetch(&format!("{}/not-json", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::ParseError { .. }));

    let parsed: SmartConfiguration = serde_json::from_value(json!({}))?;
    assert_eq!(parsed, SmartConfiguration::default());
    Ok(())
}
