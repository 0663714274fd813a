// ABOUTME: Integration tests for the SMART authorization state machine
// ABOUTME: Covers PKCE URLs, code exchange, refresh, client credentials and renewal races
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, Utc};
use fhir_connector::errors::ConnectorError;
use fhir_connector::oauth2_client::{
    AuthPhase, AuthorizationRequest, CredentialContext, SmartAuthClient,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{test_config, token_body};

#[tokio::test]
async fn test_authorization_url_carries_pkce_and_smart_parameters() -> Result<()> {
    let server = MockServer::start().await;
    let client = SmartAuthClient::new(test_config(&server))?;

    let authorization = client
        .build_authorization_url(
            AuthorizationRequest::new("http://localhost:8080/callback").with_launch("xyz"),
        )
        .await?;

    let url = Url::parse(&authorization.url)?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(url.path(), "/authorize");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "test-client");
    assert_eq!(params["redirect_uri"], "http://localhost:8080/callback");
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["aud"], server.uri());
    assert_eq!(params["launch"], "xyz");
    assert_eq!(params["state"], authorization.state);
    assert!(params["scope"].contains("patient/*.read"));
    assert!(!params["code_challenge"].contains('='));
    assert!((43..=128).contains(&authorization.code_verifier.len()));
    assert_eq!(client.auth_phase().await, AuthPhase::Authorizing);
    Ok(())
}

#[tokio::test]
async fn test_authorization_url_requires_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    let mut config = test_config(&server);
    config.auth_url = None;
    let client = SmartAuthClient::new(config)?;

    let err = client
        .build_authorization_url(AuthorizationRequest::new("http://localhost/cb"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::ConfigurationError { .. }));
    Ok(())
}

#[tokio::test]
async fn test_code_exchange_persists_tokens_and_launch_context() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok1",
            "expires_in": 3600,
            "refresh_token": "r1",
            "scope": "patient/*.read openid",
            "patient": "p1",
            "username": "dr-smith"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    let authorization = client
        .build_authorization_url(AuthorizationRequest::new("http://localhost/cb"))
        .await?;
    let credentials = client
        .complete_authorization_with_state("abc", "http://localhost/cb", &authorization.state)
        .await?;

    assert_eq!(credentials.access_token.as_deref(), Some("tok1"));
    assert_eq!(credentials.refresh_token.as_deref(), Some("r1"));
    assert_eq!(credentials.patient_id.as_deref(), Some("p1"));
    assert_eq!(credentials.user_id.as_deref(), Some("dr-smith"));
    assert!(credentials.scopes.contains("patient/*.read"));
    assert!(credentials.expires_at.is_some_and(|at| at > Utc::now()));
    assert_eq!(client.auth_phase().await, AuthPhase::Authorized);
    Ok(())
}

#[tokio::test]
async fn test_missing_scope_falls_back_to_requested_and_hints_fill_context() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok1" })))
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .build_authorization_url(
            AuthorizationRequest::new("http://localhost/cb")
                .with_patient("hinted-patient")
                .with_user("hinted-user"),
        )
        .await?;
    let credentials = client
        .complete_authorization("code", "http://localhost/cb", None)
        .await?;

    assert!(credentials.scopes.contains("offline_access"));
    assert!(credentials.expires_at.is_none());
    assert_eq!(credentials.patient_id.as_deref(), Some("hinted-patient"));
    assert_eq!(credentials.user_id.as_deref(), Some("hinted-user"));
    Ok(())
}

#[tokio::test]
async fn test_state_mismatch_rejected_before_token_request() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok1")))
        .expect(0)
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .build_authorization_url(AuthorizationRequest::new("http://localhost/cb"))
        .await?;
    let err = client
        .complete_authorization_with_state("abc", "http://localhost/cb", "forged")
        .await
        .unwrap_err();

    assert!(err.is_permission_error());
    Ok(())
}

#[tokio::test]
async fn test_exchange_without_verifier_or_pending_handshake_is_config_error() -> Result<()> {
    let server = MockServer::start().await;
    let client = SmartAuthClient::new(test_config(&server))?;

    let err = client
        .complete_authorization("abc", "http://localhost/cb", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::ConfigurationError { .. }));
    Ok(())
}

#[tokio::test]
async fn test_token_error_surfaces_provider_description() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Authorization code expired"
        })))
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    let err = client
        .complete_authorization("stale", "http://localhost/cb", Some("verifier"))
        .await
        .unwrap_err();

    assert!(err.is_permission_error());
    assert_eq!(err.status_code(), Some(400));
    assert!(err.to_string().contains("Authorization code expired"));
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_refreshed() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok2")))
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .set_credentials(
            CredentialContext::with_token("tok1")
                .with_refresh_token("r1")
                .with_expiry(Utc::now() - Duration::seconds(30)),
        )
        .await;

    client.ensure_valid_token().await?;
    let credentials = client.credentials().await;
    assert_eq!(credentials.access_token.as_deref(), Some("tok2"));
    assert_eq!(credentials.refresh_token.as_deref(), Some("tok2-refresh"));
    assert_eq!(client.auth_phase().await, AuthPhase::Authorized);

    // Still valid, no second grant
    client.ensure_valid_token().await?;
    Ok(())
}

#[tokio::test]
async fn test_client_credentials_used_without_refresh_token() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("svc-token")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.client_secret = Some("s3cret".to_owned());
    let client = SmartAuthClient::new(config)?;

    client.ensure_valid_token().await?;
    assert_eq!(
        client.credentials().await.access_token.as_deref(),
        Some("svc-token")
    );
    Ok(())
}

#[tokio::test]
async fn test_no_way_to_obtain_token_is_permission_error() -> Result<()> {
    let server = MockServer::start().await;
    let mut config = test_config(&server);
    config.client_id = None;
    let client = SmartAuthClient::new(config)?;

    let err = client.ensure_valid_token().await.unwrap_err();
    assert!(err.is_permission_error());
    assert_eq!(client.auth_phase().await, AuthPhase::Failed);
    Ok(())
}

#[tokio::test]
async fn test_rejected_refresh_marks_failed() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .set_credentials(CredentialContext::default().with_refresh_token("revoked"))
        .await;

    let err = client.refresh().await.unwrap_err();
    assert!(err.is_permission_error());
    assert_eq!(err.status_code(), Some(401));
    assert!(err.to_string().contains("refresh token revoked"));
    assert_eq!(client.auth_phase().await, AuthPhase::Failed);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_renewals_share_one_grant() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("fresh"))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .set_credentials(CredentialContext::with_token("stale").with_refresh_token("r1"))
        .await;

    let (first, second, third) = tokio::join!(
        client.renew_after_rejection("stale"),
        client.renew_after_rejection("stale"),
        client.renew_after_rejection("stale"),
    );
    first?;
    second?;
    third?;
    assert_eq!(
        client.credentials().await.access_token.as_deref(),
        Some("fresh")
    );
    Ok(())
}

#[tokio::test]
async fn test_logout_clears_credentials() -> Result<()> {
    let server = MockServer::start().await;
    let client = SmartAuthClient::new(test_config(&server))?;
    client
        .set_credentials(CredentialContext::with_token("tok").with_patient("p1"))
        .await;
    assert_eq!(client.auth_phase().await, AuthPhase::Authorized);

    client.logout().await;
    assert!(client.credentials().await.access_token.is_none());
    assert_eq!(client.auth_phase().await, AuthPhase::Unauthenticated);
    Ok(())
}
