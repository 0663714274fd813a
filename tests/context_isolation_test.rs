// ABOUTME: Integration tests for per-call credential overrides
// ABOUTME: Concurrent overrides must never observe each other's tokens or touch the base context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use anyhow::Result;
use fhir_connector::errors::ConnectorError;
use fhir_connector::oauth2_client::{current_override, with_credential_override, CredentialContext};
use fhir_connector::providers::{RequestSpec, ResilientRequester};
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{authorized_client, patient_json, test_config, FULL_READ_SCOPES};

async fn mount_patient_for_token(server: &MockServer, token: &str, patient_id: &str) {
    Mock::given(method("GET"))
        .and(path("/Patient/current"))
        .and(bearer_token(token))
        .respond_with(ResponseTemplate::new(200).set_body_json(patient_json(patient_id)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_overrides_use_their_own_tokens() -> Result<()> {
    let server = MockServer::start().await;
    mount_patient_for_token(&server, "base-token", "base-patient").await;
    mount_patient_for_token(&server, "alice-token", "alice").await;
    mount_patient_for_token(&server, "bob-token", "bob").await;

    let client = authorized_client(test_config(&server), "base-token").await?;
    let requester = ResilientRequester::new(client.clone());
    let url = format!("{}/Patient/current", server.uri());

    let as_user = |token: &'static str| {
        let requester = requester.clone();
        let url = url.clone();
        async move {
            let context = CredentialContext::with_token(token).with_scopes(FULL_READ_SCOPES);
            with_credential_override(context, async move {
                let mut ids = Vec::new();
                for _ in 0..5 {
                    let body = requester.request_json(RequestSpec::get(url.as_str())).await?;
                    ids.push(body["id"].as_str().unwrap_or_default().to_owned());
                    tokio::task::yield_now().await;
                }
                Ok::<_, ConnectorError>(ids)
            })
            .await
        }
    };

    let (alice, bob) = tokio::join!(as_user("alice-token"), as_user("bob-token"));
    assert!(alice?.iter().all(|id| id == "alice"));
    assert!(bob?.iter().all(|id| id == "bob"));

    let base = requester.request_json(RequestSpec::get(url.as_str())).await?;
    assert_eq!(base["id"], "base-patient");
    assert_eq!(
        client.credentials().await.access_token.as_deref(),
        Some("base-token")
    );
    Ok(())
}

#[tokio::test]
async fn test_override_is_scoped_to_its_future() -> Result<()> {
    let server = MockServer::start().await;
    let client = authorized_client(test_config(&server), "base-token").await?;

    assert!(current_override().is_none());
    let seen = with_credential_override(CredentialContext::with_token("outer"), async {
        let outer = current_override().and_then(|c| c.access_token);
        let inner = with_credential_override(CredentialContext::with_token("inner"), async {
            client.effective_credentials().await.access_token
        })
        .await;
        let after_inner = client.effective_credentials().await.access_token;
        (outer, inner, after_inner)
    })
    .await;

    assert_eq!(seen.0.as_deref(), Some("outer"));
    assert_eq!(seen.1.as_deref(), Some("inner"));
    assert_eq!(seen.2.as_deref(), Some("outer"));
    assert!(current_override().is_none());
    assert_eq!(
        client.effective_credentials().await.access_token.as_deref(),
        Some("base-token")
    );
    Ok(())
}

#[tokio::test]
async fn test_rejected_override_is_not_renewed() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Patient/current"))
        .and(bearer_token("revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = authorized_client(test_config(&server), "base-token").await?;
    let requester = ResilientRequester::new(client.clone());
    let context = CredentialContext::with_token("revoked").with_refresh_token("refresh");

    let result = with_credential_override(
        context,
        requester.request(RequestSpec::get(format!("{}/Patient/current", server.uri()))),
    )
    .await;

    let err = result.err();
    assert!(matches!(
        err,
        Some(ConnectorError::PermissionDenied {
            status_code: Some(401),
            ..
        })
    ));
    assert_eq!(
        client.credentials().await.access_token.as_deref(),
        Some("base-token")
    );
    Ok(())
}

#[tokio::test]
async fn test_override_without_token_fails_before_network() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let requester = ResilientRequester::new(authorized_client(test_config(&server), "base-token").await?);
    let result = with_credential_override(
        CredentialContext::default(),
        requester.request(RequestSpec::get(format!("{}/Patient/current", server.uri()))),
    )
    .await;

    assert!(result.is_err_and(|e| e.is_permission_error()));
    Ok(())
}
