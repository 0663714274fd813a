// ABOUTME: Authenticated HTTP requester with retry, backoff, token renewal, and scope preflight
// ABOUTME: Every outbound FHIR resource call goes through this single policy point
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Resilient requester
//!
//! Policy for one logical request:
//! - 429/500/502/503/504 and transport errors are retried with exponential
//!   backoff plus jitter until the attempt budget is spent, then surface as
//!   [`ConnectorError::RequestFailed`]
//! - 401/403 renew the token once and retry; a second rejection, or a
//!   rejection with no attempts left, surfaces as
//!   [`ConnectorError::PermissionDenied`]
//! - anything else is returned to the caller untouched

use std::sync::Arc;

use fhir_connector_core::constants::fhir::FHIR_JSON;
use fhir_connector_core::constants::retry::{AUTH_FAILURE_STATUS_CODES, RETRYABLE_STATUS_CODES};
use fhir_connector_core::errors::{ConnectorError, ConnectorResult, FailureKind};
use fhir_connector_core::ResourceKind;
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::scopes::missing_read_access;
use crate::config::RetryPolicy;
use crate::oauth2_client::{override_active, SmartAuthClient};

/// Description of one logical request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: String,
    params: Vec<(String, String)>,
    body: Option<Value>,
    max_attempts: Option<u32>,
    correlation_id: Option<String>,
}

impl RequestSpec {
    /// Request with an arbitrary method
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            body: None,
            max_attempts: None,
            correlation_id: None,
        }
    }

    /// `GET` request
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST` request
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Append one query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Append query parameters
    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// JSON request body, sent as `application/fhir+json`
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the policy's attempt budget for this request
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Correlation id for logs and errors; never sent over the wire
    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Issues authenticated requests with the retry policy applied
#[derive(Debug, Clone)]
pub struct ResilientRequester {
    auth: Arc<SmartAuthClient>,
    retry: RetryPolicy,
}

impl ResilientRequester {
    /// Create a requester using the client's configured retry policy
    #[must_use]
    pub fn new(auth: Arc<SmartAuthClient>) -> Self {
        let retry = auth.config().retry;
        Self { auth, retry }
    }

    /// Create a requester with an explicit retry policy
    #[must_use]
    pub const fn with_policy(auth: Arc<SmartAuthClient>, retry: RetryPolicy) -> Self {
        Self { auth, retry }
    }

    /// The auth client whose credentials this requester uses
    #[must_use]
    pub const fn auth(&self) -> &Arc<SmartAuthClient> {
        &self.auth
    }

    /// Retry policy in effect
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Reject before any network call when the effective scopes do not cover
    /// reading every kind in `kinds`
    ///
    /// With no scopes granted at all, the check passes unless the connector is
    /// configured with `strict_scopes`.
    ///
    /// # Errors
    ///
    /// Returns a permission error naming the uncovered resource types
    pub async fn require_scopes(&self, kinds: &[ResourceKind]) -> ConnectorResult<()> {
        let credentials = self.auth.effective_credentials().await;
        if credentials.scopes.is_empty() {
            if self.auth.config().strict_scopes {
                return Err(ConnectorError::permission(
                    "No scopes granted; re-authorize with resource scopes",
                ));
            }
            debug!("No scopes granted, skipping scope preflight");
            return Ok(());
        }

        let missing = missing_read_access(&credentials.scopes, kinds);
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|k| k.resource_type()).collect();
        Err(ConnectorError::permission(format!(
            "Granted scopes do not allow reading {}; request patient/, user/ or system/ read scopes",
            names.join(", ")
        )))
    }

    /// Issue a request, applying the retry and renewal policy
    ///
    /// # Errors
    ///
    /// Returns a permission error for missing or rejected credentials and a
    /// request failure once transient failures exhaust the attempt budget
    #[instrument(skip(self, spec), fields(method = %spec.method, url = %spec.url, correlation_id = tracing::field::Empty))]
    pub async fn request(&self, spec: RequestSpec) -> ConnectorResult<Response> {
        let correlation_id = spec
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::Span::current().record("correlation_id", correlation_id.as_str());
        let max_attempts = spec.max_attempts.unwrap_or(self.retry.max_attempts).max(1);

        self.auth.ensure_valid_token().await?;

        let mut renewed = false;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = self
                .auth
                .effective_credentials()
                .await
                .access_token
                .ok_or_else(|| ConnectorError::permission("No access token available"))?;

            let outcome = self.send_once(&spec, &token).await;
            let (status_code, message) = match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if AUTH_FAILURE_STATUS_CODES.contains(&status) {
                        // The rejected base token is replaced even when no retry follows
                        let renewable = !renewed && !override_active();
                        if renewable {
                            warn!(status, attempt, "Authorization rejected, renewing token");
                            self.auth.renew_after_rejection(&token).await?;
                            renewed = true;
                        }
                        if !renewable || attempt >= max_attempts {
                            warn!(status, attempt, "Authorization rejected after renewal");
                            return Err(ConnectorError::permission_with_status(
                                format!(
                                    "{} {} was rejected with status {status}; confirm the authorization, patient consent and granted scopes",
                                    spec.method, spec.url
                                ),
                                status,
                            ));
                        }
                        continue;
                    }
                    if !RETRYABLE_STATUS_CODES.contains(&status) {
                        debug!(status, attempt, "Request completed");
                        return Ok(response);
                    }
                    (Some(status), format!("server responded with status {status}"))
                }
                Err(e) => (None, format!("transport error: {e}")),
            };

            if attempt >= max_attempts {
                warn!(attempt, status = ?status_code, "Retry budget exhausted");
                return Err(ConnectorError::RequestFailed {
                    kind: FailureKind::RequestFailed,
                    status_code,
                    correlation_id,
                    attempts: attempt,
                    message,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                attempt,
                max_attempts,
                status = ?status_code,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, backing off: {message}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, spec: &RequestSpec, token: &str) -> reqwest::Result<Response> {
        let mut builder = self
            .auth
            .http_client()
            .request(spec.method.clone(), &spec.url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, FHIR_JSON);
        if !spec.params.is_empty() {
            builder = builder.query(&spec.params);
        }
        if let Some(body) = &spec.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
                .body(body.to_string());
        }
        builder.send().await
    }

    /// Issue a request and decode a successful JSON body
    ///
    /// # Errors
    ///
    /// Everything [`Self::request`] returns, plus a request failure for a
    /// non-success status and a parse error for an undecodable body
    pub async fn request_json(&self, spec: RequestSpec) -> ConnectorResult<Value> {
        let correlation_id = spec
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let method = spec.method.clone();
        let url = spec.url.clone();
        let response = self.request(spec.correlation_id(correlation_id.clone())).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed {
                kind: FailureKind::RequestFailed,
                status_code: Some(status.as_u16()),
                correlation_id,
                attempts: 1,
                message: format!("{method} {url} returned {status}: {}", truncate(&body, 200)),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ConnectorError::parse(format!("Invalid JSON from {url}: {e}")))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
