// ABOUTME: HTTP session construction with timeout and proxy configuration
// ABOUTME: Builds the single owned reqwest client each connector instance talks through
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use fhir_connector_core::errors::{ConnectorError, ConnectorResult};
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use crate::config::HttpSettings;

/// User agent sent on every outbound call
pub const USER_AGENT: &str = concat!("fhir-connector/", env!("CARGO_PKG_VERSION"));

/// Create the HTTP session for one connector instance
///
/// When `trust_env_proxy` is false, `HTTP_PROXY`/`HTTPS_PROXY` from the
/// process environment are ignored.
///
/// # Errors
///
/// Returns a configuration error if the TLS backend cannot be initialized
pub fn build_client(settings: &HttpSettings, trust_env_proxy: bool) -> ConnectorResult<Client> {
    let mut builder = ClientBuilder::new()
        .timeout(settings.request_timeout)
        .connect_timeout(settings.connect_timeout)
        .user_agent(USER_AGENT);

    if !trust_env_proxy {
        builder = builder.no_proxy();
    }

    debug!(
        request_timeout_secs = settings.request_timeout.as_secs(),
        connect_timeout_secs = settings.connect_timeout.as_secs(),
        trust_env_proxy,
        "Building FHIR HTTP client"
    );

    builder
        .build()
        .map_err(|e| ConnectorError::config(format!("Failed to build HTTP client: {e}")))
}
