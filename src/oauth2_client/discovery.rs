// ABOUTME: SMART configuration discovery from the server's well-known document
// ABOUTME: One best-effort fetch that fills endpoints and scopes the configuration leaves open
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! SMART-on-FHIR discovery
//!
//! The document at `{base}/.well-known/smart-configuration` advertises the
//! authorization and token endpoints and the scopes the server supports.
//! Discovery is best effort: it is attempted once, with a short timeout and no
//! retries, and any failure leaves the configured values in place.

use std::time::Duration;

use fhir_connector_core::constants::fhir::SMART_CONFIGURATION_PATH;
use fhir_connector_core::constants::oauth::DEFAULT_SCOPES;
use fhir_connector_core::errors::{ConnectorError, ConnectorResult, FailureKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ConnectorConfig;

/// Subset of the SMART configuration document used by the connector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartConfiguration {
    /// Issuer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Authorization endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// Token revocation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    /// Scopes the server supports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    /// Supported grant types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE challenge methods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_challenge_methods_supported: Vec<String>,
    /// SMART capabilities (`launch-standalone`, `context-standalone-patient`, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl SmartConfiguration {
    /// Supported scopes joined into a request scope string
    #[must_use]
    pub fn default_scope_string(&self) -> Option<String> {
        if self.scopes_supported.is_empty() {
            None
        } else {
            Some(self.scopes_supported.join(" "))
        }
    }
}

/// Endpoints and scopes in effect after combining configuration and discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    /// Authorization endpoint, if any source provided one
    pub authorization_endpoint: Option<String>,
    /// Token endpoint, if any source provided one
    pub token_endpoint: Option<String>,
    /// Scope string requested on authorization and client-credentials grants
    pub scopes: String,
    /// Discovery document, when the fetch succeeded
    pub discovered: Option<SmartConfiguration>,
}

impl ResolvedEndpoints {
    /// Endpoints from configuration and vendor presets only
    #[must_use]
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            authorization_endpoint: config.configured_auth_url(),
            token_endpoint: config.configured_token_url(),
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.to_owned()),
            discovered: None,
        }
    }

    /// Fill values the configuration left open from a discovery document
    #[must_use]
    pub fn merge_discovery(config: &ConnectorConfig, discovered: SmartConfiguration) -> Self {
        let mut resolved = Self::from_config(config);
        if resolved.authorization_endpoint.is_none() {
            resolved
                .authorization_endpoint
                .clone_from(&discovered.authorization_endpoint);
        }
        if resolved.token_endpoint.is_none() {
            resolved.token_endpoint.clone_from(&discovered.token_endpoint);
        }
        if config.scopes.is_none() {
            if let Some(scopes) = discovered.default_scope_string() {
                resolved.scopes = scopes;
            }
        }
        resolved.discovered = Some(discovered);
        resolved
    }
}

/// Fetches the SMART configuration document
#[derive(Debug, Clone)]
pub struct DiscoveryResolver {
    client: Client,
    timeout: Duration,
}

impl DiscoveryResolver {
    /// Create a resolver sharing the connector's HTTP session
    #[must_use]
    pub const fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Discovery URL: explicit setting, else `{base}/.well-known/smart-configuration`
    #[must_use]
    pub fn discovery_url(config: &ConnectorConfig) -> String {
        config.discovery_url.clone().unwrap_or_else(|| {
            format!("{}/{SMART_CONFIGURATION_PATH}", config.normalized_base_url())
        })
    }

    /// Fetch and decode the discovery document once
    ///
    /// # Errors
    ///
    /// Returns a request error on transport failure or non-success status, and
    /// a parse error when the body is not a SMART configuration document
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> ConnectorResult<SmartConfiguration> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| discovery_failure(url, None, &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(discovery_failure(url, Some(status.as_u16()), "non-success status"));
        }

        response
            .json::<SmartConfiguration>()
            .await
            .map_err(|e| ConnectorError::parse(format!("Invalid SMART configuration: {e}")))
    }

    /// Resolve endpoints for a configuration, consulting discovery when the
    /// configuration leaves something open
    ///
    /// Never fails; discovery problems are logged and configuration values kept.
    pub async fn resolve(&self, config: &ConnectorConfig) -> ResolvedEndpoints {
        let from_config = ResolvedEndpoints::from_config(config);
        let needs_discovery = from_config.authorization_endpoint.is_none()
            || from_config.token_endpoint.is_none()
            || config.scopes.is_none();
        if !needs_discovery && config.discovery_url.is_none() {
            debug!("All endpoints configured explicitly, skipping discovery");
            return from_config;
        }

        let url = Self::discovery_url(config);
        match self.fetch(&url).await {
            Ok(document) => {
                info!(
                    discovery_url = %url,
                    has_authorization_endpoint = document.authorization_endpoint.is_some(),
                    has_token_endpoint = document.token_endpoint.is_some(),
                    scopes_supported = document.scopes_supported.len(),
                    "Resolved SMART configuration"
                );
                ResolvedEndpoints::merge_discovery(config, document)
            }
            Err(e) => {
                warn!(discovery_url = %url, error = %e, "SMART discovery failed, using configured endpoints");
                from_config
            }
        }
    }
}

fn discovery_failure(url: &str, status_code: Option<u16>, message: &str) -> ConnectorError {
    ConnectorError::RequestFailed {
        kind: FailureKind::RequestFailed,
        status_code,
        correlation_id: "discovery".to_owned(),
        attempts: 1,
        message: format!("GET {url}: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> SmartConfiguration {
        SmartConfiguration {
            authorization_endpoint: Some("https://auth.example.org/authorize".to_owned()),
            token_endpoint: Some("https://auth.example.org/token".to_owned()),
            scopes_supported: vec!["openid".to_owned(), "patient/*.read".to_owned()],
            ..SmartConfiguration::default()
        }
    }

    #[test]
    fn test_discovery_fills_missing_values() {
        let config = ConnectorConfig::new("https://fhir.example.org/r4");
        let resolved = ResolvedEndpoints::merge_discovery(&config, document());
        assert_eq!(
            resolved.token_endpoint.as_deref(),
            Some("https://auth.example.org/token")
        );
        assert_eq!(resolved.scopes, "openid patient/*.read");
    }

    #[test]
    fn test_configuration_wins_over_discovery() {
        let mut config = ConnectorConfig::new("https://fhir.example.org/r4");
        config.token_url = Some("https://configured.example.org/token".to_owned());
        config.scopes = Some("patient/Observation.read".to_owned());

        let resolved = ResolvedEndpoints::merge_discovery(&config, document());
        assert_eq!(
            resolved.token_endpoint.as_deref(),
            Some("https://configured.example.org/token")
        );
        assert_eq!(
            resolved.authorization_endpoint.as_deref(),
            Some("https://auth.example.org/authorize")
        );
        assert_eq!(resolved.scopes, "patient/Observation.read");
    }

    #[test]
    fn test_discovery_url_defaults_to_well_known() {
        let config = ConnectorConfig::new("https://fhir.example.org/r4/");
        assert_eq!(
            DiscoveryResolver::discovery_url(&config),
            "https://fhir.example.org/r4/.well-known/smart-configuration"
        );
    }
}
