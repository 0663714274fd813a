// ABOUTME: Environment configuration for the SMART-on-FHIR connector
// ABOUTME: Vendor presets, client credentials, endpoint overrides, and tuning knobs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration
//!
//! Endpoint precedence is: explicit setting, then vendor preset, then the
//! server's discovery document.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use fhir_connector_core::constants::cache::TTL_PATIENT_BUNDLE_SECS;
use fhir_connector_core::constants::fhir::DEFAULT_PAGE_SIZE;
use fhir_connector_core::constants::oauth::{
    cerner, epic, DEFAULT_SCOPES, VENDOR_CERNER, VENDOR_EPIC, VENDOR_GENERIC,
};
use fhir_connector_core::errors::{ConnectorError, ConnectorResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::network::{HttpSettings, RetryPolicy};
use crate::cache::CacheConfig;
use crate::services::RecordServiceConfig;

/// EHR vendor dialect selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Epic (`fhir.epic.com`)
    Epic,
    /// Cerner / Oracle Health
    Cerner,
    /// Any other SMART-on-FHIR server
    #[default]
    Generic,
}

impl Vendor {
    /// Stable identifier used in configuration and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => VENDOR_EPIC,
            Self::Cerner => VENDOR_CERNER,
            Self::Generic => VENDOR_GENERIC,
        }
    }

    /// Preset endpoints for the vendor's public sandbox
    #[must_use]
    pub const fn preset(self) -> Option<VendorPreset> {
        match self {
            Self::Epic => Some(VendorPreset {
                base_url: epic::BASE_URL,
                auth_url: epic::AUTH_URL,
                token_url: epic::TOKEN_URL,
            }),
            Self::Cerner => Some(VendorPreset {
                base_url: cerner::BASE_URL,
                auth_url: cerner::AUTH_URL,
                token_url: cerner::TOKEN_URL,
            }),
            Self::Generic => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            VENDOR_EPIC => Ok(Self::Epic),
            VENDOR_CERNER | "oracle" | "oracle_health" => Ok(Self::Cerner),
            VENDOR_GENERIC | "" => Ok(Self::Generic),
            other => Err(ConnectorError::config(format!(
                "Unknown FHIR vendor '{other}' (expected epic, cerner or generic)"
            ))),
        }
    }
}

/// Vendor sandbox endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorPreset {
    /// FHIR base URL
    pub base_url: &'static str,
    /// Authorization endpoint
    pub auth_url: &'static str,
    /// Token endpoint
    pub token_url: &'static str,
}

/// Connector configuration passed explicitly to constructors
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// FHIR server base URL
    pub base_url: String,
    /// Vendor dialect
    pub vendor: Vendor,
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret (confidential clients only)
    pub client_secret: Option<String>,
    /// Space-separated scope string to request; discovery fills it when absent
    pub scopes: Option<String>,
    /// Explicit authorization endpoint
    pub auth_url: Option<String>,
    /// Explicit token endpoint
    pub token_url: Option<String>,
    /// Explicit discovery document URL
    pub discovery_url: Option<String>,
    /// SMART `aud` parameter; defaults to the base URL
    pub audience: Option<String>,
    /// Static refresh token installed at construction
    pub refresh_token: Option<String>,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment
    pub trust_env_proxy: bool,
    /// Fail closed when no scopes have been granted
    pub strict_scopes: bool,
    /// HTTP session timeouts
    pub http: HttpSettings,
    /// Retry budget and backoff
    pub retry: RetryPolicy,
    /// Patient bundle cache settings
    pub cache: CacheConfig,
    /// Record service settings
    pub record: RecordServiceConfig,
}

impl ConnectorConfig {
    /// Configuration for a server with everything else defaulted
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            vendor: Vendor::Generic,
            client_id: None,
            client_secret: None,
            scopes: None,
            auth_url: None,
            token_url: None,
            discovery_url: None,
            audience: None,
            refresh_token: None,
            trust_env_proxy: true,
            strict_scopes: false,
            http: HttpSettings::default(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            record: RecordServiceConfig::default(),
        }
    }

    /// Configuration seeded from a vendor preset
    #[must_use]
    pub fn for_vendor(vendor: Vendor) -> Self {
        let mut config = Self::new(vendor.preset().map_or("", |p| p.base_url));
        config.vendor = vendor;
        config
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no base URL can be determined or a
    /// numeric/boolean variable does not parse
    pub fn from_env() -> ConnectorResult<Self> {
        let vendor: Vendor = env_var_or("FHIR_VENDOR", VENDOR_GENERIC).parse()?;
        let base_url = env_opt("FHIR_BASE_URL")
            .or_else(|| vendor.preset().map(|p| p.base_url.to_owned()))
            .ok_or_else(|| ConnectorError::config("FHIR_BASE_URL is required"))?;

        let mut config = Self::new(base_url);
        config.vendor = vendor;
        config.client_id = env_opt("FHIR_CLIENT_ID");
        config.client_secret = env_opt("FHIR_CLIENT_SECRET");
        config.scopes = env_opt("FHIR_SCOPES");
        config.auth_url = env_opt("FHIR_AUTH_URL");
        config.token_url = env_opt("FHIR_TOKEN_URL");
        config.discovery_url = env_opt("FHIR_DISCOVERY_URL");
        config.audience = env_opt("FHIR_AUDIENCE");
        config.refresh_token = env_opt("FHIR_REFRESH_TOKEN");
        config.trust_env_proxy = parse_env("FHIR_TRUST_ENV_PROXY", true)?;
        config.strict_scopes = parse_env("FHIR_STRICT_SCOPES", false)?;

        config.http.request_timeout = Duration::from_secs(parse_env(
            "FHIR_HTTP_TIMEOUT_SECS",
            config.http.request_timeout.as_secs(),
        )?);
        config.http.connect_timeout = Duration::from_secs(parse_env(
            "FHIR_HTTP_CONNECT_TIMEOUT_SECS",
            config.http.connect_timeout.as_secs(),
        )?);
        config.http.discovery_timeout = Duration::from_secs(parse_env(
            "FHIR_DISCOVERY_TIMEOUT_SECS",
            config.http.discovery_timeout.as_secs(),
        )?);

        config.retry.max_attempts =
            parse_env("FHIR_RETRY_MAX_ATTEMPTS", config.retry.max_attempts)?.max(1);
        config.retry.base_delay = Duration::from_millis(parse_env(
            "FHIR_RETRY_BASE_DELAY_MS",
            u64::try_from(config.retry.base_delay.as_millis()).unwrap_or(u64::MAX),
        )?);

        config.cache.max_entries = parse_env("FHIR_CACHE_MAX_ENTRIES", config.cache.max_entries)?;
        config.record.bundle_ttl = Some(Duration::from_secs(parse_env(
            "FHIR_CACHE_TTL_SECS",
            TTL_PATIENT_BUNDLE_SECS,
        )?));
        config.record.page_size = parse_env("FHIR_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;

        info!(
            base_url = %config.base_url,
            vendor = %config.vendor,
            "Loaded FHIR connector configuration from environment"
        );
        Ok(config)
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Explicit authorization endpoint, else the vendor preset
    #[must_use]
    pub fn configured_auth_url(&self) -> Option<String> {
        self.auth_url
            .clone()
            .or_else(|| self.vendor.preset().map(|p| p.auth_url.to_owned()))
    }

    /// Explicit token endpoint, else the vendor preset
    #[must_use]
    pub fn configured_token_url(&self) -> Option<String> {
        self.token_url
            .clone()
            .or_else(|| self.vendor.preset().map(|p| p.token_url.to_owned()))
    }

    /// SMART `aud` value
    #[must_use]
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.normalized_base_url().to_owned())
    }

    /// Scope string used when neither configuration nor discovery provides one
    #[must_use]
    pub fn fallback_scopes() -> String {
        DEFAULT_SCOPES.to_owned()
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T>(key: &str, default: T) -> ConnectorResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_opt(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| ConnectorError::config(format!("Invalid {key} value '{raw}': {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parsing() {
        assert_eq!("Epic".parse::<Vendor>().unwrap(), Vendor::Epic);
        assert_eq!("oracle".parse::<Vendor>().unwrap(), Vendor::Cerner);
        assert_eq!("".parse::<Vendor>().unwrap(), Vendor::Generic);
        assert!("allscripts".parse::<Vendor>().is_err());
    }

    #[test]
    fn test_explicit_endpoint_wins_over_preset() {
        let mut config = ConnectorConfig::for_vendor(Vendor::Epic);
        assert_eq!(config.base_url, epic::BASE_URL);
        assert_eq!(config.configured_token_url().as_deref(), Some(epic::TOKEN_URL));

        config.token_url = Some("https://auth.example.org/token".to_owned());
        assert_eq!(
            config.configured_token_url().as_deref(),
            Some("https://auth.example.org/token")
        );
    }

    #[test]
    fn test_audience_defaults_to_base_url() {
        let config = ConnectorConfig::new("https://fhir.example.org/r4/");
        assert_eq!(config.audience(), "https://fhir.example.org/r4");
        assert!(ConnectorConfig::new("x").configured_auth_url().is_none());
    }
}
