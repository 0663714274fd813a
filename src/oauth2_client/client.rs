// ABOUTME: SMART-on-FHIR OAuth client implementing the authorization state machine
// ABOUTME: PKCE authorization URLs, code exchange, refresh, and client-credentials fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! SMART authorization flow
//!
//! ```text
//! Unauthenticated -> Authorizing(pkce) -> Authorized -> Refreshing -> Authorized | Failed
//! Unauthenticated -> ClientCredentialsPending -> Authorized | Failed
//! ```
//!
//! The client owns the base [`CredentialContext`]. Renewal (refresh or
//! client-credentials) runs behind a latch so concurrent callers racing on the
//! same expired token trigger a single token request.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use fhir_connector_core::constants::oauth::{
    CODE_VERIFIER_LENGTH, GRANT_AUTHORIZATION_CODE, GRANT_CLIENT_CREDENTIALS,
    GRANT_REFRESH_TOKEN, PKCE_METHOD_S256, STATE_NONCE_LENGTH,
};
use fhir_connector_core::errors::{ConnectorError, ConnectorResult, FailureKind};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::credentials::{current_override, parse_scope_string, CredentialContext};
use super::discovery::{DiscoveryResolver, ResolvedEndpoints, SmartConfiguration};
use crate::config::ConnectorConfig;
use crate::utils::http_client::build_client;

const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

fn random_unreserved(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// `PKCE` (Proof Key for Code Exchange) parameters
#[derive(Clone)]
pub struct PkceParams {
    /// Randomly generated code verifier
    pub code_verifier: String,
    /// SHA256 hash of code verifier, base64url encoded without padding
    pub code_challenge: String,
    /// Challenge method (always "S256")
    pub code_challenge_method: &'static str,
}

impl PkceParams {
    /// Generate `PKCE` parameters with `S256` challenge method
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(random_unreserved(CODE_VERIFIER_LENGTH))
    }

    /// Derive the challenge for an existing verifier
    #[must_use]
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: PKCE_METHOD_S256,
        }
    }
}

impl fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .field("code_challenge_method", &self.code_challenge_method)
            .finish()
    }
}

/// One in-progress PKCE handshake
#[derive(Debug, Clone)]
pub struct AuthorizationState {
    /// Verifier and challenge pair
    pub pkce: PkceParams,
    /// Anti-forgery state nonce sent with the authorization request
    pub state: String,
    /// Redirect URI the authorization request used
    pub redirect_uri: String,
    /// Patient hint applied when the token response carries no patient
    pub patient_hint: Option<String>,
    /// User hint applied when the token response carries no user
    pub user_hint: Option<String>,
}

/// Input to [`SmartAuthClient::build_authorization_url`]
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    /// Redirect URI registered for the client
    pub redirect_uri: String,
    /// Caller supplied state nonce; generated when absent
    pub state: Option<String>,
    /// Patient expected to be in context after the exchange
    pub patient: Option<String>,
    /// User expected to be in context after the exchange
    pub user: Option<String>,
    /// EHR launch token for EHR-initiated launches
    pub launch: Option<String>,
}

impl AuthorizationRequest {
    /// Standalone launch request for a redirect URI
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    /// Use a fixed state nonce
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Carry an EHR launch token
    #[must_use]
    pub fn with_launch(mut self, launch: impl Into<String>) -> Self {
        self.launch = Some(launch.into());
        self
    }

    /// Expect a patient in context
    #[must_use]
    pub fn with_patient(mut self, patient: impl Into<String>) -> Self {
        self.patient = Some(patient.into());
        self
    }

    /// Expect a user in context
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Result of building an authorization URL
#[derive(Debug, Clone)]
pub struct AuthorizationUrl {
    /// URL to send the user agent to
    pub url: String,
    /// State nonce the callback must echo
    pub state: String,
    /// Verifier to present at the token endpoint (needed when the exchange
    /// happens in another process)
    pub code_verifier: String,
}

/// Observable phase of the authorization state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No credentials yet
    Unauthenticated,
    /// Authorization URL issued, waiting for the code
    Authorizing,
    /// Holding an access token
    Authorized,
    /// Refresh-token grant in progress
    Refreshing,
    /// Client-credentials grant in progress
    ClientCredentialsPending,
    /// Last grant attempt was rejected
    Failed,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authorizing => "authorizing",
            Self::Authorized => "authorized",
            Self::Refreshing => "refreshing",
            Self::ClientCredentialsPending => "client_credentials_pending",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Token endpoint response, including SMART launch context fields
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    patient: Option<String>,
    #[serde(default)]
    launch_patient: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    profile: Option<String>,
}

/// Token endpoint error body (RFC 6749 section 5.2)
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct AuthState {
    credentials: CredentialContext,
    phase: AuthPhase,
    pending: Option<AuthorizationState>,
}

/// SMART-on-FHIR OAuth client
///
/// One instance per server connection. It owns the HTTP session and the base
/// credential context shared by every call made through it.
pub struct SmartAuthClient {
    config: ConnectorConfig,
    http: Client,
    endpoints: ResolvedEndpoints,
    state: RwLock<AuthState>,
    renew_latch: Mutex<()>,
}

impl SmartAuthClient {
    /// Create a client from configuration and vendor presets, without discovery
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP session cannot be built
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        let http = build_client(&config.http, config.trust_env_proxy)?;
        let endpoints = ResolvedEndpoints::from_config(&config);
        Ok(Self::from_parts(config, http, endpoints))
    }

    /// Create a client and run one best-effort discovery fetch
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP session cannot be built;
    /// discovery failures are logged, not returned
    pub async fn connect(config: ConnectorConfig) -> ConnectorResult<Self> {
        let http = build_client(&config.http, config.trust_env_proxy)?;
        let endpoints = DiscoveryResolver::new(http.clone(), config.http.discovery_timeout)
            .resolve(&config)
            .await;
        Ok(Self::from_parts(config, http, endpoints))
    }

    fn from_parts(config: ConnectorConfig, http: Client, endpoints: ResolvedEndpoints) -> Self {
        let credentials = CredentialContext {
            refresh_token: config.refresh_token.clone(),
            ..CredentialContext::default()
        };
        info!(
            base_url = %config.base_url,
            vendor = %config.vendor,
            has_authorization_endpoint = endpoints.authorization_endpoint.is_some(),
            has_token_endpoint = endpoints.token_endpoint.is_some(),
            "SMART auth client ready"
        );
        Self {
            config,
            http,
            endpoints,
            state: RwLock::new(AuthState {
                credentials,
                phase: AuthPhase::Unauthenticated,
                pending: None,
            }),
            renew_latch: Mutex::new(()),
        }
    }

    /// Connector configuration
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// HTTP session shared with the resource requester
    #[must_use]
    pub const fn http_client(&self) -> &Client {
        &self.http
    }

    /// Authorization endpoint in effect
    #[must_use]
    pub fn authorization_endpoint(&self) -> Option<&str> {
        self.endpoints.authorization_endpoint.as_deref()
    }

    /// Token endpoint in effect
    #[must_use]
    pub fn token_endpoint(&self) -> Option<&str> {
        self.endpoints.token_endpoint.as_deref()
    }

    /// Scope string requested on authorization and client-credentials grants
    #[must_use]
    pub fn requested_scopes(&self) -> &str {
        &self.endpoints.scopes
    }

    /// Discovery document obtained at construction, if any
    #[must_use]
    pub const fn smart_configuration(&self) -> Option<&SmartConfiguration> {
        self.endpoints.discovered.as_ref()
    }

    /// Current phase of the authorization state machine
    pub async fn auth_phase(&self) -> AuthPhase {
        self.state.read().await.phase
    }

    /// Snapshot of the base credential context
    pub async fn credentials(&self) -> CredentialContext {
        self.state.read().await.credentials.clone()
    }

    /// Credentials in effect for the current call: the task's override if one
    /// is active, else the base context
    pub async fn effective_credentials(&self) -> CredentialContext {
        match current_override() {
            Some(context) => context,
            None => self.credentials().await,
        }
    }

    /// Install externally obtained credentials as the base context
    pub async fn set_credentials(&self, credentials: CredentialContext) {
        let mut state = self.state.write().await;
        let phase = if credentials.access_token.is_some() {
            AuthPhase::Authorized
        } else {
            AuthPhase::Unauthenticated
        };
        state.credentials = credentials;
        Self::transition(&mut state, phase);
    }

    /// Drop the base credentials and any pending handshake
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        state.credentials = CredentialContext::default();
        state.pending = None;
        Self::transition(&mut state, AuthPhase::Unauthenticated);
    }

    fn transition(state: &mut AuthState, next: AuthPhase) {
        if state.phase != next {
            debug!(from = %state.phase, to = %next, "Auth phase transition");
            state.phase = next;
        }
    }

    async fn set_phase(&self, next: AuthPhase) {
        Self::transition(&mut *self.state.write().await, next);
    }

    /// Build a PKCE authorization URL and remember the pending handshake
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no authorization endpoint or client
    /// id is configured, or the endpoint is not a valid URL
    pub async fn build_authorization_url(
        &self,
        request: AuthorizationRequest,
    ) -> ConnectorResult<AuthorizationUrl> {
        let endpoint = self.authorization_endpoint().ok_or_else(|| {
            ConnectorError::config("No authorization endpoint configured or discovered")
        })?;
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or_else(|| ConnectorError::config("Client id is required for authorization"))?;

        let mut url = Url::parse(endpoint)
            .map_err(|e| ConnectorError::config(format!("Invalid authorization endpoint: {e}")))?;
        let pkce = PkceParams::generate();
        let state_nonce = request
            .state
            .clone()
            .unwrap_or_else(|| random_unreserved(STATE_NONCE_LENGTH));

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", &request.redirect_uri)
                .append_pair("scope", self.requested_scopes())
                .append_pair("state", &state_nonce)
                .append_pair("aud", &self.config.audience())
                .append_pair("code_challenge", &pkce.code_challenge)
                .append_pair("code_challenge_method", pkce.code_challenge_method);
            if let Some(launch) = &request.launch {
                query.append_pair("launch", launch);
            }
        }

        let result = AuthorizationUrl {
            url: url.to_string(),
            state: state_nonce.clone(),
            code_verifier: pkce.code_verifier.clone(),
        };

        let mut state = self.state.write().await;
        state.pending = Some(AuthorizationState {
            pkce,
            state: state_nonce,
            redirect_uri: request.redirect_uri,
            patient_hint: request.patient,
            user_hint: request.user,
        });
        Self::transition(&mut state, AuthPhase::Authorizing);
        drop(state);

        info!(launch = request.launch.is_some(), "Built SMART authorization URL");
        Ok(result)
    }

    /// Exchange an authorization code after checking the callback's state nonce
    ///
    /// # Errors
    ///
    /// Returns a permission error when no handshake is pending or the state
    /// does not match, plus every error of [`Self::complete_authorization`]
    pub async fn complete_authorization_with_state(
        &self,
        code: &str,
        redirect_uri: &str,
        state: &str,
    ) -> ConnectorResult<CredentialContext> {
        let matches = self
            .state
            .read()
            .await
            .pending
            .as_ref()
            .is_some_and(|pending| pending.state == state);
        if !matches {
            warn!("Authorization callback state does not match the pending request");
            return Err(ConnectorError::permission(
                "Authorization state mismatch; restart the authorization flow",
            ));
        }
        self.complete_authorization(code, redirect_uri, None).await
    }

    /// Exchange an authorization code for tokens using PKCE
    ///
    /// Without an explicit `verifier`, the pending handshake's verifier is used.
    /// The pending handshake is consumed either way.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no token endpoint or verifier is
    /// available, and a permission error when the token endpoint rejects the code
    #[instrument(skip(self, code, verifier))]
    pub async fn complete_authorization(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: Option<&str>,
    ) -> ConnectorResult<CredentialContext> {
        let token_url = self.require_token_endpoint()?;
        let pending = self.state.write().await.pending.take();

        let code_verifier = match (verifier, pending.as_ref()) {
            (Some(explicit), _) => explicit.to_owned(),
            (None, Some(pending)) => pending.pkce.code_verifier.clone(),
            (None, None) => {
                return Err(ConnectorError::config(
                    "No PKCE verifier supplied and no authorization is pending",
                ))
            }
        };

        let mut form = vec![
            ("grant_type", GRANT_AUTHORIZATION_CODE.to_owned()),
            ("code", code.to_owned()),
            ("redirect_uri", redirect_uri.to_owned()),
            ("code_verifier", code_verifier),
        ];
        self.append_client_auth(&mut form);

        let response = self.post_token(token_url, GRANT_AUTHORIZATION_CODE, &form).await?;
        let (patient_hint, user_hint) = pending
            .map(|p| (p.patient_hint, p.user_hint))
            .unwrap_or_default();

        let mut state = self.state.write().await;
        Self::apply_token_response(
            &mut state.credentials,
            response,
            self.requested_scopes(),
            patient_hint,
            user_hint,
        );
        Self::transition(&mut state, AuthPhase::Authorized);
        let credentials = state.credentials.clone();
        drop(state);

        info!(
            patient_in_context = credentials.patient_id.is_some(),
            scopes = credentials.scopes.len(),
            "Authorization code exchanged"
        );
        Ok(credentials)
    }

    /// Make sure a usable access token exists, renewing it when needed
    ///
    /// Under a credential override only the override's token is checked; the
    /// base context is never renewed on an override's behalf.
    ///
    /// # Errors
    ///
    /// Returns a permission error when no token exists and none can be obtained
    pub async fn ensure_valid_token(&self) -> ConnectorResult<()> {
        if let Some(context) = current_override() {
            return if context.has_valid_token() {
                Ok(())
            } else {
                Err(ConnectorError::permission(
                    "Credential override has no valid access token",
                ))
            };
        }

        let credentials = self.credentials().await;
        if credentials.has_valid_token() {
            return Ok(());
        }
        self.renew(credentials.access_token.as_deref()).await
    }

    /// Renew the base token after the server rejected `rejected_token`
    ///
    /// Callers that lose the race to another renewal reuse its result.
    ///
    /// # Errors
    ///
    /// Returns a permission error when renewal is impossible or rejected
    pub async fn renew_after_rejection(&self, rejected_token: &str) -> ConnectorResult<()> {
        self.renew(Some(rejected_token)).await
    }

    async fn renew(&self, stale_token: Option<&str>) -> ConnectorResult<()> {
        let _latch = self.renew_latch.lock().await;

        let current = self.credentials().await;
        if current.has_valid_token() && current.access_token.as_deref() != stale_token {
            debug!("Token already renewed by a concurrent caller");
            return Ok(());
        }

        if current.refresh_token.is_some() && self.token_endpoint().is_some() {
            self.refresh_locked().await
        } else if self.config.client_id.is_some() && self.token_endpoint().is_some() {
            self.client_credentials_locked().await
        } else {
            self.set_phase(AuthPhase::Failed).await;
            Err(ConnectorError::permission(
                "No valid access token and no refresh token or client credentials to obtain one",
            ))
        }
    }

    /// Renew the access token with the refresh-token grant
    ///
    /// # Errors
    ///
    /// Returns a configuration error without a token endpoint, and a permission
    /// error without a refresh token or when the grant is rejected
    pub async fn refresh(&self) -> ConnectorResult<()> {
        let _latch = self.renew_latch.lock().await;
        self.refresh_locked().await
    }

    #[instrument(skip(self))]
    async fn refresh_locked(&self) -> ConnectorResult<()> {
        let token_url = self.require_token_endpoint()?;
        let refresh_token = self
            .credentials()
            .await
            .refresh_token
            .ok_or_else(|| ConnectorError::permission("No refresh token available"))?;

        self.set_phase(AuthPhase::Refreshing).await;
        let mut form = vec![
            ("grant_type", GRANT_REFRESH_TOKEN.to_owned()),
            ("refresh_token", refresh_token),
        ];
        self.append_client_auth(&mut form);

        let response = match self.post_token(token_url, GRANT_REFRESH_TOKEN, &form).await {
            Ok(response) => response,
            Err(e) => {
                self.set_phase(AuthPhase::Failed).await;
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        Self::apply_token_response(
            &mut state.credentials,
            response,
            self.requested_scopes(),
            None,
            None,
        );
        Self::transition(&mut state, AuthPhase::Authorized);
        drop(state);
        info!("Access token refreshed");
        Ok(())
    }

    /// Obtain a token with the client-credentials grant
    ///
    /// # Errors
    ///
    /// Returns a configuration error without a token endpoint or client id, and
    /// a permission error when the grant is rejected
    pub async fn request_client_credentials_token(&self) -> ConnectorResult<()> {
        let _latch = self.renew_latch.lock().await;
        self.client_credentials_locked().await
    }

    #[instrument(skip(self))]
    async fn client_credentials_locked(&self) -> ConnectorResult<()> {
        let token_url = self.require_token_endpoint()?;
        if self.config.client_id.is_none() {
            return Err(ConnectorError::config(
                "Client id is required for the client-credentials grant",
            ));
        }

        self.set_phase(AuthPhase::ClientCredentialsPending).await;
        let mut form = vec![
            ("grant_type", GRANT_CLIENT_CREDENTIALS.to_owned()),
            ("scope", self.requested_scopes().to_owned()),
        ];
        self.append_client_auth(&mut form);

        let response = match self.post_token(token_url, GRANT_CLIENT_CREDENTIALS, &form).await {
            Ok(response) => response,
            Err(e) => {
                self.set_phase(AuthPhase::Failed).await;
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        Self::apply_token_response(
            &mut state.credentials,
            response,
            self.requested_scopes(),
            None,
            None,
        );
        Self::transition(&mut state, AuthPhase::Authorized);
        drop(state);
        info!("Obtained access token with client credentials");
        Ok(())
    }

    fn require_token_endpoint(&self) -> ConnectorResult<&str> {
        self.token_endpoint()
            .ok_or_else(|| ConnectorError::config("No token endpoint configured or discovered"))
    }

    fn append_client_auth(&self, form: &mut Vec<(&'static str, String)>) {
        if let Some(client_id) = &self.config.client_id {
            form.push(("client_id", client_id.clone()));
        }
        if let Some(client_secret) = &self.config.client_secret {
            form.push(("client_secret", client_secret.clone()));
        }
    }

    async fn post_token(
        &self,
        token_url: &str,
        grant: &str,
        form: &[(&'static str, String)],
    ) -> ConnectorResult<TokenResponse> {
        let response = self
            .http
            .post(token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ConnectorError::RequestFailed {
                kind: FailureKind::RequestFailed,
                status_code: None,
                correlation_id: format!("token:{grant}"),
                attempts: 1,
                message: format!("Token endpoint unreachable: {e}"),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            warn!(grant, status = status.as_u16(), "Token endpoint rejected grant");
            return Err(ConnectorError::permission_with_status(
                format!("Token endpoint rejected {grant} grant: {reason}"),
                status.as_u16(),
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ConnectorError::parse(format!("Invalid token response: {e}")))
    }

    fn apply_token_response(
        credentials: &mut CredentialContext,
        response: TokenResponse,
        requested_scopes: &str,
        patient_hint: Option<String>,
        user_hint: Option<String>,
    ) {
        credentials.access_token = Some(response.access_token);
        if let Some(refresh_token) = response.refresh_token {
            credentials.refresh_token = Some(refresh_token);
        }
        credentials.scopes =
            parse_scope_string(response.scope.as_deref().unwrap_or(requested_scopes));
        credentials.expires_at = response
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        if let Some(patient) = response
            .patient
            .or(response.launch_patient)
            .or(patient_hint)
        {
            credentials.patient_id = Some(patient);
        }
        if let Some(user) = response
            .user
            .or(response.username)
            .or(response.profile)
            .or(user_hint)
        {
            credentials.user_id = Some(user);
        }
    }
}

impl fmt::Debug for SmartAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartAuthClient")
            .field("base_url", &self.config.base_url)
            .field("vendor", &self.config.vendor)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_is_s256_of_verifier() {
        // BASE64URL(SHA256(verifier)) without padding, computed out of band
        let pkce =
            PkceParams::from_verifier("dBjftJeZ4CVP-mJ92K9EePtnnqVMy2p1QcbgH4rSIfM".to_owned());
        assert_eq!(pkce.code_challenge, "IRmfMJLwBAa6imVTJlLMVeNL2Qhxb-8z0N3VKJQ4aec");
        assert_eq!(pkce.code_challenge_method, "S256");
    }

    #[test]
    fn test_generated_verifier_shape() {
        let pkce = PkceParams::generate();
        assert_eq!(pkce.code_verifier.len(), CODE_VERIFIER_LENGTH);
        assert!(pkce.code_verifier.bytes().all(|b| UNRESERVED.contains(&b)));
        assert!(!pkce.code_challenge.contains('='));
    }

    #[test]
    fn test_token_response_context_precedence() {
        let mut credentials = CredentialContext::default().with_user("existing-user");
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "expires_in": 3600,
            "launch_patient": "p-launch",
            "profile": "Practitioner/7"
        }))
        .unwrap();

        SmartAuthClient::apply_token_response(&mut credentials, response, "a b", None, None);
        assert_eq!(credentials.patient_id.as_deref(), Some("p-launch"));
        assert_eq!(credentials.user_id.as_deref(), Some("Practitioner/7"));
        assert_eq!(credentials.scope_string(), "a b");
        assert!(credentials.expires_at.is_some());
    }

    #[test]
    fn test_absent_context_keeps_existing_values() {
        let mut credentials = CredentialContext::default()
            .with_patient("p0")
            .with_refresh_token("r0");
        let response: TokenResponse =
            serde_json::from_value(serde_json::json!({ "access_token": "tok", "scope": "x" }))
                .unwrap();

        SmartAuthClient::apply_token_response(&mut credentials, response, "ignored", None, None);
        assert_eq!(credentials.patient_id.as_deref(), Some("p0"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("r0"));
        assert!(credentials.expires_at.is_none());
    }
}
