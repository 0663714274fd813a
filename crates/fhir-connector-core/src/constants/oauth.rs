// ABOUTME: OAuth and SMART-on-FHIR constants with vendor endpoint presets
// ABOUTME: Grant types, PKCE parameters, default scopes, and Epic/Cerner sandbox URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Scopes requested when neither configuration nor discovery provides any
pub const DEFAULT_SCOPES: &str = "launch/patient openid fhirUser offline_access patient/*.read";

/// `grant_type` for the authorization-code exchange
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// `grant_type` for refresh-token renewal
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// `grant_type` for the client-credentials fallback
pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

/// PKCE challenge method
pub const PKCE_METHOD_S256: &str = "S256";

/// Length of generated PKCE code verifiers (RFC 7636 allows 43-128)
pub const CODE_VERIFIER_LENGTH: usize = 128;

/// Length of generated anti-forgery state nonces
pub const STATE_NONCE_LENGTH: usize = 32;

/// Epic vendor identifier
pub const VENDOR_EPIC: &str = "epic";

/// Cerner (Oracle Health) vendor identifier
pub const VENDOR_CERNER: &str = "cerner";

/// Generic SMART server identifier
pub const VENDOR_GENERIC: &str = "generic";

/// Epic sandbox endpoints
pub mod epic {
    /// FHIR R4 base URL
    pub const BASE_URL: &str = "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4";
    /// Authorization endpoint
    pub const AUTH_URL: &str = "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/authorize";
    /// Token endpoint
    pub const TOKEN_URL: &str = "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/token";
    /// Markers identifying Epic-only extensions
    pub const EXTENSION_MARKERS: &[&str] = &["epic.com"];
}

/// Cerner (Oracle Health) sandbox endpoints
pub mod cerner {
    /// FHIR R4 base URL
    pub const BASE_URL: &str =
        "https://fhir-myrecord.cerner.com/r4/ec2458f2-1e24-41c8-b71b-0e701af7583d";
    /// Authorization endpoint
    pub const AUTH_URL: &str = "https://authorization.cerner.com/tenants/ec2458f2-1e24-41c8-b71b-0e701af7583d/protocols/oauth2/profiles/smart-v1/personas/patient/authorize";
    /// Token endpoint
    pub const TOKEN_URL: &str = "https://authorization.cerner.com/tenants/ec2458f2-1e24-41c8-b71b-0e701af7583d/hosts/fhir-myrecord.cerner.com/protocols/oauth2/profiles/smart-v1/token";
    /// Markers identifying Cerner-only extensions
    pub const EXTENSION_MARKERS: &[&str] = &["cerner.com", "oracle.com"];
}
