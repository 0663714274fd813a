// ABOUTME: SMART-on-FHIR OAuth client for connecting to remote health record servers
// ABOUTME: Credential context, discovery, PKCE authorization, and token renewal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth 2.0 Client Module
//!
//! The connector acts as a SMART-on-FHIR client of the record server:
//! - Authorization-code flow with PKCE
//! - Refresh-token renewal and client-credentials fallback
//! - Per-call credential overrides that stay within one call tree
//! - Best-effort discovery of endpoints from `.well-known/smart-configuration`

/// SMART authorization state machine
pub mod client;
/// Credential context and task-scoped override
pub mod credentials;
/// SMART configuration discovery
pub mod discovery;

pub use client::{
    AuthPhase, AuthorizationRequest, AuthorizationState, AuthorizationUrl, PkceParams,
    SmartAuthClient,
};
pub use credentials::{
    current_override, override_active, parse_scope_string, with_credential_override,
    CredentialContext,
};
pub use discovery::{DiscoveryResolver, ResolvedEndpoints, SmartConfiguration};
