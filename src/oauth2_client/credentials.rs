// ABOUTME: Credential context holding the active token, granted scopes, and launch context
// ABOUTME: Task-scoped override lets one call tree use different credentials than its client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Credential context and per-call override
//!
//! A client keeps one base [`CredentialContext`]. A caller that needs to act
//! with different credentials (for example on behalf of another patient)
//! wraps its future in [`with_credential_override`]. The override is stored
//! in a tokio task-local, so it is visible to that future and to everything it
//! awaits, including `tokio::join!` fan-outs, but not to other tasks running
//! on the same client. Leaving the scope restores whatever was there before,
//! whether the inner future succeeds, fails, or is dropped.
//!
//! Work moved onto a new task with `tokio::spawn` does not inherit the
//! override; wrap the spawned future again if it needs one.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};

tokio::task_local! {
    static CREDENTIAL_OVERRIDE: CredentialContext;
}

/// Active authorization state for one client or one overridden call
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialContext {
    /// Bearer token sent on resource calls
    pub access_token: Option<String>,
    /// Refresh token used to renew the access token
    pub refresh_token: Option<String>,
    /// Scopes granted alongside the access token
    pub scopes: BTreeSet<String>,
    /// Patient in context (SMART `patient` launch parameter)
    pub patient_id: Option<String>,
    /// User in context (`user`, `username` or `profile` claim)
    pub user_id: Option<String>,
    /// Expiry instant of the access token, if the server reported one
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialContext {
    /// Context carrying only an access token
    #[must_use]
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    /// Replace the granted scope set with the scopes of a space-separated string
    #[must_use]
    pub fn with_scopes(mut self, scope_string: &str) -> Self {
        self.scopes = parse_scope_string(scope_string);
        self
    }

    /// Set the patient in context
    #[must_use]
    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    /// Set the user in context
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the token expiry instant
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Whether the access token is past its known expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// A token exists and either has no known expiry or has not yet expired
    #[must_use]
    pub fn has_valid_token(&self) -> bool {
        self.access_token.is_some() && !self.is_expired()
    }

    /// Granted scopes as a space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("patient_id", &self.patient_id)
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Split a space-separated scope string into a set
#[must_use]
pub fn parse_scope_string(scope_string: &str) -> BTreeSet<String> {
    scope_string.split_whitespace().map(str::to_owned).collect()
}

/// Run `future` with `context` as the effective credentials of every client
/// call it makes
///
/// Nested overrides shadow outer ones for their own extent.
pub async fn with_credential_override<F>(context: CredentialContext, future: F) -> F::Output
where
    F: Future,
{
    CREDENTIAL_OVERRIDE.scope(context, future).await
}

/// The override installed by the innermost enclosing
/// [`with_credential_override`], if any
#[must_use]
pub fn current_override() -> Option<CredentialContext> {
    CREDENTIAL_OVERRIDE.try_with(Clone::clone).ok()
}

/// Whether the current task runs under a credential override
#[must_use]
pub fn override_active() -> bool {
    CREDENTIAL_OVERRIDE.try_with(|_| ()).is_ok()
}
