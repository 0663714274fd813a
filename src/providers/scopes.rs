// ABOUTME: SMART scope matching used by the requester's preflight check
// ABOUTME: Accepts v1 read/* actions and v2 permission strings in patient, user, and system contexts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Scope matching
//!
//! Scopes have the form `context/ResourceType.action`. Matching is
//! case-insensitive. A scope lets the connector read a resource type when its
//! context is `patient`, `user` or `system`, its resource is the type or `*`,
//! and its action is `read`, `*`, or a SMART v2 permission string containing
//! `r` or `s` (`r`, `rs`, `cruds`, ...). A v2 search filter (`?category=...`)
//! is ignored for preflight purposes.

use std::collections::BTreeSet;

use fhir_connector_core::ResourceKind;

const V2_PERMISSIONS: &str = "cruds";

/// Launch context a resource scope applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeContext {
    /// Data about the patient in context
    Patient,
    /// Data the user can access
    User,
    /// Backend service access
    System,
}

/// A parsed resource scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    /// Scope context
    pub context: ScopeContext,
    /// Lowercased resource type, or `*`
    pub resource: String,
    /// Whether the action permits reading or searching
    pub read: bool,
}

impl ResourceScope {
    /// Parse a resource scope; `None` for non-resource scopes (`openid`, `launch/patient`, ...)
    #[must_use]
    pub fn parse(scope: &str) -> Option<Self> {
        let lowered = scope.trim().to_lowercase();
        let (context, rest) = lowered.split_once('/')?;
        let context = match context {
            "patient" => ScopeContext::Patient,
            "user" => ScopeContext::User,
            "system" => ScopeContext::System,
            _ => return None,
        };
        let rest = rest.split('?').next().unwrap_or_default();
        let (resource, action) = rest.rsplit_once('.')?;
        if resource.is_empty() || action.is_empty() {
            return None;
        }

        Some(Self {
            context,
            resource: resource.to_owned(),
            read: action_permits_read(action),
        })
    }

    /// Whether this scope allows reading `resource_type`
    #[must_use]
    pub fn grants_read(&self, resource_type: &str) -> bool {
        self.read && (self.resource == "*" || self.resource.eq_ignore_ascii_case(resource_type))
    }
}

fn action_permits_read(action: &str) -> bool {
    match action {
        "read" | "*" => true,
        v2 if v2.chars().all(|c| V2_PERMISSIONS.contains(c)) => {
            v2.contains('r') || v2.contains('s')
        }
        _ => false,
    }
}

/// Whether any granted scope allows reading `resource_type`
#[must_use]
pub fn grants_read(granted: &BTreeSet<String>, resource_type: &str) -> bool {
    granted
        .iter()
        .filter_map(|scope| ResourceScope::parse(scope))
        .any(|scope| scope.grants_read(resource_type))
}

/// Resource kinds among `kinds` that the granted scopes do not cover
#[must_use]
pub fn missing_read_access(granted: &BTreeSet<String>, kinds: &[ResourceKind]) -> Vec<ResourceKind> {
    kinds
        .iter()
        .copied()
        .filter(|kind| !grants_read(granted, kind.resource_type()))
        .collect()
}
