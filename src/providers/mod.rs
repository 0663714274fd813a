// ABOUTME: FHIR server access layer: resilient requests, pagination, scopes and vendor dialects
// ABOUTME: Turns raw vendor JSON into the canonical clinical models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Per-vendor reading rules
pub mod dialects;
/// Raw resource to canonical model conversion
pub mod normalizer;
/// Bundle link following
pub mod pagination;
/// Authenticated requests with retry and renewal
pub mod requester;
/// SMART scope grammar
pub mod scopes;

pub use dialects::{dialect_for, MedicationName, VendorDialect};
pub use normalizer::{FhirResource, ResourceNormalizer};
pub use pagination::{resolve_link, resource_url, ResourceFetcher};
pub use requester::{RequestSpec, ResilientRequester};
pub use scopes::{grants_read, missing_read_access, ResourceScope, ScopeContext};
