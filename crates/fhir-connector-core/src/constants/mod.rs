// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for vendors, OAuth, FHIR queries, cache, and retry defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single large file.

/// Cache-related constants (TTL, capacity, cleanup)
pub mod cache;
/// FHIR query and bundle constants
pub mod fhir;
/// OAuth / SMART-on-FHIR constants and vendor presets
pub mod oauth;
/// Retry and HTTP timeout defaults
pub mod retry;
