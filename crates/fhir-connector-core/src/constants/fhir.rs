// ABOUTME: FHIR query and bundle constants used by the resource fetchers
// ABOUTME: Page sizes, pagination guards, media types, and search parameter names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// FHIR JSON media type
pub const FHIR_JSON: &str = "application/fhir+json";

/// Default `_count` requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages followed in one walk
pub const DEFAULT_MAX_PAGES: usize = 1_000;

/// Bundle link relation that continues a search
pub const NEXT_RELATION: &str = "next";

/// Well-known SMART configuration path relative to the server base
pub const SMART_CONFIGURATION_PATH: &str = ".well-known/smart-configuration";

/// Search parameter selecting the subject patient
pub const PARAM_PATIENT: &str = "patient";

/// Search parameter for page size
pub const PARAM_COUNT: &str = "_count";

/// Search parameter for result ordering
pub const PARAM_SORT: &str = "_sort";
