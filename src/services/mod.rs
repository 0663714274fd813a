// ABOUTME: Service layer exposing the connector to orchestration collaborators
// ABOUTME: Hosts the patient record facade and its configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Service layer
//!
//! Collaborators that decide what to analyze only talk to
//! [`PatientRecordService`]; everything below it (auth, retries, pagination,
//! normalization, caching) is an implementation detail.

/// Patient record assembly, caching and audit write path
pub mod patient_records;

pub use patient_records::{PatientRecordService, RecordServiceConfig};
