// ABOUTME: Assembled patient record combining the primary patient and four collections
// ABOUTME: Produced by the record service and stored in the patient cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resources::{Condition, Encounter, MedicationRequest, Observation, Patient};

/// A patient's normalized clinical record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientBundle {
    /// Primary patient record
    pub patient: Patient,
    /// Problem list
    pub conditions: Vec<Condition>,
    /// Medication orders
    pub medications: Vec<MedicationRequest>,
    /// Observations
    pub observations: Vec<Observation>,
    /// Encounters
    pub encounters: Vec<Encounter>,
    /// When the bundle was assembled
    pub fetched_at: DateTime<Utc>,
}

impl PatientBundle {
    /// Total number of collection entries (patient excluded)
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.conditions.len()
            + self.medications.len()
            + self.observations.len()
            + self.encounters.len()
    }
}
