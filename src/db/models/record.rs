//! Stored record data model.
//!
//! One row of `patient_data`: a reading plus the assessment it was annotated with.

use serde::{Deserialize, Serialize};

use crate::models::{Assessment, Reading};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub reading: Reading,
    pub assessment: Assessment,
}
