//! Clinical assessment of readings by an external inference service.

pub mod client;
pub mod markup;
pub mod models;
pub mod prompt;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::{Assessment, Reading};

pub use client::{parse_completion, InferenceClient};
pub use markup::strip_reasoning;

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("inference request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("inference endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected inference response: {0}")]
    ResponseShape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentFailureKind {
    /// Transport error, timeout or non-2xx status.
    Network,
    /// Body missing the message content or not parseable.
    ResponseShape,
}

impl AssessmentError {
    pub fn kind(&self) -> AssessmentFailureKind {
        match self {
            AssessmentError::Network(_) | AssessmentError::Status { .. } => {
                AssessmentFailureKind::Network
            }
            AssessmentError::ResponseShape(_) => AssessmentFailureKind::ResponseShape,
        }
    }
}

#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(&self, reading: &Reading) -> Result<Assessment, AssessmentError>;
}
