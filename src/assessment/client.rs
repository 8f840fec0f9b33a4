//! HTTP client for the local inference service.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::{
    log_info, log_warn,
    models::{Assessment, Reading},
    settings::InferenceSettings,
    utils::LogContext,
};

use super::{
    markup::strip_reasoning,
    models::{ChatCompletionRequest, ChatCompletionResponse},
    prompt::build_messages,
    AssessmentError, Assessor,
};

/// Single-shot client: one request per call, no retry.
pub struct InferenceClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    system_prompt: String,
    log: LogContext,
}

impl InferenceClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &InferenceSettings, log: LogContext) -> Result<Self> {
        Self::with_timeout(
            settings,
            Duration::from_secs(settings.request_timeout_secs),
            log,
        )
    }

    pub fn with_timeout(
        settings: &InferenceSettings,
        timeout: Duration,
        log: LogContext,
    ) -> Result<Self> {
        // The endpoint is always local; never route it through a system proxy.
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            system_prompt: settings.system_prompt.clone(),
            log,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_assessment(&self, reading: &Reading) -> Result<Assessment, AssessmentError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, reading),
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssessmentError::Status { status, body });
        }

        let body = response.text().await?;
        let content = parse_completion(&body)?;
        let text = strip_reasoning(&content);
        if text.is_empty() {
            return Err(AssessmentError::ResponseShape(
                "assessment is empty after removing reasoning".into(),
            ));
        }

        Ok(Assessment::new(text))
    }
}

#[async_trait]
impl Assessor for InferenceClient {
    async fn assess(&self, reading: &Reading) -> Result<Assessment, AssessmentError> {
        match self.request_assessment(reading).await {
            Ok(assessment) => {
                log_info!(
                    self.log,
                    "assessment received for {} ({} chars)",
                    reading.patient_id,
                    assessment.text.len()
                );
                Ok(assessment)
            }
            Err(err) => {
                log_warn!(self.log, "assessment for {} failed: {err}", reading.patient_id);
                Err(err)
            }
        }
    }
}

/// Extracts `choices[0].message.content` from a completion body.
pub fn parse_completion(body: &str) -> Result<String, AssessmentError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| AssessmentError::ResponseShape(format!("invalid JSON: {err}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AssessmentError::ResponseShape("no choices in response".into()))?
        .message
        .content
        .ok_or_else(|| AssessmentError::ResponseShape("choice has no message content".into()))
}
