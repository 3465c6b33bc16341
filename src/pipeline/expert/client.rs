use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{info, Instrument};

use super::types::ExpertResponse;
use super::RemoteUnavailable;
use crate::config::{ConfigError, ScanConfig};
use crate::pipeline::capture::CaptureArtifact;
use crate::pipeline::screening::LabelSet;
use crate::pipeline::types::{InferenceResult, SourceModel};

/// Hosted classifier consulted for capture events.
#[async_trait]
pub trait ExpertClient: Send + Sync {
    async fn predict_expert(
        &self,
        artifact: &CaptureArtifact,
    ) -> Result<InferenceResult, RemoteUnavailable>;
}

/// Multipart HTTP client for the expert endpoint.
pub struct HttpExpertClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    field_name: String,
    labels: LabelSet,
}

impl HttpExpertClient {
    pub fn new(
        url: &str,
        timeout: Duration,
        field_name: &str,
        labels: LabelSet,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
            timeout,
            field_name: field_name.to_string(),
            labels,
        })
    }

    pub fn from_config(config: &ScanConfig, labels: LabelSet) -> Result<Self, ConfigError> {
        Self::new(
            &config.expert_url,
            config.expert_timeout(),
            &config.expert_field_name,
            labels,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_send_error(&self, e: reqwest::Error) -> RemoteUnavailable {
        if e.is_timeout() {
            RemoteUnavailable::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            RemoteUnavailable::Connection(self.url.clone())
        } else {
            RemoteUnavailable::Connection(e.to_string())
        }
    }

    /// Check the body against the label set and the confidence range.
    fn interpret(&self, body: ExpertResponse) -> Result<InferenceResult, RemoteUnavailable> {
        if !body.confidence.is_finite() || !(0.0..=1.0).contains(&body.confidence) {
            return Err(RemoteUnavailable::InvalidConfidence(body.confidence));
        }
        let label = self
            .labels
            .resolve(&body.class_name)
            .ok_or_else(|| RemoteUnavailable::UnknownLabel(body.class_name.clone()))?;

        Ok(InferenceResult::new(
            label.clone(),
            body.confidence as f32,
            SourceModel::ExpertServer,
        ))
    }

    async fn post(&self, artifact: &CaptureArtifact) -> Result<InferenceResult, RemoteUnavailable> {
        let part = Part::bytes(artifact.bytes().to_vec())
            .file_name(artifact.file_name().to_string())
            .mime_str(artifact.mime())
            .map_err(|e| RemoteUnavailable::Connection(format!("invalid image MIME type: {e}")))?;
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteUnavailable::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExpertResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteUnavailable::Timeout(self.timeout.as_secs())
            } else {
                RemoteUnavailable::MalformedResponse(e.to_string())
            }
        })?;

        self.interpret(parsed)
    }
}

#[async_trait]
impl ExpertClient for HttpExpertClient {
    async fn predict_expert(
        &self,
        artifact: &CaptureArtifact,
    ) -> Result<InferenceResult, RemoteUnavailable> {
        let span = tracing::info_span!("expert_predict", id = %artifact.id(), url = %self.url);
        async {
            let result = self.post(artifact).await?;
            info!(
                label = %result.label,
                confidence = result.confidence,
                "Expert prediction received"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
