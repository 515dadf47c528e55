//! HTTP client for the external classification service.
//!
//! POSTs `{clusterThreshold, items}` as JSON and parses `{items}` back.
//! Timeouts, non-2xx responses and malformed JSON are all fatal
//! [`CoreError::ExternalService`] failures; the caller decides whether to
//! retry the whole batch.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ClassifierConfig;
use crate::error::{CoreError, CoreResult};

use super::{ArchetypeClassifier, ClassifyItem, ClassifyRequest, ClassifyResponse, ExternalAnnotation};

/// How much of an error body is kept in the error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Production classifier over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl HttpClassifier {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: ClassifierConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl ArchetypeClassifier for HttpClassifier {
    async fn classify(&self, items: &[ClassifyItem]) -> CoreResult<Vec<ExternalAnnotation>> {
        let request = ClassifyRequest {
            cluster_threshold: self.config.cluster_threshold,
            items,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(ERROR_BODY_LIMIT);
            return Err(CoreError::ExternalService {
                status: Some(status.as_u16()),
                message: format!("classifier returned non-success: {}", body),
            });
        }

        let parsed: ClassifyResponse = response.json().await.map_err(|e| {
            CoreError::ExternalService {
                status: Some(status.as_u16()),
                message: format!("malformed classifier response: {}", e),
            }
        })?;

        tracing::debug!(
            requested = items.len(),
            annotated = parsed.items.len(),
            "classifier batch complete"
        );
        Ok(parsed.items)
    }
}
