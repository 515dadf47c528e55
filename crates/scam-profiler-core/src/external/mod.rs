//! External classification service interface.
//!
//! The archetype classifier is a third-party black box reached over the
//! network; the pipeline only depends on the [`ArchetypeClassifier`] seam
//! so tests can inject a mock. Requests are chunked into fixed-size
//! batches issued one at a time; any batch failure aborts the run, since
//! consensus needs complete external coverage to be meaningful.
//!
//! Merging is by record `id`, never by position: the service may reorder
//! or drop items, and a missing annotation yields null external fields,
//! not a failure.

pub mod client;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

pub use client::HttpClassifier;

/// One item of a classification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyItem {
    pub id: String,
    pub subject: String,
    pub text: String,
}

/// Wire request: `{clusterThreshold, items}`.
#[derive(Debug, Serialize)]
pub struct ClassifyRequest<'a> {
    #[serde(rename = "clusterThreshold")]
    pub cluster_threshold: f64,
    pub items: &'a [ClassifyItem],
}

/// One annotation from the service.
///
/// Every field except `id` is optional; unknown extra fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAnnotation {
    pub id: String,
    #[serde(default)]
    pub archetype: Option<String>,
    #[serde(default)]
    pub is_scam: Option<bool>,
    #[serde(default)]
    pub scam_confidence: Option<f64>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub cluster: Option<i64>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub indicators: Option<Vec<String>>,
}

/// Wire response: `{items}`.
#[derive(Debug, Default, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default)]
    pub items: Vec<ExternalAnnotation>,
}

/// The classification seam. Production uses [`HttpClassifier`]; tests
/// inject mocks.
#[async_trait]
pub trait ArchetypeClassifier: Send + Sync {
    /// Classify one batch of items.
    async fn classify(&self, items: &[ClassifyItem]) -> CoreResult<Vec<ExternalAnnotation>>;
}

/// Drive the classifier over a full record set in sequential chunks and
/// merge annotations by id.
///
/// A failing chunk aborts the whole call; ids the service did not answer
/// for are simply absent from the returned map.
pub async fn annotate_all(
    classifier: &dyn ArchetypeClassifier,
    items: &[ClassifyItem],
    batch_size: usize,
) -> CoreResult<HashMap<String, ExternalAnnotation>> {
    let mut merged: HashMap<String, ExternalAnnotation> = HashMap::with_capacity(items.len());
    let n_batches = items.len().div_ceil(batch_size.max(1));

    for (batch_index, chunk) in items.chunks(batch_size.max(1)).enumerate() {
        tracing::info!(
            batch = batch_index + 1,
            total = n_batches,
            size = chunk.len(),
            "classifying batch"
        );
        let annotations = classifier.classify(chunk).await.map_err(|e| {
            tracing::error!(
                batch = batch_index + 1,
                total = n_batches,
                error = %e,
                "external classification failed, aborting run"
            );
            e
        })?;
        for annotation in annotations {
            merged.insert(annotation.id.clone(), annotation);
        }
    }

    let missing = items
        .iter()
        .filter(|item| !merged.contains_key(&item.id))
        .count();
    if missing > 0 {
        tracing::warn!(missing, "service returned no annotation for some ids");
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    /// Mock that answers every item, in reverse order, with archetype
    /// derived from the id. Optionally drops one id entirely.
    struct ReversingClassifier {
        drop_id: Option<String>,
        calls: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ArchetypeClassifier for ReversingClassifier {
        async fn classify(&self, items: &[ClassifyItem]) -> CoreResult<Vec<ExternalAnnotation>> {
            self.calls.lock().unwrap().push(items.len());
            Ok(items
                .iter()
                .rev()
                .filter(|item| Some(&item.id) != self.drop_id.as_ref())
                .map(|item| ExternalAnnotation {
                    id: item.id.clone(),
                    archetype: Some(format!("arch-{}", item.id)),
                    ..Default::default()
                })
                .collect())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ArchetypeClassifier for FailingClassifier {
        async fn classify(&self, _items: &[ClassifyItem]) -> CoreResult<Vec<ExternalAnnotation>> {
            Err(CoreError::ExternalService {
                status: Some(500),
                message: "boom".into(),
            })
        }
    }

    fn items(n: usize) -> Vec<ClassifyItem> {
        (0..n)
            .map(|i| ClassifyItem {
                id: i.to_string(),
                subject: String::new(),
                text: format!("text {}", i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_merge_is_by_id_even_when_reordered() {
        let classifier = ReversingClassifier {
            drop_id: None,
            calls: Default::default(),
        };
        let merged = annotate_all(&classifier, &items(7), 3).await.unwrap();
        assert_eq!(merged.len(), 7);
        for i in 0..7 {
            let id = i.to_string();
            assert_eq!(
                merged[&id].archetype.as_deref(),
                Some(format!("arch-{}", id).as_str()),
                "annotation must align to record {} despite reordering",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_dropped_id_is_absent_not_fatal() {
        let classifier = ReversingClassifier {
            drop_id: Some("2".to_string()),
            calls: Default::default(),
        };
        let merged = annotate_all(&classifier, &items(4), 10).await.unwrap();
        assert_eq!(merged.len(), 3);
        assert!(!merged.contains_key("2"));
    }

    #[tokio::test]
    async fn test_chunking_respects_batch_size() {
        let classifier = ReversingClassifier {
            drop_id: None,
            calls: Default::default(),
        };
        annotate_all(&classifier, &items(25), 10).await.unwrap();
        assert_eq!(*classifier.calls.lock().unwrap(), vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_batch_failure_aborts_run() {
        let err = annotate_all(&FailingClassifier, &items(3), 2)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "external_service");
    }

    #[test]
    fn test_annotation_tolerates_missing_and_extra_fields() {
        let json = r#"{"id":"4","archetype":"Prize Scam","brand_new_field":[1,2],"risk_score":0.9}"#;
        let annotation: ExternalAnnotation = serde_json::from_str(json).unwrap();
        assert_eq!(annotation.id, "4");
        assert_eq!(annotation.archetype.as_deref(), Some("Prize Scam"));
        assert_eq!(annotation.risk_score, Some(0.9));
        assert_eq!(annotation.is_scam, None);
        assert_eq!(annotation.indicators, None);
    }

    #[test]
    fn test_request_wire_shape() {
        let batch = items(1);
        let request = ClassifyRequest {
            cluster_threshold: 0.8,
            items: &batch,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("clusterThreshold").is_some(), "camelCase key required");
        assert_eq!(json["items"][0]["id"], "0");
    }
}
