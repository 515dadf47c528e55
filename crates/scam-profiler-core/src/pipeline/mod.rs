//! End-to-end pipeline orchestration.
//!
//! ```text
//! raw records -> clean/redact -> features -> embedding -> clusters
//!      -> external annotation (by id) -> consensus -> personas + graph
//! ```
//!
//! Stages run strictly in sequence; each consumes its predecessor's full
//! output and every fitted model (vocabulary, projection, cluster tree)
//! lives only for the run. The only concurrency is inside stages (rayon
//! sweeps) and the chunked external calls.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cluster::{HdbscanClusterer, HdbscanParams, NOISE};
use crate::config::Config;
use crate::consensus::{reconcile, ConsensusRow};
use crate::embedding::{fit_embed, UmapParams};
use crate::error::{CoreError, CoreResult};
use crate::evaluation::silhouette_score;
use crate::external::{annotate_all, ArchetypeClassifier, ClassifyItem, ExternalAnnotation};
use crate::features::build_features;
use crate::persona::{synthesize, Persona};
use crate::text::{extract_domains, language, normalize, redact};
use crate::graph::build_graph;
use crate::types::{EntityKind, EntityToken, PiiTag, RawRecord, Record, RedactionMap};

/// One row of the merged output: original fields plus clustering,
/// external annotation and consensus columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecord {
    pub id: String,
    pub subject: String,
    pub cleaned_text: String,
    pub sender_id: Option<String>,
    /// Internal cluster label (-1 = noise).
    pub cluster: i32,
    pub cf_archetype: Option<String>,
    pub cf_is_scam: Option<bool>,
    pub cf_scam_confidence: Option<f64>,
    pub cf_risk_score: Option<f64>,
    pub cf_cluster: Option<i64>,
    pub cf_warning: Option<String>,
    /// Persona label of this record's cluster (cluster majority).
    pub hdb_persona_from_cf: Option<String>,
    pub persona_agree: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umap_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umap_y: Option<f32>,
    /// Unrecognized input fields, passed through untouched.
    #[serde(flatten)]
    pub extras: HashMap<String, serde_json::Value>,
}

/// Run-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Rows in the input batch.
    pub rows_in: usize,
    /// Rows surviving the length/language filters.
    pub rows_kept: usize,
    pub n_clusters: usize,
    pub n_noise: usize,
    pub silhouette: Option<f64>,
    /// Overall persona agreement over all kept records, in percent.
    pub agreement_pct: f64,
}

/// Everything one run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    pub records: Vec<MergedRecord>,
    /// Cluster-level consensus table, sorted by size descending.
    pub consensus: Vec<ConsensusRow<String>>,
    pub personas: Vec<Persona>,
    /// Node key -> community id over the entity graph.
    pub communities: HashMap<String, usize>,
    pub meta: RunMeta,
}

/// The batch pipeline. Construct once per run with a validated config.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stage 1: validate, normalize, filter and redact the input batch.
    ///
    /// Fails fast when the batch carries no text-bearing fields at all;
    /// individual records failing the length or language filter are
    /// dropped silently (logged at debug).
    pub fn prepare(&self, batch: &[RawRecord]) -> CoreResult<Vec<Record>> {
        if batch.is_empty() {
            return Err(CoreError::EmptyBatch {
                context: "input batch".to_string(),
            });
        }
        if batch.iter().all(|r| r.body_text().is_none()) {
            let mut got: Vec<String> = batch[0].extras.keys().cloned().collect();
            got.sort_unstable();
            if batch[0].subject.is_some() {
                got.insert(0, "subject".to_string());
            }
            return Err(CoreError::MissingColumns {
                missing: vec!["body".to_string(), "text".to_string()],
                got,
            });
        }

        let pre = &self.config.preprocessing;
        let mut records = Vec::with_capacity(batch.len());
        for (position, raw) in batch.iter().enumerate() {
            let id = raw
                .id
                .clone()
                .unwrap_or_else(|| position.to_string());
            let subject = normalize(raw.subject.as_deref().unwrap_or(""));
            let body = normalize(raw.body_text().unwrap_or(""));
            let combined = normalize(&format!("{} {}", subject, body));

            if combined.chars().count() <= pre.min_text_len {
                tracing::debug!(id = %id, "dropped: below minimum text length");
                continue;
            }
            if pre.lang_filter && !language::matches_target(&combined, &pre.target_lang) {
                tracing::debug!(id = %id, "dropped: language mismatch or unknown");
                continue;
            }

            // Domains come from the raw text; redaction replaces URLs' PII
            // neighbors but leaves hosts in place either way.
            let mut entities: Vec<EntityToken> = extract_domains(&combined)
                .into_iter()
                .map(|domain| EntityToken {
                    kind: EntityKind::Domain,
                    token: redact::hash_token(&domain),
                })
                .collect();

            let (cleaned_text, redaction) = if pre.pii_mask {
                redact::pii_tokenize(&combined)
            } else {
                (combined, RedactionMap::default())
            };
            for tag in PiiTag::all() {
                for original in redaction.originals(tag) {
                    entities.push(EntityToken {
                        kind: tag.into(),
                        token: redact::hash_token(original),
                    });
                }
            }

            records.push(Record {
                id,
                subject,
                cleaned_text,
                sender_id: raw.sender_id.clone(),
                entities,
                redaction,
                extras: raw.extras.clone(),
            });
        }

        tracing::info!(
            rows_in = batch.len(),
            rows_kept = records.len(),
            "preprocessing complete"
        );
        Ok(records)
    }

    /// Run the full pipeline over one batch.
    pub async fn run(
        &self,
        batch: Vec<RawRecord>,
        classifier: &dyn ArchetypeClassifier,
    ) -> CoreResult<PipelineOutput> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let rows_in = batch.len();
        tracing::info!(%run_id, rows_in, "pipeline run starting");

        let records = self.prepare(&batch)?;
        if records.is_empty() {
            return Err(CoreError::EmptyBatch {
                context: "after preprocessing filters".to_string(),
            });
        }

        let texts: Vec<String> = records.iter().map(|r| r.cleaned_text.clone()).collect();
        let features = build_features(&texts, &self.config.features)?;

        let (_model, embedding) = fit_embed(
            &features.matrix,
            &UmapParams::from_config(&self.config.umap),
        )?;
        let viz = if self.config.umap.viz {
            let (_, coords) = fit_embed(
                &features.matrix,
                &UmapParams::for_visualization(&self.config.umap),
            )?;
            Some(coords)
        } else {
            None
        };

        let clusterer = HdbscanClusterer::new(HdbscanParams::from_config(&self.config.hdbscan))?;
        let clustering = clusterer.fit(&embedding)?;
        let silhouette = silhouette_score(&embedding, &clustering.labels);

        let items: Vec<ClassifyItem> = records
            .iter()
            .map(|r| ClassifyItem {
                id: r.id.clone(),
                subject: r.subject.clone(),
                text: r.cleaned_text.clone(),
            })
            .collect();
        let annotations =
            annotate_all(classifier, &items, self.config.classifier.batch_size).await?;

        let externals: Vec<Option<String>> = records
            .iter()
            .map(|r| {
                annotations
                    .get(&r.id)
                    .and_then(|a| a.archetype.clone())
            })
            .collect();
        let consensus = reconcile(&clustering.labels, &externals);

        let personas = self.synthesize_personas(&records, &features.flags, &clustering.labels);

        let entity_graph = build_graph(&records, &self.config.network);
        let communities = entity_graph.partition();

        let merged = assemble_records(
            records,
            &clustering.labels,
            &annotations,
            &consensus.persona_labels,
            &consensus.agreement,
            viz.as_deref(),
        );

        let meta = RunMeta {
            run_id,
            started_at,
            rows_in,
            rows_kept: merged.len(),
            n_clusters: clustering.n_clusters,
            n_noise: clustering.n_noise,
            silhouette,
            agreement_pct: consensus.agreement_pct,
        };
        tracing::info!(
            %run_id,
            n_clusters = meta.n_clusters,
            n_noise = meta.n_noise,
            agreement_pct = meta.agreement_pct,
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            records: merged,
            consensus: consensus.rows,
            personas,
            communities,
            meta,
        })
    }

    /// One persona per non-noise cluster, in cluster-id order.
    fn synthesize_personas(
        &self,
        records: &[Record],
        flags: &[crate::features::SignalFlags],
        labels: &[i32],
    ) -> Vec<Persona> {
        let mut clusters: Vec<i32> = labels.iter().copied().filter(|&l| l != NOISE).collect();
        clusters.sort_unstable();
        clusters.dedup();

        clusters
            .into_iter()
            .map(|cluster| {
                let indices: Vec<usize> = (0..labels.len())
                    .filter(|&i| labels[i] == cluster)
                    .collect();
                let texts: Vec<&str> = indices
                    .iter()
                    .map(|&i| records[i].cleaned_text.as_str())
                    .collect();
                let member_flags: Vec<_> = indices.iter().map(|&i| flags[i]).collect();
                synthesize(cluster, &texts, &member_flags, &self.config.persona)
            })
            .collect()
    }
}

fn assemble_records(
    records: Vec<Record>,
    labels: &[i32],
    annotations: &HashMap<String, ExternalAnnotation>,
    persona_labels: &[Option<String>],
    agreement: &[bool],
    viz: Option<&[Vec<f32>]>,
) -> Vec<MergedRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let annotation = annotations.get(&record.id);
            MergedRecord {
                cluster: labels[i],
                cf_archetype: annotation.and_then(|a| a.archetype.clone()),
                cf_is_scam: annotation.and_then(|a| a.is_scam),
                cf_scam_confidence: annotation.and_then(|a| a.scam_confidence),
                cf_risk_score: annotation.and_then(|a| a.risk_score),
                cf_cluster: annotation.and_then(|a| a.cluster),
                cf_warning: annotation.and_then(|a| a.warning.clone()),
                hdb_persona_from_cf: persona_labels[i].clone(),
                persona_agree: agreement[i],
                umap_x: viz.and_then(|v| v[i].first().copied()),
                umap_y: viz.and_then(|v| v[i].get(1).copied()),
                id: record.id,
                subject: record.subject,
                cleaned_text: record.cleaned_text,
                sender_id: record.sender_id,
                extras: record.extras,
            }
        })
        .collect()
}
