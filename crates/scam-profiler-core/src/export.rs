//! Artifact export.
//!
//! Writes the merged record set, the cluster-level consensus table,
//! personas, communities and run metadata as pretty-printed JSON under
//! the configured export directory. Redaction mappings are deliberately
//! unexportable and never appear here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::CoreResult;
use crate::pipeline::PipelineOutput;

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> CoreResult<PathBuf> {
    let path = dir.join(name);
    let file = fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(path)
}

/// Write all artifacts for one run. Creates the directory as needed and
/// returns the written paths.
pub fn export_artifacts(output: &PipelineOutput, dir: &Path) -> CoreResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let paths = vec![
        write_json(dir, "merged.json", &output.records)?,
        write_json(dir, "cluster_summary.json", &output.consensus)?,
        write_json(dir, "personas.json", &output.personas)?,
        write_json(dir, "communities.json", &output.communities)?,
        write_json(dir, "run_meta.json", &output.meta)?,
    ];

    tracing::info!(dir = %dir.display(), files = paths.len(), "artifacts exported");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunMeta;
    use chrono::Utc;
    use uuid::Uuid;

    fn empty_output() -> PipelineOutput {
        PipelineOutput {
            records: Vec::new(),
            consensus: Vec::new(),
            personas: Vec::new(),
            communities: Default::default(),
            meta: RunMeta {
                run_id: Uuid::new_v4(),
                started_at: Utc::now(),
                rows_in: 0,
                rows_kept: 0,
                n_clusters: 0,
                n_noise: 0,
                silhouette: None,
                agreement_pct: 0.0,
            },
        }
    }

    #[test]
    fn test_export_creates_directory_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/exports");
        let paths = export_artifacts(&empty_output(), &dir).unwrap();

        assert_eq!(paths.len(), 5);
        for path in &paths {
            assert!(path.exists(), "{} must exist", path.display());
        }
        let meta = std::fs::read_to_string(dir.join("run_meta.json")).unwrap();
        assert!(meta.contains("run_id"));
    }
}
