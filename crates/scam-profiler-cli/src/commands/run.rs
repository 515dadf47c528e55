//! `run`: the full pipeline over one batch file.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use scam_profiler_core::config::Config;
use scam_profiler_core::error::CoreResult;
use scam_profiler_core::export::export_artifacts;
use scam_profiler_core::external::HttpClassifier;
use scam_profiler_core::pipeline::Pipeline;

#[derive(Args)]
pub struct RunArgs {
    /// Input batch (.ndjson, .jsonl or .json)
    pub input: PathBuf,

    /// Configuration file (TOML); defaults to the layered config lookup
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the classifier endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Override the export directory
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Skip writing artifacts
    #[arg(long)]
    pub no_export: bool,
}

pub async fn execute(args: RunArgs) -> CoreResult<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(endpoint) = args.endpoint {
        config.classifier.endpoint = endpoint;
    }
    if let Some(dir) = &args.export_dir {
        config.export.dir = dir.display().to_string();
    }

    let batch = super::read_batch(&args.input)?;
    info!(rows = batch.len(), input = %args.input.display(), "batch loaded");

    let classifier = HttpClassifier::new(config.classifier.clone())?;
    let pipeline = Pipeline::new(config.clone())?;
    let output = pipeline.run(batch, &classifier).await?;

    println!("rows in:        {}", output.meta.rows_in);
    println!("rows kept:      {}", output.meta.rows_kept);
    println!("clusters:       {}", output.meta.n_clusters);
    println!("noise records:  {}", output.meta.n_noise);
    match output.meta.silhouette {
        Some(score) => println!("silhouette:     {:.3}", score),
        None => println!("silhouette:     n/a"),
    }
    println!("agreement:      {:.1}%", output.meta.agreement_pct);

    println!("\ncluster  size  majority archetype            share");
    for row in &output.consensus {
        println!(
            "{:>7}  {:>4}  {:<28}  {:>5.1}%",
            row.hdb_cluster,
            row.size,
            row.majority.as_deref().unwrap_or("-"),
            row.majority_share_pct
        );
    }

    for persona in &output.personas {
        println!("\n[{}] {} ({} samples)", persona.cluster, persona.name, persona.n_samples);
        println!("  keywords: {}", persona.top_terms.join(", "));
    }

    if !args.no_export {
        let dir = PathBuf::from(&pipeline.config().export.dir);
        let paths = export_artifacts(&output, &dir)?;
        info!(files = paths.len(), dir = %dir.display(), "artifacts written");
    }

    Ok(())
}
