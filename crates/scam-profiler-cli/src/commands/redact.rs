//! `redact`: standalone PII masking over a batch, for sharing samples
//! without running the full pipeline.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use scam_profiler_core::error::CoreResult;
use scam_profiler_core::text::{normalize, redact::pii_tokenize};

#[derive(Args)]
pub struct RedactArgs {
    /// Input batch (.ndjson, .jsonl or .json)
    pub input: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: RedactArgs) -> CoreResult<()> {
    let batch = super::read_batch(&args.input)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut masked = 0usize;
    for (position, record) in batch.iter().enumerate() {
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| position.to_string());
        let subject = normalize(record.subject.as_deref().unwrap_or(""));
        let body = normalize(record.body_text().unwrap_or(""));

        let (subject_masked, subject_map) = pii_tokenize(&subject);
        let (body_masked, body_map) = pii_tokenize(&body);
        masked += subject_map.total() + body_map.total();

        let line = serde_json::json!({
            "id": id,
            "subject": subject_masked,
            "text": body_masked,
        });
        writeln!(out, "{}", line)?;
    }

    info!(records = batch.len(), surfaces = masked, "redaction complete");
    Ok(())
}
