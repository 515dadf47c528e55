//! CLI command implementations.

pub mod redact;
pub mod run;

use std::path::Path;

use scam_profiler_core::error::{CoreError, CoreResult};
use scam_profiler_core::types::RawRecord;

/// Read a batch from NDJSON (`.ndjson`/`.jsonl`, one object per line) or
/// a JSON array (`.json`). Anything else fails fast.
pub fn read_batch(path: &Path) -> CoreResult<Vec<RawRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let content = std::fs::read_to_string(path)?;
    match extension.as_str() {
        "ndjson" | "jsonl" => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CoreError::from))
            .collect(),
        "json" => Ok(serde_json::from_str(&content)?),
        other => Err(CoreError::UnsupportedFormat(format!(
            "'.{}' for {}; expected .ndjson, .jsonl or .json",
            other,
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_ndjson() {
        let mut file = tempfile::Builder::new().suffix(".ndjson").tempfile().unwrap();
        writeln!(file, r#"{{"id":"1","subject":"s","body":"b"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id":"2","text":"t","channel":"sms"}}"#).unwrap();

        let batch = read_batch(file.path()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].extras["channel"], "sms");
    }

    #[test]
    fn test_read_json_array() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"id":"1","body":"hello"}}]"#).unwrap();
        let batch = read_batch(file.path()).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_unsupported_format_fails_fast() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "id,body\n1,x").unwrap();
        let err = read_batch(file.path()).unwrap_err();
        assert_eq!(err.category(), "input");
        assert!(err.to_string().contains(".csv"));
    }
}
