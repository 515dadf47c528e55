//! Structured error output.
//!
//! The CLI surfaces failures as one machine-checkable JSON line on
//! stderr: `{"error": <message>, "category": <category>}`. Stack context
//! stays in tracing output, never in the payload.

use scam_profiler_core::CoreError;

/// Print the structured error payload to stderr.
pub fn emit(err: &CoreError) {
    tracing::error!(category = err.category(), error = %err, "command failed");
    let payload = serde_json::json!({
        "error": err.to_string(),
        "category": err.category(),
    });
    eprintln!("{}", payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let err = CoreError::Config("bad value".into());
        let payload = serde_json::json!({
            "error": err.to_string(),
            "category": err.category(),
        });
        assert_eq!(payload["category"], "config");
        assert!(payload["error"].as_str().unwrap().contains("bad value"));
    }
}
