//! Language filtering.
//!
//! Records whose detected language does not match the configured target are
//! excluded from the batch. Detection failure (empty or ambiguous text) is
//! treated as "unknown" and excluded, never raised.

/// Detected language code (ISO-639-3, e.g. "eng"), or `None` when
/// detection fails.
pub fn detect_lang(text: &str) -> Option<&'static str> {
    whatlang::detect(text).map(|info| info.lang().code())
}

/// True when the detected language equals the target code.
///
/// Unknown language never matches.
pub fn matches_target(text: &str, target: &str) -> bool {
    detect_lang(text).map(|code| code == target).unwrap_or(false)
}
