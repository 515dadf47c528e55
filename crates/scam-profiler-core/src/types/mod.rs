//! Record types shared across pipeline stages.
//!
//! The ingestion boundary is typed: [`RawRecord`] is what deserializes from
//! an input batch (unknown fields land in `extras`, never silently dropped),
//! and [`Record`] is the validated, cleaned form that flows through the
//! pipeline. All of these are created fresh per run and discarded with it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One item of the input batch, as ingested.
///
/// Only `subject` and one of `body`/`text` matter to the pipeline; every
/// other field is preserved in `extras` and round-trips into the merged
/// output untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRecord {
    /// Unique id per batch. Synthesized from the row index when absent.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub subject: Option<String>,

    /// Message body. `text` is accepted as an alias used by some feeds.
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    /// Sender identity used as the actor node in the entity graph.
    #[serde(default)]
    pub sender_id: Option<String>,

    /// Unrecognized input fields, preserved as-is.
    #[serde(flatten)]
    pub extras: HashMap<String, serde_json::Value>,
}

impl RawRecord {
    /// The body text of the record, whichever field carries it.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().or(self.text.as_deref())
    }
}

/// PII category recognized by the redactor.
///
/// Priority order is the declaration order: email, then phone, then wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PiiTag {
    Email,
    Phone,
    Wallet,
}

impl PiiTag {
    /// Tag text as it appears inside redaction tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiTag::Email => "EMAIL",
            PiiTag::Phone => "PHONE",
            PiiTag::Wallet => "WALLET",
        }
    }

    /// All tags in redaction priority order.
    pub fn all() -> [PiiTag; 3] {
        [PiiTag::Email, PiiTag::Phone, PiiTag::Wallet]
    }
}

/// Mapping from redaction tag to the original PII strings it replaced.
///
/// Held in memory for the duration of the run only. Deliberately not
/// serializable: the mapping must never end up in exported artifacts.
#[derive(Debug, Clone, Default)]
pub struct RedactionMap {
    entries: HashMap<PiiTag, Vec<String>>,
}

impl RedactionMap {
    pub fn push(&mut self, tag: PiiTag, original: String) {
        self.entries.entry(tag).or_default().push(original);
    }

    /// Original values captured for a tag, in match order.
    pub fn originals(&self, tag: PiiTag) -> &[String] {
        self.entries.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Kind of an entity node in the co-occurrence graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Email,
    Phone,
    Wallet,
    Domain,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Email => "email",
            EntityKind::Phone => "phone",
            EntityKind::Wallet => "wallet",
            EntityKind::Domain => "domain",
        }
    }
}

impl From<PiiTag> for EntityKind {
    fn from(tag: PiiTag) -> Self {
        match tag {
            PiiTag::Email => EntityKind::Email,
            PiiTag::Phone => EntityKind::Phone,
            PiiTag::Wallet => EntityKind::Wallet,
        }
    }
}

/// A pseudonymous entity token extracted from one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityToken {
    pub kind: EntityKind,
    /// Salted short-hash of the original surface, shared across records
    /// that used the same entity.
    pub token: String,
}

/// A validated record after cleaning, filtering and redaction.
///
/// Invariant: `cleaned_text` is non-empty (records failing the minimum
/// length filter never become `Record`s).
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub subject: String,
    /// Normalized (and, when masking is enabled, redacted) subject+body.
    pub cleaned_text: String,
    pub sender_id: Option<String>,
    /// Entity tokens found in this record (emails/phones/wallets/domains).
    pub entities: Vec<EntityToken>,
    /// Token -> original PII mapping for this record. In-memory only.
    pub redaction: RedactionMap,
    /// Pass-through of unrecognized input fields.
    pub extras: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_preserves_unknown_fields() {
        let json = r#"{"id":"7","subject":"hi","body":"b","channel":"sms","meta":{"k":1}}"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id.as_deref(), Some("7"));
        assert_eq!(record.extras.get("channel").unwrap(), "sms");
        assert!(record.extras.contains_key("meta"));
    }

    #[test]
    fn test_body_text_prefers_body_over_text() {
        let record = RawRecord {
            body: Some("body".into()),
            text: Some("text".into()),
            ..Default::default()
        };
        assert_eq!(record.body_text(), Some("body"));

        let only_text = RawRecord {
            text: Some("text".into()),
            ..Default::default()
        };
        assert_eq!(only_text.body_text(), Some("text"));
    }

    #[test]
    fn test_redaction_map_accumulates_in_order() {
        let mut map = RedactionMap::default();
        map.push(PiiTag::Email, "a@b.com".into());
        map.push(PiiTag::Email, "c@d.com".into());
        assert_eq!(map.originals(PiiTag::Email), ["a@b.com", "c@d.com"]);
        assert!(map.originals(PiiTag::Wallet).is_empty());
        assert_eq!(map.total(), 2);
    }
}
