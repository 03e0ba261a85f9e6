use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One upstream catalog item. The feed is a third party we do not control,
/// so the record stays an open JSON object and every field is read through
/// an accessor that yields a defined default when any intermediate is
/// missing or has the wrong shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Value);

impl RawRecord {
    /// Program code, the sole identity key. Empty when absent.
    pub fn code(&self) -> String {
        self.program_str("Code")
    }

    /// Trimmed string form of `Program.<key>`.
    pub fn program_str(&self, key: &str) -> String {
        safe_str(self.0.get("Program").and_then(|p| p.get(key)))
    }

    /// Raw `Sovokupnost.<key>` value, if present.
    pub fn aggregate(&self, key: &str) -> Option<&Value> {
        self.0.get("Sovokupnost").and_then(|s| s.get(key))
    }

    /// Trimmed string form of `Sovokupnost.<key>`.
    pub fn aggregate_str(&self, key: &str) -> String {
        safe_str(self.aggregate(key))
    }
}

/// Scalar-to-string coercion. Null, absent and non-scalar values all
/// collapse to the empty string.
pub fn safe_str(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Collapse the concatenated feed to one record per program code.
/// First occurrence in iteration order wins; records without a code are
/// dropped outright, not counted as duplicates.
pub fn dedupe_by_code(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let code = record.code();
        if code.is_empty() {
            continue;
        }
        if seen.insert(code) {
            out.push(record);
        }
    }
    out
}
