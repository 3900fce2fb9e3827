use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One index row of an upstream snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Display name as returned by upstream (e.g. "Dow Jones")
    #[serde(default, deserialize_with = "deserialize_lenient_text")]
    pub name: String,

    /// Previous close exactly as upstream formats it (e.g. "41,985.63")
    #[serde(rename = "prev_close", default, deserialize_with = "deserialize_lenient_text")]
    pub previous_close_raw: String,
}

impl SnapshotEntry {
    pub fn new(name: &str, previous_close_raw: &str) -> Self {
        Self {
            name: name.to_string(),
            previous_close_raw: previous_close_raw.to_string(),
        }
    }
}

/// Upstream sends `prev_close` as a string most of the time and as a bare number
/// for some indices; keep both as text and let the normalizer decide. Names get
/// the same treatment so a `null` name costs one entry, not the whole snapshot.
fn deserialize_lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Entries of one fetch cycle, shared by every tracked index of a run
pub type SnapshotCollection = Vec<SnapshotEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prev_close_string_or_number() {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(
            r#"[
                {"name": "Dow Jones", "prev_close": "41,985.63", "high": "42,000"},
                {"name": "DAX", "prev_close": 18250.5},
                {"name": "Empty", "prev_close": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries[0], SnapshotEntry::new("Dow Jones", "41,985.63"));
        assert_eq!(entries[1].previous_close_raw, "18250.5");
        assert_eq!(entries[2].previous_close_raw, "");
    }

    #[test]
    fn test_null_or_missing_name_keeps_the_row() {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(
            r#"[
                {"name": null, "prev_close": "100"},
                {"prev_close": "200"},
                {"name": "FTSE 100", "prev_close": "8,822.91"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "");
        assert_eq!(entries[1].name, "");
        assert_eq!(entries[2].name, "FTSE 100");
    }
}
