//! Section records: the partial working copy and the validated output.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Section key → narrative text, possibly partial.
///
/// Keys are the schema's `&'static str` section keys, so a record can
/// never hold a key outside the closed set it was built against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SectionedRecord {
    sections: BTreeMap<&'static str, String>,
}

impl SectionedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a section. Whitespace-only text is ignored.
    pub fn insert(&mut self, key: &'static str, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.sections.insert(key, trimmed.to_string());
    }

    /// Append to an existing section (blank-line separated) or insert.
    pub fn append(&mut self, key: &'static str, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        match self.sections.get_mut(key) {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(trimmed);
            }
            None => {
                self.sections.insert(key, trimmed.to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.sections.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sections.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.sections.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Schema-complete record. Only the schema validator can build one, and
/// nothing can change it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    sections: Vec<(&'static str, String)>,
}

impl ValidatedRecord {
    pub(crate) fn from_ordered(sections: Vec<(&'static str, String)>) -> Self {
        Self { sections }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections in canonical schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.sections.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl Serialize for ValidatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (key, text) in &self.sections {
            map.serialize_entry(key, text)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_trims_and_skips_blank_text() {
        let mut record = SectionedRecord::new();
        record.insert("summary", "  acidaemia  ");
        record.insert("differentials", "   \n ");
        assert_eq!(record.get("summary"), Some("acidaemia"));
        assert!(!record.contains("differentials"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn append_joins_repeated_sections() {
        let mut record = SectionedRecord::new();
        record.append("keyFindings", "first");
        record.append("keyFindings", "second");
        assert_eq!(record.get("keyFindings"), Some("first\n\nsecond"));
    }

    #[test]
    fn sectioned_record_serializes_as_flat_mapping() {
        let mut record = SectionedRecord::new();
        record.insert("summary", "s");
        record.insert("differentials", "d");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"summary": "s", "differentials": "d"}));
        assert!(json.get("sections").is_none());
    }

    #[test]
    fn validated_record_serializes_in_schema_order() {
        let record = ValidatedRecord::from_ordered(vec![
            ("summary", "s".into()),
            ("differentials", "d".into()),
            ("biochemicalInterpretation", "b".into()),
        ]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"summary":"s","differentials":"d","biochemicalInterpretation":"b"}"#
        );
    }
}
