use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesMap {
    entries: Vec<(String, String)>,
}

impl SeriesMap {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, label)| (key.into().to_lowercase(), label.into()))
                .filter(|(key, _)| !key.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, filename: &str) -> Option<&str> {
        let haystack = filename.to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| haystack.contains(key.as_str()))
            .map(|(_, label)| label.as_str())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("series map is not valid json")?;
        let Value::Object(object) = value else {
            bail!("series map must be a json object of substring to series label");
        };

        let mut entries = Vec::with_capacity(object.len());
        for (key, label) in object {
            match label {
                Value::String(label) => entries.push((key, label)),
                other => bail!("series label for key {key:?} must be a string, found {other}"),
            }
        }

        Ok(Self::new(entries))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn load_or_empty(path: &Path) -> Self {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "series map not found, series lookup disabled"
            );
            return Self::default();
        }

        match Self::load(path) {
            Ok(map) => {
                info!(path = %path.display(), entries = map.len(), "loaded series map");
                map
            }
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(path = %path.display(), error = %detail, "could not load series map");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_file_order_for_first_match() {
        let map = SeriesMap::parse(r#"{ "weekly": "Weekly Digest", "week": "Week Notes" }"#)
            .expect("valid map");
        assert_eq!(map.lookup("The_Weekly_2024.pdf"), Some("Weekly Digest"));

        let reversed = SeriesMap::parse(r#"{ "week": "Week Notes", "weekly": "Weekly Digest" }"#)
            .expect("valid map");
        assert_eq!(reversed.lookup("The_Weekly_2024.pdf"), Some("Week Notes"));
    }

    #[test]
    fn lookup_is_case_insensitive_on_both_sides() {
        let map = SeriesMap::new([("ALPHA", "Alpha Series")]);
        assert_eq!(map.lookup("alpha_report.pdf"), Some("Alpha Series"));
        assert_eq!(map.lookup("Beta.pdf"), None);
    }

    #[test]
    fn parse_rejects_non_object_and_non_string_labels() {
        assert!(SeriesMap::parse("[1, 2]").is_err());
        assert!(SeriesMap::parse(r#"{ "alpha": 3 }"#).is_err());
        assert!(SeriesMap::parse("{ not json").is_err());
    }

    #[test]
    fn load_or_empty_degrades_on_missing_or_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("series_mapping.json");
        assert!(SeriesMap::load_or_empty(&missing).is_empty());

        fs::write(&missing, "{ broken").expect("write malformed map");
        assert!(SeriesMap::load_or_empty(&missing).is_empty());

        fs::write(&missing, r#"{ "gazette": "The Gazette" }"#).expect("write map");
        assert_eq!(SeriesMap::load_or_empty(&missing).len(), 1);
    }
}
