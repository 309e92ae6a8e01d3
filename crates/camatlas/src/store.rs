//! Per-country JSON collections of canonical records.
//!
//! One file per key under the store directory. Each merge reads the whole
//! collection, normalises it, prunes entries without a stream URL, appends
//! the new record unless its `(embedUrl, title)` is already present, and
//! rewrites the file when anything changed.
//!
//! Writes are not coordinated across processes: run a single writer per key.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::AtlasResult;
use crate::types::{CanonicalRecord, OutputMode};

/// What a merge did to the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub appended: bool,
    /// The record's dedup key was already present.
    pub duplicate: bool,
    /// Existing entries dropped for lacking both stream URLs.
    pub pruned: usize,
    /// Whether the file was rewritten.
    pub written: bool,
    /// Collection size after the merge.
    pub total: usize,
}

/// File-backed record collections keyed by country.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    file_suffix: String,
}

impl RecordStore {
    /// A store rooted at `dir`. Files are named `<key><file_suffix>.json`.
    pub fn open(dir: impl Into<PathBuf>, file_suffix: &str) -> Self {
        Self {
            dir: dir.into(),
            file_suffix: file_suffix.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the collection file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", sanitize_key(key), self.file_suffix))
    }

    /// The normalised collection for `key`; empty when absent or unreadable.
    pub fn load(&self, key: &str) -> Vec<Value> {
        read_collection(&self.path_for(key)).entries
    }

    /// Merge `record` into the collection for `key`.
    pub fn merge(
        &self,
        key: &str,
        record: &CanonicalRecord,
        mode: OutputMode,
    ) -> AtlasResult<MergeOutcome> {
        let path = self.path_for(key);
        let Collection {
            entries,
            mut changed,
        } = read_collection(&path);

        let before = entries.len();
        let mut entries: Vec<Value> = entries.into_iter().filter(has_stream_url).collect();
        let pruned = before - entries.len();
        if pruned > 0 {
            tracing::info!("pruned {pruned} entries without stream URLs from {}", path.display());
            changed = true;
        }

        let seen: HashSet<(String, String)> = entries.iter().map(dedup_key).collect();
        let new_key = (record.embed_url.clone(), record.title.clone());
        let duplicate = seen.contains(&new_key);
        let appended = record.has_stream() && !duplicate;
        if appended {
            entries.push(record.to_json(mode));
            changed = true;
        }

        if changed {
            write_collection(&self.dir, &path, &entries)?;
        }
        tracing::debug!(
            "merge into {}: appended={appended} duplicate={duplicate} total={}",
            path.display(),
            entries.len()
        );

        Ok(MergeOutcome {
            appended,
            duplicate,
            pruned,
            written: changed,
            total: entries.len(),
        })
    }
}

/// File-name-safe form of a store key. Blank keys become `Unknown`.
pub fn sanitize_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return "Unknown".to_string();
    }
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

struct Collection {
    entries: Vec<Value>,
    /// The stored shape differs from a plain array of objects.
    changed: bool,
}

fn read_collection(path: &Path) -> Collection {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Collection {
                entries: Vec::new(),
                changed: false,
            }
        }
        Err(e) => {
            tracing::warn!("unreadable store file {}: {e}; treating as empty", path.display());
            return Collection {
                entries: Vec::new(),
                changed: false,
            };
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => {
            let total = items.len();
            let entries: Vec<Value> = items.into_iter().filter(Value::is_object).collect();
            let changed = entries.len() != total;
            Collection { entries, changed }
        }
        Ok(obj @ Value::Object(_)) => {
            tracing::info!("converting single-object store file {} to a list", path.display());
            Collection {
                entries: vec![obj],
                changed: true,
            }
        }
        Ok(_) | Err(_) => {
            tracing::warn!("corrupt store file {}; treating as empty", path.display());
            Collection {
                entries: Vec::new(),
                changed: false,
            }
        }
    }
}

fn write_collection(dir: &Path, path: &Path, entries: &[Value]) -> AtlasResult<()> {
    fs::create_dir_all(dir)?;
    let body = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn field_str<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn has_stream_url(entry: &Value) -> bool {
    !field_str(entry, "embedUrl").trim().is_empty() || !field_str(entry, "contentUrl").trim().is_empty()
}

fn dedup_key(entry: &Value) -> (String, String) {
    (
        field_str(entry, "embedUrl").to_string(),
        field_str(entry, "title").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(embed: &str, content: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            embed_url: embed.into(),
            content_url: content.into(),
            thumbnail_url: String::new(),
            country: "Vietnam".into(),
            city: "Hue".into(),
            title: title.into(),
            coordinates: None,
            source_url: "https://cams.example.com/x".into(),
            captured_at: Utc::now(),
            key_mapping_data: String::new(),
        }
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Viet Nam"), "Viet_Nam");
        assert_eq!(sanitize_key("  "), "Unknown");
        assert_eq!(sanitize_key("Côte d'Ivoire"), "C_te_d_Ivoire");
    }

    #[test]
    fn test_first_merge_creates_array() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path().join("out"), "");
        let outcome = store
            .merge("Vietnam", &record("A", "", "T1"), OutputMode::Minimal)
            .unwrap();
        assert!(outcome.appended && outcome.written);
        let raw = fs::read_to_string(store.path_for("Vietnam")).unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains("\n  {"));
    }

    #[test]
    fn test_existing_key_wins() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "");
        fs::write(store.path_for("Vietnam"), r#"[{"embedUrl":"A","title":"T1"}]"#).unwrap();

        let outcome = store
            .merge("Vietnam", &record("A", "X", "T1"), OutputMode::Minimal)
            .unwrap();
        assert!(outcome.duplicate);
        assert!(!outcome.written);
        let entries = store.load("Vietnam");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].get("contentUrl").is_none());
    }

    #[test]
    fn test_idempotent_merge() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "_full");
        let r = record("https://www.youtube.com/embed/a", "", "Cam");
        store.merge("Vietnam", &r, OutputMode::Full).unwrap();
        let first = fs::read_to_string(store.path_for("Vietnam")).unwrap();
        let again = store.merge("Vietnam", &r, OutputMode::Full).unwrap();
        assert!(!again.written);
        assert_eq!(fs::read_to_string(store.path_for("Vietnam")).unwrap(), first);
        assert!(store.path_for("Vietnam").ends_with("Vietnam_full.json"));
    }

    #[test]
    fn test_legacy_object_and_pruning() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "");
        fs::write(store.path_for("Laos"), r#"{"embedUrl":"E1","title":"Old"}"#).unwrap();
        assert_eq!(store.load("Laos").len(), 1);

        fs::write(
            store.path_for("Laos"),
            r#"[{"embedUrl":"","contentUrl":"","title":"dead"},{"title":"no urls"},"junk",{"contentUrl":"C","title":"ok"}]"#,
        )
        .unwrap();
        let outcome = store
            .merge("Laos", &record("", "", "incomplete"), OutputMode::Minimal)
            .unwrap();
        assert_eq!(outcome.pruned, 2);
        assert!(!outcome.appended);
        assert!(outcome.written);
        let entries = store.load("Laos");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["title"], "ok");
    }

    #[test]
    fn test_missing_embed_counts_as_empty_key() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "");
        fs::write(store.path_for("Laos"), r#"[{"embedUrl":null,"contentUrl":"C","title":"Cam"}]"#).unwrap();
        let outcome = store
            .merge("Laos", &record("", "C2", "Cam"), OutputMode::Minimal)
            .unwrap();
        assert!(outcome.duplicate);
        assert_eq!(outcome.total, 1);
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "");
        fs::write(store.path_for("Laos"), "{ truncated").unwrap();
        assert!(store.load("Laos").is_empty());
        let outcome = store
            .merge("Laos", &record("A", "", "T"), OutputMode::Minimal)
            .unwrap();
        assert!(outcome.appended);
        assert_eq!(outcome.total, 1);
        assert_eq!(store.load("Laos").len(), 1);
    }

    #[test]
    fn test_unicode_written_unescaped() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), "");
        store
            .merge("Vietnam", &record("A", "", "Cầu Rồng"), OutputMode::Minimal)
            .unwrap();
        let raw = fs::read_to_string(store.path_for("Vietnam")).unwrap();
        assert!(raw.contains("Cầu Rồng"));
    }
}
