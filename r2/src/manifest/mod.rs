//! The manifest (`defs.json`): entry name -> tracked file record.

pub mod entry;
pub mod lock;

pub use entry::Entry;
pub use lock::ManifestLock;

use crate::fs::atomic::write_atomic;
use crate::store::Digest;
use crate::utils::{R2Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// All tracked entries, keyed by name. Serialized as a bare JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, Entry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the manifest at `path`. A missing file means r2 was never
    /// initialized there.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let home = path.parent().unwrap_or(path);
                return Err(R2Error::NotInitialized(home.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&content)
    }

    pub fn from_json(content: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(content)?)
    }

    /// Pretty JSON with 4-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        out.push(b'\n');
        Ok(out)
    }

    /// Atomically write the manifest to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_json()?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| R2Error::EntryNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| R2Error::EntryNotFound(name.to_string()))
    }

    /// Add a new entry. Fails if the name is taken.
    pub fn insert(&mut self, name: &str, entry: Entry) -> Result<&mut Entry> {
        if self.entries.contains_key(name) {
            return Err(R2Error::EntryExists(name.to_string()));
        }
        Ok(self.entries.entry(name.to_string()).or_insert(entry))
    }

    pub fn remove(&mut self, name: &str) -> Result<Entry> {
        self.entries
            .remove(name)
            .ok_or_else(|| R2Error::EntryNotFound(name.to_string()))
    }

    /// Entry names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Entry)> {
        self.entries
            .iter_mut()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Every digest referenced by any generation of any entry
    pub fn referenced_digests(&self) -> BTreeSet<Digest> {
        self.entries
            .values()
            .flat_map(|entry| entry.digests().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_SHA1: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

    #[test]
    fn test_reads_existing_defs_json() -> Result<()> {
        let json = format!(
            r#"{{
    "test": {{
        "path": "/tmp/test",
        "latest": 1,
        "generations": {{
            "1": "{TEST_SHA1}"
        }}
    }}
}}"#
        );

        let manifest = Manifest::from_json(json.as_bytes())?;
        let entry = manifest.get("test")?;

        assert_eq!(entry.path, Path::new("/tmp/test"));
        assert_eq!(entry.latest, 1);
        assert_eq!(entry.get(1).map(|d| d.to_hex()), Some(TEST_SHA1.to_string()));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_digest() {
        let json = br#"{"x": {"path": "/x", "latest": 1, "generations": {"1": "../../etc/passwd"}}}"#;
        assert!(Manifest::from_json(json).is_err());
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("defs.json");

        let mut manifest = Manifest::new();
        let entry = manifest.insert("vimrc", Entry::new("/home/me/.vimrc"))?;
        entry.record(Digest::of_bytes(b"set nu"));
        manifest.save(&path)?;

        let text = fs::read_to_string(&path)?;
        assert!(text.starts_with("{\n    \"vimrc\": {"));

        assert_eq!(Manifest::load(&path)?, manifest);
        Ok(())
    }

    #[test]
    fn test_load_missing_is_not_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let err = Manifest::load(&temp_dir.path().join("defs.json")).unwrap_err();
        assert!(matches!(err, R2Error::NotInitialized(_)));
    }

    #[test]
    fn test_insert_collision() -> Result<()> {
        let mut manifest = Manifest::new();
        manifest.insert("a", Entry::new("/a"))?;

        let err = manifest.insert("a", Entry::new("/b")).unwrap_err();
        assert!(matches!(err, R2Error::EntryExists(ref n) if n == "a"));
        assert_eq!(manifest.get("a")?.path, Path::new("/a"));
        Ok(())
    }

    #[test]
    fn test_remove_and_names() -> Result<()> {
        let mut manifest = Manifest::new();
        manifest.insert("b", Entry::new("/b"))?;
        manifest.insert("a", Entry::new("/a"))?;

        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["a", "b"]);

        manifest.remove("a")?;
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["b"]);
        assert!(matches!(manifest.remove("a"), Err(R2Error::EntryNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_referenced_digests_deduplicates() -> Result<()> {
        let shared = Digest::of_bytes(b"shared");
        let mut manifest = Manifest::new();
        manifest.insert("a", Entry::new("/a"))?.record(shared);
        let b = manifest.insert("b", Entry::new("/b"))?;
        b.record(shared);
        b.record(Digest::of_bytes(b"only b"));

        assert_eq!(manifest.referenced_digests().len(), 2);
        Ok(())
    }
}
