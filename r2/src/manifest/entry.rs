//! A tracked file and its generations.

use crate::store::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One tracked file. The name is the key it is stored under in the manifest.
///
/// ```json
/// {
///     "path": "/home/me/.vimrc",
///     "latest": 2,
///     "generations": {
///         "1": "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3",
///         "2": "0c1fdb0ec5f8b7c9e6a61b0b8d7e5d5dfbd07a69"
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Absolute path of the live file
    pub path: PathBuf,

    /// Highest generation recorded (0 before the first snapshot)
    pub latest: u64,

    /// Generation number -> content digest
    #[serde(default)]
    pub generations: BTreeMap<u64, Digest>,
}

impl Entry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latest: 0,
            generations: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a generation and return its number.
    pub fn record(&mut self, digest: Digest) -> u64 {
        let generation = self.latest + 1;
        self.generations.insert(generation, digest);
        self.latest = generation;
        generation
    }

    pub fn get(&self, generation: u64) -> Option<&Digest> {
        self.generations.get(&generation)
    }

    pub fn latest_digest(&self) -> Option<&Digest> {
        self.get(self.latest)
    }

    /// Pick `generation`, or `latest` when none is given.
    ///
    /// Returns the generation number even when it has no digest, so the
    /// caller can report exactly what was asked for.
    pub fn resolve(&self, generation: Option<u64>) -> (u64, Option<Digest>) {
        let generation = generation.unwrap_or(self.latest);
        (generation, self.get(generation).copied())
    }

    /// Drop every generation except `latest`. Returns how many were dropped.
    ///
    /// `latest` is left untouched, so numbering continues where it was.
    pub fn prune(&mut self) -> usize {
        let before = self.generations.len();
        let latest = self.latest;
        self.generations.retain(|&generation, _| generation == latest);
        before - self.generations.len()
    }

    pub fn digests(&self) -> impl Iterator<Item = &Digest> {
        self.generations.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments_latest() {
        let mut entry = Entry::new("/tmp/file");
        assert_eq!(entry.latest, 0);
        assert!(entry.latest_digest().is_none());

        let d1 = Digest::of_bytes(b"one");
        let d2 = Digest::of_bytes(b"two");
        assert_eq!(entry.record(d1), 1);
        assert_eq!(entry.record(d2), 2);

        assert_eq!(entry.latest, 2);
        assert_eq!(entry.latest_digest(), Some(&d2));
        assert_eq!(entry.get(1), Some(&d1));
    }

    #[test]
    fn test_resolve() {
        let mut entry = Entry::new("/tmp/file");
        let d1 = Digest::of_bytes(b"one");
        entry.record(d1);

        assert_eq!(entry.resolve(None), (1, Some(d1)));
        assert_eq!(entry.resolve(Some(1)), (1, Some(d1)));
        assert_eq!(entry.resolve(Some(7)), (7, None));
    }

    #[test]
    fn test_prune_keeps_latest() {
        let mut entry = Entry::new("/tmp/file");
        entry.record(Digest::of_bytes(b"one"));
        entry.record(Digest::of_bytes(b"two"));
        let d3 = Digest::of_bytes(b"three");
        entry.record(d3);

        assert_eq!(entry.prune(), 2);
        assert_eq!(entry.generations.len(), 1);
        assert_eq!(entry.latest_digest(), Some(&d3));
        assert_eq!(entry.prune(), 0);

        // Numbering continues after a prune
        assert_eq!(entry.record(Digest::of_bytes(b"four")), 4);
    }

    #[test]
    fn test_generation_keys_serialize_as_strings() {
        let mut entry = Entry::new("/tmp/test");
        entry.record(Digest::of_bytes(b"test"));

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["latest"], 1);
        assert_eq!(
            value["generations"]["1"],
            "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
        );
    }
}
