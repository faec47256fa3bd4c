//! Comparing live files with stored generations.

use super::Repository;
use crate::manifest::Entry;
use crate::store::Digest;
use crate::utils::{R2Error, Result};
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffState {
    /// Live file is byte-identical to the generation
    Matches,
    /// Live file has different content
    Differs,
    /// Live file does not exist
    Missing,
    /// Live path exists but could not be read (a directory, no permission)
    Unreadable,
}

impl fmt::Display for DiffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffState::Matches => "unchanged",
            DiffState::Differs => "modified",
            DiffState::Missing => "missing",
            DiffState::Unreadable => "unreadable",
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiffReport {
    pub name: String,
    pub path: PathBuf,
    pub generation: u64,
    pub stored: Digest,
    /// Digest of the live file, if it could be read
    pub live: Option<Digest>,
    pub state: DiffState,
}

impl Repository {
    /// Compare the live file with `generation` (default: latest).
    pub fn diff(&self, name: &str, generation: Option<u64>) -> Result<DiffReport> {
        let manifest = self.manifest()?;
        compare(name, manifest.get(name)?, generation)
    }

    /// Diff every entry against its latest generation, sorted by name.
    pub fn status(&self) -> Result<Vec<DiffReport>> {
        let manifest = self.manifest()?;
        let mut reports = Vec::with_capacity(manifest.len());

        for (name, entry) in manifest.iter() {
            if entry.latest_digest().is_none() {
                warn!(name, "entry has no generations, skipping");
                continue;
            }
            reports.push(compare(name, entry, None)?);
        }

        Ok(reports)
    }
}

fn compare(name: &str, entry: &Entry, generation: Option<u64>) -> Result<DiffReport> {
    let (generation, stored) = match entry.resolve(generation) {
        (generation, Some(digest)) => (generation, digest),
        (generation, None) => {
            return Err(R2Error::GenerationNotFound {
                name: name.to_string(),
                generation,
            })
        }
    };

    let (live, state) = match Digest::of_file(entry.path()) {
        Ok(live) if live == stored => (Some(live), DiffState::Matches),
        Ok(live) => (Some(live), DiffState::Differs),
        Err(e) if e.kind() == ErrorKind::NotFound => (None, DiffState::Missing),
        Err(e) => {
            warn!(name, path = %entry.path().display(), error = %e, "cannot read live file");
            (None, DiffState::Unreadable)
        }
    };

    Ok(DiffReport {
        name: name.to_string(),
        path: entry.path.clone(),
        generation,
        stored,
        live,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use std::fs;

    #[test]
    fn test_diff_matches_then_differs() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("rc", b"alias ll='ls -l'");
        fx.repo.add("rc", &path)?;

        let report = fx.repo.diff("rc", None)?;
        assert_eq!(report.state, DiffState::Matches);
        assert_eq!(report.generation, 1);
        assert_eq!(report.live, Some(report.stored));

        fs::write(&path, b"alias ll='ls -la'")?;
        let report = fx.repo.diff("rc", None)?;
        assert_eq!(report.state, DiffState::Differs);
        Ok(())
    }

    #[test]
    fn test_diff_against_older_generation() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("rc", b"one");
        fx.repo.add("rc", &path)?;
        fs::write(&path, b"two")?;
        fx.repo.backup("rc")?;

        assert_eq!(fx.repo.diff("rc", Some(1))?.state, DiffState::Differs);
        assert_eq!(fx.repo.diff("rc", Some(2))?.state, DiffState::Matches);

        let err = fx.repo.diff("rc", Some(3)).unwrap_err();
        assert!(matches!(
            err,
            R2Error::GenerationNotFound { generation: 3, .. }
        ));
        Ok(())
    }

    #[test]
    fn test_diff_missing_live_file() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("rc", b"x");
        fx.repo.add("rc", &path)?;
        fs::remove_file(&path)?;

        let report = fx.repo.diff("rc", None)?;
        assert_eq!(report.state, DiffState::Missing);
        assert!(report.live.is_none());
        Ok(())
    }

    #[test]
    fn test_diff_unknown_entry() {
        let fx = Fixture::new();
        let err = fx.repo.diff("nope", None).unwrap_err();
        assert!(matches!(err, R2Error::EntryNotFound(_)));
    }

    #[test]
    fn test_status_reports_every_entry() -> Result<()> {
        let fx = Fixture::new();
        let a = fx.file("a", b"a");
        let b = fx.file("b", b"b");
        let c = fx.file("c", b"c");
        fx.repo.add("a", &a)?;
        fx.repo.add("b", &b)?;
        fx.repo.add("c", &c)?;
        fs::write(&b, b"bb")?;
        fs::remove_file(&c)?;

        let status = fx.repo.status()?;
        let states: Vec<_> = status.iter().map(|r| (r.name.as_str(), r.state)).collect();
        assert_eq!(
            states,
            vec![
                ("a", DiffState::Matches),
                ("b", DiffState::Differs),
                ("c", DiffState::Missing),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_status_continues_past_unreadable_entry() -> Result<()> {
        let fx = Fixture::new();
        let a = fx.file("a", b"a");
        let b = fx.file("b", b"b");
        fx.repo.add("a", &a)?;
        fx.repo.add("b", &b)?;
        fs::remove_file(&b)?;
        fs::create_dir(&b)?;

        let status = fx.repo.status()?;
        let states: Vec<_> = status.iter().map(|r| (r.name.as_str(), r.state)).collect();
        assert_eq!(
            states,
            vec![("a", DiffState::Matches), ("b", DiffState::Unreadable)]
        );
        assert!(status[1].live.is_none());

        assert_eq!(fx.repo.diff("b", None)?.state, DiffState::Unreadable);
        Ok(())
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DiffState::Matches.to_string(), "unchanged");
        assert_eq!(DiffState::Differs.to_string(), "modified");
        assert_eq!(DiffState::Missing.to_string(), "missing");
        assert_eq!(DiffState::Unreadable.to_string(), "unreadable");
    }
}
