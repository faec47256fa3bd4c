//! Pruning old generations and collecting unreferenced blobs.

use super::Repository;
use crate::manifest::Manifest;
use crate::store::Digest;
use crate::utils::Result;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// (entry name, generations dropped) for entries that lost any
    pub pruned: Vec<(String, usize)>,
    pub dry_run: bool,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.pruned.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    /// Blobs found in the store
    pub scanned: usize,
    /// Unreferenced blobs (deleted unless this was a dry run)
    pub unreferenced: Vec<Digest>,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

impl Repository {
    /// Keep only the latest generation of `name`, or of every entry when
    /// `name` is `None`. Blobs are left for `gc`.
    pub fn prune(&self, name: Option<&str>, dry_run: bool) -> Result<PruneReport> {
        let pruned = if dry_run {
            prune_in(&mut self.manifest()?, name)?
        } else {
            self.mutate(|manifest, _| prune_in(manifest, name))?
        };

        let report = PruneReport { pruned, dry_run };
        info!(
            entries = report.pruned.len(),
            generations = report.total(),
            dry_run,
            "prune finished"
        );
        Ok(report)
    }

    /// Delete every blob no generation of any entry refers to.
    ///
    /// Runs under the manifest lock so a concurrent `add` cannot reference a
    /// blob while it is being deleted.
    pub fn gc(&self, dry_run: bool) -> Result<GcReport> {
        let _lock = self.lock()?;
        let referenced = self.manifest()?.referenced_digests();
        let present = self.store.list()?;

        let mut report = GcReport {
            scanned: present.len(),
            dry_run,
            ..GcReport::default()
        };

        for digest in present {
            if referenced.contains(&digest) {
                continue;
            }
            report.bytes_freed += if dry_run {
                self.store.size(&digest).unwrap_or(0)
            } else {
                self.store.remove(&digest)?
            };
            report.unreferenced.push(digest);
        }

        info!(
            scanned = report.scanned,
            unreferenced = report.unreferenced.len(),
            bytes = report.bytes_freed,
            dry_run,
            "gc finished"
        );
        Ok(report)
    }
}

fn prune_in(manifest: &mut Manifest, name: Option<&str>) -> Result<Vec<(String, usize)>> {
    let mut pruned = Vec::new();

    match name {
        Some(name) => {
            let dropped = manifest.get_mut(name)?.prune();
            if dropped > 0 {
                pruned.push((name.to_string(), dropped));
            }
        }
        None => {
            for (name, entry) in manifest.iter_mut() {
                let dropped = entry.prune();
                if dropped > 0 {
                    pruned.push((name.to_string(), dropped));
                }
            }
        }
    }

    Ok(pruned)
}
