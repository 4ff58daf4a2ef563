//! Routing of original source records into the found / not-found outputs
//!
//! Classification works on lightweight intervals; the reconciler re-reads each query
//! file once and decides, record by record, which output the original line goes to.

use crate::dispatch::FileClassification;
use crate::error::SvError;
use crate::vcf::{RawRecord, VcfHeader, VcfReader};
use crate::variant::{IdentityKey, RecordId};
use crate::writer::Partition;
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

/// How a re-scanned record is matched against the classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Match on the file-local record ordinal; duplicate coordinates cannot collide
    #[default]
    RecordId,
    /// Match on `(chromosome, start, end)`. When several records share a key, the
    /// decision of the last one in file order applies to all of them.
    Coordinates,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatchKey {
    Id(RecordId),
    Coordinates(IdentityKey),
}

/// Disjoint key sets derived from one file's classification
struct PartitionKeys {
    found: FxHashSet<MatchKey>,
    not_found: FxHashSet<MatchKey>,
    excluded: FxHashSet<RecordId>,
}

/// Per-file routing counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub found: usize,
    pub not_found: usize,
    pub excluded: usize,
    pub mismatched: usize,
}

pub struct Reconciler {
    strategy: MatchStrategy,
}

impl Reconciler {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    fn partition_keys(&self, file: &FileClassification) -> PartitionKeys {
        let (found, not_found) = match self.strategy {
            MatchStrategy::RecordId => (
                file.result.found.iter().map(|v| MatchKey::Id(v.id)).collect(),
                file.result.not_found.iter().map(|v| MatchKey::Id(v.id)).collect(),
            ),
            MatchStrategy::Coordinates => {
                // Replay decisions in file order so later records overwrite earlier ones
                let mut decisions: Vec<(RecordId, IdentityKey, bool)> = file
                    .result
                    .found
                    .iter()
                    .map(|v| (v.id, v.interval.identity_key(), true))
                    .chain(
                        file.result
                            .not_found
                            .iter()
                            .map(|v| (v.id, v.interval.identity_key(), false)),
                    )
                    .collect();
                decisions.sort_by_key(|(id, _, _)| *id);

                let mut last_decision: FxHashMap<IdentityKey, bool> = FxHashMap::default();
                for (_, key, found) in decisions {
                    last_decision.insert(key, found);
                }

                let mut found = FxHashSet::default();
                let mut not_found = FxHashSet::default();
                for (key, is_found) in last_decision {
                    if is_found {
                        found.insert(MatchKey::Coordinates(key));
                    } else {
                        not_found.insert(MatchKey::Coordinates(key));
                    }
                }
                (found, not_found)
            }
        };

        PartitionKeys {
            found,
            not_found,
            excluded: file.excluded.iter().copied().collect(),
        }
    }

    fn key_of(&self, record: &RawRecord) -> Option<MatchKey> {
        match self.strategy {
            MatchStrategy::RecordId => Some(MatchKey::Id(record.id)),
            MatchStrategy::Coordinates => record
                .decode()
                .ok()
                .map(|decoded| MatchKey::Coordinates(decoded.interval.identity_key())),
        }
    }

    /// Re-scan the source of `file` once and hand every classified record to `emit`
    /// together with its partition. Excluded records are skipped; records that match
    /// neither partition are logged and dropped.
    pub fn reconcile<F>(&self, file: &FileClassification, emit: F) -> Result<ReconcileStats, SvError>
    where
        F: FnMut(Partition, &VcfHeader, &RawRecord),
    {
        let reader =
            VcfReader::from_path(&file.path).map_err(|e| SvError::per_file(&file.path, e))?;
        self.reconcile_reader(file, reader, emit)
    }

    /// Route the records of an already opened re-scan of `file`
    pub fn reconcile_reader<F>(
        &self,
        file: &FileClassification,
        reader: VcfReader,
        mut emit: F,
    ) -> Result<ReconcileStats, SvError>
    where
        F: FnMut(Partition, &VcfHeader, &RawRecord),
    {
        let keys = self.partition_keys(file);
        let header = reader.header().clone();

        let mut stats = ReconcileStats::default();
        for record in reader {
            let record = record.map_err(|e| SvError::per_file(&file.path, e))?;
            if keys.excluded.contains(&record.id) {
                stats.excluded += 1;
                continue;
            }

            let partition = self.key_of(&record).and_then(|key| {
                if keys.found.contains(&key) {
                    Some(Partition::Found)
                } else if keys.not_found.contains(&key) {
                    Some(Partition::NotFound)
                } else {
                    None
                }
            });

            let Some(partition) = partition else {
                stats.mismatched += 1;
                warn!(
                    "{}",
                    SvError::ReconciliationMismatch {
                        path: file.path.clone(),
                        record: record.id.0,
                    }
                );
                continue;
            };

            match partition {
                Partition::Found => stats.found += 1,
                Partition::NotFound => stats.not_found += 1,
            }
            emit(partition, &header, &record);
        }

        debug!(
            "Reconciled '{}': {} found, {} not found, {} excluded, {} mismatched",
            file.path.display(),
            stats.found,
            stats.not_found,
            stats.excluded,
            stats.mismatched
        );
        Ok(stats)
    }
}
