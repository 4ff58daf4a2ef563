use crate::classify::Classifier;
use crate::error::SvError;
use crate::index::ChromosomeIndex;
use crate::vcf::{DecodedRecord, VcfHeader, VcfReader};
use crate::variant::{GenomicInterval, RecordId};
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default upper bound on the number of worker threads
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Optional pre-classification filters on query records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// Records below this QUAL, or without QUAL, are excluded
    pub min_quality: Option<f64>,
    /// Only records whose FILTER column is `PASS` are kept
    pub pass_only: bool,
    /// Records flagged `IMPRECISE` in INFO are excluded
    pub skip_imprecise: bool,
}

impl QueryFilter {
    pub fn accepts(&self, record: &DecodedRecord) -> bool {
        if self.pass_only && !record.passes_filter {
            return false;
        }
        if self.skip_imprecise && record.imprecise {
            return false;
        }
        match self.min_quality {
            Some(min) => record.interval.quality.is_some_and(|q| q >= min),
            None => true,
        }
    }
}

/// A query interval together with the id of the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVariant {
    pub id: RecordId,
    pub interval: GenomicInterval,
}

/// Intervals extracted from one query file
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    pub header: VcfHeader,
    pub variants: Vec<QueryVariant>,
    /// Records that could not be decoded or were rejected by the filter
    pub excluded: Vec<RecordId>,
}

impl QuerySet {
    pub fn load(path: &Path, filter: &QueryFilter) -> Result<Self, SvError> {
        let reader = VcfReader::from_path(path).map_err(|e| SvError::per_file(path, e))?;
        let header = reader.header().clone();

        let mut variants = Vec::new();
        let mut excluded = Vec::new();
        for record in reader {
            let record = record.map_err(|e| SvError::per_file(path, e))?;
            match record.decode() {
                Ok(decoded) if filter.accepts(&decoded) => variants.push(QueryVariant {
                    id: record.id,
                    interval: decoded.interval,
                }),
                Ok(_) => excluded.push(record.id),
                Err(e) => {
                    debug!(
                        "Excluding undecodable record {} of '{}': {}",
                        record.id,
                        path.display(),
                        e
                    );
                    excluded.push(record.id);
                }
            }
        }

        Ok(Self {
            header,
            variants,
            excluded,
        })
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Strict partition of a query set into found and not-found variants
#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    pub found: Vec<QueryVariant>,
    pub not_found: Vec<QueryVariant>,
}

impl ClassificationResult {
    pub fn len(&self) -> usize {
        self.found.len() + self.not_found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the coordinator needs from one successfully classified file
#[derive(Debug, Clone)]
pub struct FileClassification {
    pub path: PathBuf,
    pub header: VcfHeader,
    pub result: ClassificationResult,
    pub excluded: Vec<RecordId>,
}

/// Shared flag asking workers not to start any further file
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-file classification work against a shared, read-only index
pub struct Worker {
    index: Arc<ChromosomeIndex>,
    classifier: Classifier,
    filter: QueryFilter,
}

impl Worker {
    pub fn new(index: Arc<ChromosomeIndex>, classifier: Classifier, filter: QueryFilter) -> Self {
        Self {
            index,
            classifier,
            filter,
        }
    }

    pub fn classify_set(&self, query_set: &QuerySet) -> ClassificationResult {
        let (found, not_found): (Vec<QueryVariant>, Vec<QueryVariant>) = query_set
            .variants
            .iter()
            .cloned()
            .partition(|variant| self.classifier.classify(&variant.interval, &self.index));
        ClassificationResult { found, not_found }
    }

    pub fn process_file(&self, path: &Path) -> Result<FileClassification, SvError> {
        let query_set = QuerySet::load(path, &self.filter)?;
        let result = self.classify_set(&query_set);
        debug!(
            "Classified '{}': {} found, {} not found, {} excluded",
            path.display(),
            result.found.len(),
            result.not_found.len(),
            query_set.excluded.len()
        );

        Ok(FileClassification {
            path: path.to_path_buf(),
            header: query_set.header,
            result,
            excluded: query_set.excluded,
        })
    }
}

/// Outcome of one dispatched file, successful or not
pub type FileOutcome = Result<FileClassification, SvError>;

/// Fans per-file classification out over a bounded thread pool
pub struct Dispatcher {
    worker: Worker,
    max_workers: usize,
    cancel: CancelToken,
}

impl Dispatcher {
    pub fn new(worker: Worker, max_workers: usize) -> Self {
        Self {
            worker,
            max_workers: max_workers.max(1),
            cancel: CancelToken::default(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Number of threads used for `num_files` files
    pub fn pool_size(&self, num_files: usize) -> usize {
        num_cpus::get()
            .min(num_files)
            .min(self.max_workers)
            .max(1)
    }

    fn run_one(&self, path: &Path) -> FileOutcome {
        if self.cancel.is_cancelled() {
            return Err(SvError::per_file(path, "cancelled before processing started"));
        }
        let outcome = self.worker.process_file(path);
        if let Err(e) = &outcome {
            warn!("{}", e);
        }
        outcome
    }

    /// Classify every file, returning outcomes in the order of `files`
    pub fn run(&self, files: &[PathBuf]) -> Result<Vec<FileOutcome>, SvError> {
        let num_threads = self.pool_size(files.len());
        if num_threads <= 1 {
            return Ok(self.run_sequential(files));
        }

        info!(
            "Classifying {} files with {} worker threads",
            files.len(),
            num_threads
        );
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("svref-worker-{i}"))
            .build()?;

        Ok(pool.install(|| files.par_iter().map(|path| self.run_one(path)).collect()))
    }

    pub fn run_sequential(&self, files: &[PathBuf]) -> Vec<FileOutcome> {
        info!("Classifying {} files sequentially", files.len());
        files.iter().map(|path| self.run_one(path)).collect()
    }
}
