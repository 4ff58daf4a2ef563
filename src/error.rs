use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying structural variants against a reference catalog.
///
/// `Load` and `InvalidConfig` abort a run before any work is dispatched. `EmptyInput`
/// ends it early without being a failure. Everything else is scoped to a single
/// file or record and only shows up in the final report.
#[derive(Debug, Error)]
pub enum SvError {
    #[error("failed to load reference '{}': {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("no query files with extension '.{extension}' found in '{}'", dir.display())]
    EmptyInput { dir: PathBuf, extension: String },

    #[error("failed to process '{}': {reason}", path.display())]
    PerFile { path: PathBuf, reason: String },

    #[error("record {record} of '{}' matches neither the found nor the not-found set", path.display())]
    ReconciliationMismatch { path: PathBuf, record: u64 },

    #[error("failed to write record {record} of '{}' to '{}': {reason}", source_path.display(), output.display())]
    Write {
        output: PathBuf,
        source_path: PathBuf,
        record: u64,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SvError {
    pub fn per_file(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SvError::PerFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SvError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a single VCF data line could not be turned into an interval.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected at least 8 tab-separated columns, found {0}")]
    NotEnoughFields(usize),
    #[error("invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("coordinate {0} does not fit in a 32-bit position")]
    CoordinateOverflow(i64),
    #[error("line is not valid UTF-8 (first invalid byte at offset {0})")]
    InvalidUtf8(usize),
}
