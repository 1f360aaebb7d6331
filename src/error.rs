use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::size::SizeError;

/// Invalid run parameters. Always raised before any I/O takes place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The chunk size expression could not be parsed.
    #[error("invalid chunk size: {0}")]
    InvalidSize(#[from] SizeError),

    /// A chunk size of zero bytes was requested.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// The zero-padding width of entry names is out of range.
    #[error("suffix length must be between 1 and {max}, got {width}")]
    SuffixWidth { width: usize, max: usize },

    /// A basename-qualified naming mode was requested without a basename.
    #[error("basename naming requires a non-empty base name")]
    MissingBaseName,

    /// The in-memory chunk limit was set to zero.
    #[error("memory limit must be greater than zero")]
    ZeroMemoryLimit,
}

/// The primary error type for a split run.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The run parameters were rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Opening or creating a source or target path failed.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io { source: io::Error, path: PathBuf },

    /// The source failed with something other than a clean end-of-stream.
    #[error("failed to read next chunk from source: {0}")]
    SourceRead(#[source] io::Error),

    /// Staging a chunk in its spill file failed.
    #[error("failed to stage chunk in spill file: {0}")]
    Buffer(#[source] io::Error),

    /// Writing the header or the body of an entry failed.
    #[error("failed to write entry {entry} to archive: {source}")]
    TargetWrite { entry: String, source: io::Error },

    /// The archive accepted fewer (or more) body bytes than the entry holds.
    #[error("bytes written to entry {entry} ({written}) do not equal expected count ({expected})")]
    ShortWrite { entry: String, expected: u64, written: u64 },

    /// Finalizing the archive failed.
    #[error("failed to finalize archive: {0}")]
    Close(#[source] io::Error),

    /// The run failed and finalizing the archive failed as well.
    #[error("{run}; additionally: {close}")]
    Composite { run: Box<SplitError>, close: Box<SplitError> },
}

impl SplitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SplitError::Io { source, path: path.into() }
    }

    /// Combines the outcome of the run with the outcome of finalizing the target.
    pub(crate) fn compose<T>(run: Result<T, SplitError>, close: Result<(), SplitError>) -> Result<T, SplitError> {
        match (run, close) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(run), Ok(())) => Err(run),
            (Ok(_), Err(close)) => Err(close),
            (Err(run), Err(close)) => Err(SplitError::Composite {
                run: Box::new(run),
                close: Box::new(close),
            }),
        }
    }
}

impl From<SizeError> for SplitError {
    fn from(err: SizeError) -> Self {
        SplitError::Config(ConfigError::InvalidSize(err))
    }
}
