use std::path::PathBuf;
use thiserror::Error;

use crate::record::ContractorRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid delimiter {0:?}: quotes cannot be used as field separators")]
    InvalidDelimiter(char),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Result of loading a CSV file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvLoad {
    /// Records in file order
    pub records: Vec<ContractorRecord>,
    /// Data rows dropped because they could not be mapped
    pub failed_rows: usize,
}

impl CsvLoad {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Notified after the pending CSV has been moved away, so the producer
/// writing it can recreate the file and its header.
pub trait FileResetHook: Send + Sync {
    fn reset_file(&self);
}
