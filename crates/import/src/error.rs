use tally_core::StoreError;
use thiserror::Error;

use crate::pipeline::ImportId;

/// File- and pipeline-level failures. Row-level problems are reported as
/// [`tally_core::ValidationError`] warnings instead.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unsupported file format: {0}")]
    FormatUnsupported(String),
    #[error("Unknown import: {0}")]
    NotFound(ImportId),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Document error: {0}")]
    Document(String),
    #[error("No header row with recognizable columns")]
    MissingHeader,
    #[error("No data rows")]
    NoDataRows,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
