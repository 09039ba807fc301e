use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A row-level problem. Accumulated as a warning; never aborts an import.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("row {row}: no mappable date or amount")]
    MissingDateAndAmount { row: usize },
    #[error("row {row}: missing date")]
    MissingDate { row: usize },
    #[error("row {row}: missing amount")]
    MissingAmount { row: usize },
    #[error("row {row}: invalid date '{value}'")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: invalid amount '{value}'")]
    InvalidAmount { row: usize, value: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transaction not found: {0}")]
    NotFound(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}
