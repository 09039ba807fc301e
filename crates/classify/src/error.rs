use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("No learned pattern for merchant token '{0}'")]
    NotFound(String),
    #[error("Invalid keyword table: {0}")]
    Config(#[from] toml::de::Error),
}

/// Failure of the external research fallback. Downgraded to an unknown
/// classification by the engine; never returned to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResearchError {
    #[error("research timed out")]
    Timeout,
    #[error("research found nothing")]
    NoData,
    #[error("research unavailable: {0}")]
    Unavailable(String),
}
