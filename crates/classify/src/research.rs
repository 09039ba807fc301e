use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_core::{ExpenseType, Money};

use crate::error::ResearchError;

/// What an external lookup learned about a merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFinding {
    pub tag: String,
    #[serde(default)]
    pub expense_type: Option<ExpenseType>,
    pub confidence: f64,
    /// Short human-readable description of the source.
    pub summary: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Slow, fallible merchant lookup used as the last step of classification.
/// Callers bound every call with a timeout.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    /// Stable identifier, part of the cache key.
    fn id(&self) -> &str;

    /// False when there is nothing to call; the research step is skipped.
    fn is_configured(&self) -> bool {
        true
    }

    async fn research(&self, merchant_token: &str, amount: Money) -> Result<ResearchFinding, ResearchError>;
}

/// Provider used when no external service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResearch;

#[async_trait]
impl ResearchProvider for NoResearch {
    fn id(&self) -> &str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn research(&self, _merchant_token: &str, _amount: Money) -> Result<ResearchFinding, ResearchError> {
        Err(ResearchError::Unavailable("no research provider configured".into()))
    }
}
