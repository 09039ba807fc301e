use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::ExpenseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternOrigin {
    Predefined,
    UserCorrection,
}

impl fmt::Display for PatternOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternOrigin::Predefined => write!(f, "PREDEFINED"),
            PatternOrigin::UserCorrection => write!(f, "USER_CORRECTION"),
        }
    }
}

impl std::str::FromStr for PatternOrigin {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREDEFINED" => Ok(PatternOrigin::Predefined),
            "USER_CORRECTION" => Ok(PatternOrigin::UserCorrection),
            other => Err(format!("Unknown pattern origin: '{other}'")),
        }
    }
}

/// A merchant token's learned tag association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub merchant_token: String,
    pub tag: String,
    pub expense_type: Option<ExpenseType>,
    /// Trust in the association, within `[0, 1]`.
    pub confidence: f64,
    pub usage_count: u32,
    pub last_reinforced: DateTime<Utc>,
    pub origin: PatternOrigin,
}
