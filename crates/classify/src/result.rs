use serde::{Deserialize, Serialize};
use tally_core::{ExpenseType, Transaction};

/// Which step of the chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    LearnedPattern,
    Keyword,
    Research,
    Unknown,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::LearnedPattern => write!(f, "learned_pattern"),
            Source::Keyword => write!(f, "keyword"),
            Source::Research => write!(f, "research"),
            Source::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tag: Option<String>,
    pub expense_type: Option<ExpenseType>,
    /// In [0, 1].
    pub confidence: f64,
    pub explanation: String,
    /// Runner-up tags, best first, never containing `tag`.
    pub alternatives: Vec<String>,
    pub used_external: bool,
    pub source: Source,
}

impl ClassificationResult {
    pub fn unknown(explanation: impl Into<String>) -> Self {
        Self {
            tag: None,
            expense_type: None,
            confidence: 0.0,
            explanation: explanation.into(),
            alternatives: Vec::new(),
            used_external: false,
            source: Source::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.tag.is_none()
    }

    /// Appends alternatives, skipping the chosen tag and repeats.
    pub fn push_alternatives<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if self.tag.as_deref() != Some(tag.as_str()) && !self.alternatives.contains(&tag) {
                self.alternatives.push(tag);
            }
        }
    }

    /// Adds the suggested tag and fills the expense type when it is unset.
    /// Returns true when the transaction changed.
    pub fn apply_to(&self, tx: &mut Transaction) -> bool {
        let Some(tag) = &self.tag else {
            return false;
        };
        let mut changed = tx.add_tag(tag);
        if tx.expense_type.is_none() && self.expense_type.is_some() {
            tx.expense_type = self.expense_type;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::Money;

    fn result(tag: &str) -> ClassificationResult {
        ClassificationResult {
            tag: Some(tag.to_string()),
            expense_type: Some(ExpenseType::Fixed),
            confidence: 0.7,
            explanation: "test".into(),
            alternatives: Vec::new(),
            used_external: false,
            source: Source::Keyword,
        }
    }

    #[test]
    fn alternatives_skip_chosen_and_repeats() {
        let mut r = result("telecom");
        r.push_alternatives(["telecom", "internet", "internet", "mobile"]);
        assert_eq!(r.alternatives, vec!["internet", "mobile"]);
    }

    #[test]
    fn apply_keeps_existing_expense_type() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut tx = Transaction::new(date, "PRLV SEPA ORANGE", Money::from_cents(-3999));
        tx.expense_type = Some(ExpenseType::Variable);

        assert!(result("telecom").apply_to(&mut tx));
        assert!(tx.tags.contains("telecom"));
        assert_eq!(tx.expense_type, Some(ExpenseType::Variable));
        assert!(!result("telecom").apply_to(&mut tx));
    }

    #[test]
    fn unknown_changes_nothing() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut tx = Transaction::new(date, "???", Money::from_cents(-100));
        assert!(!ClassificationResult::unknown("nothing matched").apply_to(&mut tx));
        assert!(!tx.is_tagged());
    }
}
