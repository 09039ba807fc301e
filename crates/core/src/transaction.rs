use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use super::money::Money;
use super::normalize::normalize;
use super::period::MonthBucket;
use super::reconcile::{reconcile, Reconciliation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TransactionId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseType {
    /// Recurring or contractual.
    Fixed,
    /// Discretionary.
    Variable,
}

impl fmt::Display for ExpenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseType::Fixed => write!(f, "FIXED"),
            ExpenseType::Variable => write!(f, "VARIABLE"),
        }
    }
}

impl std::str::FromStr for ExpenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "fixe" => Ok(ExpenseType::Fixed),
            "variable" => Ok(ExpenseType::Variable),
            other => Err(format!("Unknown expense type: '{other}'")),
        }
    }
}

/// Composite key deciding whether two records are the same bank movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub merchant_token: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
}

/// One bank movement.
///
/// The operation date is private so the month bucket can never drift from it:
/// [`Transaction::month`] is always derived and every writer goes through
/// [`Transaction::set_operation_date`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    operation_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub label: String,
    pub amount: Money,
    pub tags: BTreeSet<String>,
    pub expense_type: Option<ExpenseType>,
    pub excluded: bool,
    pub category: Option<String>,
    pub category_parent: Option<String>,
    pub account: Option<String>,
    pub comment: Option<String>,
}

impl Transaction {
    pub fn new(operation_date: NaiveDate, label: &str, amount: Money) -> Self {
        Transaction {
            id: TransactionId::new(),
            operation_date,
            value_date: None,
            label: label.to_string(),
            amount,
            tags: BTreeSet::new(),
            expense_type: None,
            excluded: false,
            category: None,
            category_parent: None,
            account: None,
            comment: None,
        }
    }

    pub fn operation_date(&self) -> NaiveDate {
        self.operation_date
    }

    pub fn month(&self) -> MonthBucket {
        MonthBucket::of(self.operation_date)
    }

    /// Returns true when the date actually changed.
    pub fn set_operation_date(&mut self, date: NaiveDate) -> bool {
        let changed = self.operation_date != date;
        self.operation_date = date;
        changed
    }

    /// Applies the label-embedded date, if any, over the structured date.
    pub fn reconcile_date(&mut self) -> Reconciliation {
        let outcome = reconcile(self.operation_date, &self.label);
        if outcome.changed {
            self.set_operation_date(outcome.effective_date);
        }
        outcome
    }

    pub fn merchant_token(&self) -> String {
        normalize(&self.label)
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            merchant_token: self.merchant_token(),
            amount_cents: self.amount.to_cents(),
            date: self.operation_date,
        }
    }

    /// Tags are stored lower-cased and trimmed; blank tags are ignored.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        self.tags.insert(tag)
    }

    /// Replaces the tag set with a single corrected tag.
    pub fn retag(&mut self, tag: &str, expense_type: Option<ExpenseType>) {
        self.tags.clear();
        self.add_tag(tag);
        self.expense_type = expense_type;
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }
}
