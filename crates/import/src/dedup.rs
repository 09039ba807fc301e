//! Splits incoming candidates into new rows and duplicates of rows already
//! stored, keyed by (merchant token, amount, operation date).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tally_core::{IdentityKey, Money, Transaction, TransactionId};

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub to_insert: Vec<Transaction>,
    pub duplicates: Vec<Transaction>,
}

pub struct DedupEngine {
    /// Amounts at most this far apart are treated as equal.
    pub amount_tolerance: Decimal,
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(1, 2),
        }
    }
}

impl DedupEngine {
    pub fn new(amount_tolerance: Decimal) -> Self {
        Self { amount_tolerance }
    }

    /// Candidates are expected to be normalized and date-reconciled already.
    /// Keys of accepted candidates join the working set, so repeats inside
    /// the same batch are caught too.
    pub fn partition(&self, candidates: Vec<Transaction>, existing: &[Transaction]) -> Partition {
        let mut seen = KeySet::new(self.amount_tolerance);
        for tx in existing {
            seen.insert(tx.identity_key());
        }

        let mut out = Partition::default();
        for tx in candidates {
            let key = tx.identity_key();
            if seen.contains(&key) {
                out.duplicates.push(tx);
            } else {
                seen.insert(key);
                out.to_insert.push(tx);
            }
        }
        out
    }

    /// Pairs of (kept, duplicate) ids inside an already stored set; the first
    /// occurrence in slice order is kept.
    pub fn find_duplicates(&self, transactions: &[Transaction]) -> Vec<(TransactionId, TransactionId)> {
        let mut kept: HashMap<(String, NaiveDate), Vec<(i64, TransactionId)>> = HashMap::new();
        let mut pairs = Vec::new();

        for tx in transactions {
            let key = tx.identity_key();
            let bucket = kept.entry((key.merchant_token, key.date)).or_default();
            match bucket
                .iter()
                .find(|(cents, _)| amounts_match(*cents, key.amount_cents, self.amount_tolerance))
            {
                Some((_, original)) => pairs.push((*original, tx.id)),
                None => bucket.push((key.amount_cents, tx.id)),
            }
        }
        pairs
    }
}

/// Identity keys bucketed by (token, date); amounts inside a bucket are
/// compared with the tolerance rather than hashed.
struct KeySet {
    tolerance: Decimal,
    buckets: HashMap<(String, NaiveDate), Vec<i64>>,
}

impl KeySet {
    fn new(tolerance: Decimal) -> Self {
        Self {
            tolerance,
            buckets: HashMap::new(),
        }
    }

    fn insert(&mut self, key: IdentityKey) {
        self.buckets
            .entry((key.merchant_token, key.date))
            .or_default()
            .push(key.amount_cents);
    }

    fn contains(&self, key: &IdentityKey) -> bool {
        self.buckets
            .get(&(key.merchant_token.clone(), key.date))
            .is_some_and(|amounts| {
                amounts
                    .iter()
                    .any(|cents| amounts_match(*cents, key.amount_cents, self.tolerance))
            })
    }
}

fn amounts_match(a_cents: i64, b_cents: i64, tolerance: Decimal) -> bool {
    Money::from_cents(a_cents).approx_eq(Money::from_cents(b_cents), tolerance)
}
