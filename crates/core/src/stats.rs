use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::money::Money;
use super::transaction::{ExpenseType, Transaction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseTypeDistribution {
    pub fixed: u32,
    pub variable: u32,
    pub unset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub transaction_count: u32,
    pub total_amount: Money,
    pub expense_types: ExpenseTypeDistribution,
    pub last_used: NaiveDate,
}

/// Aggregates per-tag totals over classified, non-excluded transactions.
/// A transaction carrying several tags counts toward each of them.
pub fn tag_statistics<'a, I>(transactions: I) -> BTreeMap<String, TagStats>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut stats: BTreeMap<String, TagStats> = BTreeMap::new();

    for tx in transactions.into_iter().filter(|t| !t.excluded) {
        for tag in &tx.tags {
            let entry = stats.entry(tag.clone()).or_insert_with(|| TagStats {
                transaction_count: 0,
                total_amount: Money::zero(),
                expense_types: ExpenseTypeDistribution::default(),
                last_used: tx.operation_date(),
            });
            entry.transaction_count += 1;
            entry.total_amount = entry.total_amount + tx.amount;
            match tx.expense_type {
                Some(ExpenseType::Fixed) => entry.expense_types.fixed += 1,
                Some(ExpenseType::Variable) => entry.expense_types.variable += 1,
                None => entry.expense_types.unset += 1,
            }
            entry.last_used = entry.last_used.max(tx.operation_date());
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(d: u32, label: &str, cents: i64, tag: &str, et: Option<ExpenseType>) -> Transaction {
        let mut t = Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
            label,
            Money::from_cents(cents),
        );
        t.add_tag(tag);
        t.expense_type = et;
        t
    }

    #[test]
    fn aggregates_per_tag() {
        let txs = vec![
            tx(3, "FRANPRIX", -1250, "groceries", Some(ExpenseType::Variable)),
            tx(9, "MONOPRIX", -3000, "groceries", None),
            tx(5, "NETFLIX", -1399, "subscription", Some(ExpenseType::Fixed)),
        ];
        let stats = tag_statistics(&txs);
        let g = &stats["groceries"];
        assert_eq!(g.transaction_count, 2);
        assert_eq!(g.total_amount.to_cents(), -4250);
        assert_eq!(g.expense_types.variable, 1);
        assert_eq!(g.expense_types.unset, 1);
        assert_eq!(g.last_used, NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());
        assert_eq!(stats["subscription"].expense_types.fixed, 1);
    }

    #[test]
    fn excluded_and_untagged_are_skipped() {
        let mut hidden = tx(3, "TRANSFER", -50000, "savings", None);
        hidden.excluded = true;
        let untagged = Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            "MYSTERY",
            Money::from_cents(-100),
        );
        let stats = tag_statistics(&[hidden, untagged]);
        assert!(stats.is_empty());
    }
}
