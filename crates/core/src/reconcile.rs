//! Reconciles a transaction's structured date with the point-of-sale date
//! embedded in its label. The label date is treated as ground truth.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn re_label_date() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\b(\d{2})/(\d{2})/(\d{2})\b").expect("invalid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileKind {
    /// No usable label date, or it already agrees.
    Unchanged,
    /// Structured day and month were transposed.
    Swapped,
    /// Label date differs in some other way and replaces the structured one.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub effective_date: NaiveDate,
    pub changed: bool,
    pub kind: ReconcileKind,
}

impl Reconciliation {
    fn unchanged(date: NaiveDate) -> Self {
        Reconciliation {
            effective_date: date,
            changed: false,
            kind: ReconcileKind::Unchanged,
        }
    }
}

/// Extracts the first `DD/MM/YY` date in `label`, if it is a real calendar date.
pub fn label_date(label: &str) -> Option<NaiveDate> {
    let caps = re_label_date().captures(label)?;
    let day = caps[1].parse::<u32>().ok()?;
    let month = caps[2].parse::<u32>().ok()?;
    let year = 2000 + caps[3].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn reconcile(structured: NaiveDate, label: &str) -> Reconciliation {
    let Some(from_label) = label_date(label) else {
        return Reconciliation::unchanged(structured);
    };
    if from_label == structured {
        return Reconciliation::unchanged(structured);
    }

    let swapped = structured.year() == from_label.year()
        && structured.month() == from_label.day()
        && structured.day() == from_label.month();

    Reconciliation {
        effective_date: from_label,
        changed: true,
        kind: if swapped {
            ReconcileKind::Swapped
        } else {
            ReconcileKind::Replaced
        },
    }
}
