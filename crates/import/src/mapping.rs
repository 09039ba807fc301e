//! Maps source columns onto the canonical transaction fields and turns grid
//! rows into transactions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_core::{Money, ReconcileKind, Transaction, ValidationError};
use tracing::debug;

use crate::error::ImportError;
use crate::util::{normalize_key, parse_amount, parse_date};

/// How many leading rows are searched for a header (banks prepend account
/// summaries before the table).
const HEADER_SCAN_ROWS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OperationDate,
    ValueDate,
    Label,
    Category,
    CategoryParent,
    Amount,
    Debit,
    Credit,
    Account,
    Comment,
}

struct AliasSpec {
    field: CanonicalField,
    aliases: &'static [&'static str],
}

// Compared after `normalize_key`, so spelling here is already folded.
const ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: CanonicalField::OperationDate,
        aliases: &[
            "dateop", "dateoperation", "datedoperation", "date", "operationdate",
            "transactiondate", "datetransaction", "bookingdate", "datecompta",
            "datedecomptabilisation",
        ],
    },
    AliasSpec {
        field: CanonicalField::ValueDate,
        aliases: &["dateval", "datevaleur", "datedevaleur", "valuedate"],
    },
    AliasSpec {
        field: CanonicalField::Label,
        aliases: &[
            "label", "libelle", "libelleoperation", "libellesimplifie", "description",
            "wording", "intitule", "details",
        ],
    },
    AliasSpec {
        field: CanonicalField::Category,
        aliases: &["category", "categorie"],
    },
    AliasSpec {
        field: CanonicalField::CategoryParent,
        aliases: &["categoryparent", "categorieparent", "parentcategory"],
    },
    AliasSpec {
        field: CanonicalField::Amount,
        aliases: &["amount", "montant", "montanteur", "montanteuros", "somme"],
    },
    AliasSpec {
        field: CanonicalField::Debit,
        aliases: &["debit", "debiteur", "debiteuros", "withdrawal"],
    },
    AliasSpec {
        field: CanonicalField::Credit,
        aliases: &["credit", "crediteur", "crediteuros", "deposit"],
    },
    AliasSpec {
        field: CanonicalField::Account,
        aliases: &["accountnum", "accountlabel", "account", "compte", "numerodecompte"],
    },
    AliasSpec {
        field: CanonicalField::Comment,
        aliases: &["comment", "commentaire", "memo", "note", "notes"],
    },
];

/// Column index per canonical field for one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Self {
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for (idx, cell) in header.iter().enumerate() {
            let key = normalize_key(cell);
            if !key.is_empty() {
                by_key.entry(key).or_insert(idx);
            }
        }

        let mut columns = HashMap::new();
        for spec in ALIAS_SPECS {
            if let Some(idx) = spec.aliases.iter().find_map(|a| by_key.get(*a)) {
                columns.insert(spec.field, *idx);
            }
        }
        ColumnMap { columns }
    }

    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    fn has_date(&self) -> bool {
        self.get(CanonicalField::OperationDate).is_some()
            || self.get(CanonicalField::ValueDate).is_some()
    }

    fn has_amount(&self) -> bool {
        self.get(CanonicalField::Amount).is_some()
            || self.get(CanonicalField::Debit).is_some()
            || self.get(CanonicalField::Credit).is_some()
    }

    /// A usable header names at least two fields, one of them a date or an amount.
    fn is_usable(&self) -> bool {
        self.columns.len() >= 2 && (self.has_date() || self.has_amount())
    }

    fn cell<'a>(&self, row: &'a [String], field: CanonicalField) -> Option<&'a str> {
        self.get(field)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Locates the header row among the first rows of the grid.
pub fn find_header(rows: &[Vec<String>]) -> Option<(usize, ColumnMap)> {
    rows.iter()
        .take(HEADER_SCAN_ROWS)
        .enumerate()
        .map(|(idx, row)| (idx, ColumnMap::from_header(row)))
        .find(|(_, map)| map.is_usable())
}

/// Outcome of mapping a grid: accepted transactions plus per-row warnings.
#[derive(Debug, Default)]
pub struct MappedRows {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<ValidationError>,
    /// Rows whose structured date was overridden by the label date.
    pub reconciled: usize,
}

/// Maps every data row after the header. Row numbers in warnings are 1-based
/// positions in the source grid.
pub fn map_rows(rows: &[Vec<String>]) -> Result<MappedRows, ImportError> {
    let (header_idx, columns) = find_header(rows).ok_or(ImportError::MissingHeader)?;
    let mut out = MappedRows::default();

    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        match map_row(&columns, row, idx + 1) {
            Ok(mut tx) => {
                let outcome = tx.reconcile_date();
                if outcome.kind != ReconcileKind::Unchanged {
                    debug!(row = idx + 1, kind = ?outcome.kind, date = %outcome.effective_date, "label date applied");
                    out.reconciled += 1;
                }
                out.transactions.push(tx);
            }
            Err(warning) => {
                debug!("rejected {warning}");
                out.warnings.push(warning);
            }
        }
    }
    Ok(out)
}

fn map_row(columns: &ColumnMap, row: &[String], row_no: usize) -> Result<Transaction, ValidationError> {
    let date_raw = columns
        .cell(row, CanonicalField::OperationDate)
        .or_else(|| columns.cell(row, CanonicalField::ValueDate));
    let amount = row_amount(columns, row, row_no)?;

    let (date_raw, amount) = match (date_raw, amount) {
        (None, None) => return Err(ValidationError::MissingDateAndAmount { row: row_no }),
        (None, Some(_)) => return Err(ValidationError::MissingDate { row: row_no }),
        (Some(_), None) => return Err(ValidationError::MissingAmount { row: row_no }),
        (Some(d), Some(a)) => (d, a),
    };
    let date = parse_date(date_raw).ok_or_else(|| ValidationError::InvalidDate {
        row: row_no,
        value: date_raw.to_string(),
    })?;

    let label = columns.cell(row, CanonicalField::Label).unwrap_or_default();
    let text = |field| columns.cell(row, field).map(str::to_string);

    let mut tx = Transaction::new(date, label, Money::from_decimal(amount));
    tx.value_date = columns
        .cell(row, CanonicalField::ValueDate)
        .and_then(parse_date);
    tx.category = text(CanonicalField::Category);
    tx.category_parent = text(CanonicalField::CategoryParent);
    tx.account = text(CanonicalField::Account);
    tx.comment = text(CanonicalField::Comment);
    Ok(tx)
}

/// Signed amount from either a single amount column or a debit/credit pair.
/// `Ok(None)` means no amount cell was filled in.
fn row_amount(columns: &ColumnMap, row: &[String], row_no: usize) -> Result<Option<Decimal>, ValidationError> {
    let parse = |raw: &str| {
        parse_amount(raw).ok_or_else(|| ValidationError::InvalidAmount {
            row: row_no,
            value: raw.to_string(),
        })
    };

    if let Some(raw) = columns.cell(row, CanonicalField::Amount) {
        return parse(raw).map(Some);
    }

    let debit = columns.cell(row, CanonicalField::Debit).map(parse).transpose()?;
    let credit = columns.cell(row, CanonicalField::Credit).map(parse).transpose()?;
    Ok(match (debit, credit) {
        (None, None) => None,
        (d, c) => Some(c.unwrap_or_default().abs() - d.unwrap_or_default().abs()),
    })
}
