use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::{ExpenseType, Money, Transaction, TransactionId};

use crate::db::{decode_error, DbPool};

type TransactionRow = (
    String,
    NaiveDate,
    Option<NaiveDate>,
    String,
    String,
    String,
    Option<String>,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str = "SELECT id, operation_date, value_date, label, amount, tags, expense_type, \
     excluded, category, category_parent, account, comment FROM transactions";

/// Inserts the batch inside one SQL transaction: either every row is written
/// or none is.
pub async fn insert_transactions(pool: &DbPool, batch: &[Transaction]) -> Result<usize, sqlx::Error> {
    let mut db_tx = pool.begin().await?;
    for tx in batch {
        sqlx::query(
            "INSERT INTO transactions (id, operation_date, month_bucket, value_date, label, amount, tags, \
             expense_type, excluded, category, category_parent, account, comment) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tx.id.to_string())
        .bind(tx.operation_date())
        .bind(tx.month().to_string())
        .bind(tx.value_date)
        .bind(&tx.label)
        .bind(tx.amount.as_decimal().to_string())
        .bind(tags_json(tx)?)
        .bind(tx.expense_type.map(|e| e.to_string()))
        .bind(tx.excluded)
        .bind(&tx.category)
        .bind(&tx.category_parent)
        .bind(&tx.account)
        .bind(&tx.comment)
        .execute(&mut *db_tx)
        .await?;
    }
    db_tx.commit().await?;
    Ok(batch.len())
}

/// All transactions by operation date, then insertion order.
pub async fn all_transactions(pool: &DbPool) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_COLUMNS} ORDER BY operation_date, rowid"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(from_row).collect()
}

pub async fn transactions_in_month(pool: &DbPool, month_bucket: &str) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "{SELECT_COLUMNS} WHERE month_bucket = ? ORDER BY operation_date, rowid"
    ))
    .bind(month_bucket)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(from_row).collect()
}

pub async fn get_transaction(pool: &DbPool, id: TransactionId) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(from_row).transpose()
}

/// Rewrites every mutable column. The month bucket is recomputed from the
/// operation date in the same statement. Returns false for an unknown id.
pub async fn update_transaction(pool: &DbPool, tx: &Transaction) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET operation_date = ?, month_bucket = ?, value_date = ?, label = ?, \
         amount = ?, tags = ?, expense_type = ?, excluded = ?, category = ?, category_parent = ?, \
         account = ?, comment = ? WHERE id = ?",
    )
    .bind(tx.operation_date())
    .bind(tx.month().to_string())
    .bind(tx.value_date)
    .bind(&tx.label)
    .bind(tx.amount.as_decimal().to_string())
    .bind(tags_json(tx)?)
    .bind(tx.expense_type.map(|e| e.to_string()))
    .bind(tx.excluded)
    .bind(&tx.category)
    .bind(&tx.category_parent)
    .bind(&tx.account)
    .bind(&tx.comment)
    .bind(tx.id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_transactions(pool: &DbPool, ids: &[TransactionId]) -> Result<usize, sqlx::Error> {
    let mut db_tx = pool.begin().await?;
    let mut deleted = 0;
    for id in ids {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *db_tx)
            .await?;
        deleted += result.rows_affected() as usize;
    }
    db_tx.commit().await?;
    Ok(deleted)
}

fn tags_json(tx: &Transaction) -> Result<String, sqlx::Error> {
    serde_json::to_string(&tx.tags).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn from_row(r: TransactionRow) -> Result<Transaction, sqlx::Error> {
    let id = TransactionId::from_str(&r.0).map_err(|e| decode_error("id", &r.0, e))?;
    let amount = Decimal::from_str(&r.4).map_err(|e| decode_error("amount", &r.4, e))?;
    let tags: Vec<String> = serde_json::from_str(&r.5).map_err(|e| decode_error("tags", &r.5, e))?;
    let expense_type = r
        .6
        .as_deref()
        .map(|s| ExpenseType::from_str(s).map_err(|e| decode_error("expense_type", s, e)))
        .transpose()?;

    let mut tx = Transaction::new(r.1, &r.3, Money::from_decimal(amount));
    tx.id = id;
    tx.value_date = r.2;
    for tag in &tags {
        tx.add_tag(tag);
    }
    tx.expense_type = expense_type;
    tx.excluded = r.7 != 0;
    tx.category = r.8;
    tx.category_parent = r.9;
    tx.account = r.10;
    tx.comment = r.11;
    Ok(tx)
}
