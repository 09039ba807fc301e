use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use tally::AppContext;
use tally_core::{ExpenseType, Money, MonthBucket, TransactionId};
use tally_import::ImportFile;

pub async fn cmd_import(ctx: &AppContext, path: &Path, confirm: bool) -> Result<()> {
    let file = ImportFile::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let preview = ctx.analyze(&file).await?;

    println!("Import {} ({})", preview.import_id, preview.format);
    for month in &preview.detected_months {
        let new = preview.per_month_new_count.get(month).copied().unwrap_or(0);
        let dup = preview.per_month_duplicate_count.get(month).copied().unwrap_or(0);
        let marker = if preview.suggested_month == Some(*month) { "  <- suggested" } else { "" };
        println!("  {month}: {new} new, {dup} duplicate{marker}");
    }
    if preview.reconciled_dates > 0 {
        println!("  {} date(s) taken from the label", preview.reconciled_dates);
    }
    for warning in &preview.warnings {
        println!("  warning: {warning}");
    }

    if !confirm {
        println!("Dry run. Re-run with --confirm to insert.");
        return Ok(());
    }
    let result = ctx.confirm(preview.import_id).await?;
    println!(
        "Inserted {} transaction(s), skipped {} duplicate(s)",
        result.inserted_count, result.duplicate_count
    );
    Ok(())
}

pub async fn cmd_list(ctx: &AppContext, month: Option<&str>, untagged: bool) -> Result<()> {
    let month = month
        .map(|m| m.parse::<MonthBucket>().map_err(anyhow::Error::msg))
        .transpose()?;

    let rows = match month {
        Some(month) => ctx.transactions_in_month(month).await?,
        None => ctx.transactions().await?,
    };
    for tx in rows {
        if untagged && tx.is_tagged() {
            continue;
        }
        let tags = tx.tags.iter().cloned().collect::<Vec<_>>().join(",");
        let expense_type = tx.expense_type.map(|e| e.to_string()).unwrap_or_default();
        println!(
            "{}  {}  {:>10}  {:<40}  {}  {}",
            tx.id,
            tx.operation_date(),
            tx.amount.to_string(),
            tx.label,
            tags,
            expense_type
        );
    }
    Ok(())
}

pub async fn cmd_classify(ctx: &AppContext, label: &str, amount: Decimal) -> Result<()> {
    let result = ctx.classify(label, Money::from_decimal(amount)).await;
    match &result.tag {
        Some(tag) => println!("{tag} ({:.2}, {})", result.confidence, result.source),
        None => println!("unknown"),
    }
    if let Some(expense_type) = result.expense_type {
        println!("  expense type: {expense_type}");
    }
    println!("  {}", result.explanation);
    if !result.alternatives.is_empty() {
        println!("  alternatives: {}", result.alternatives.join(", "));
    }
    Ok(())
}

pub async fn cmd_correct(
    ctx: &AppContext,
    id: &str,
    tag: &str,
    expense_type: Option<ExpenseType>,
) -> Result<()> {
    let id: TransactionId = id.parse().with_context(|| format!("invalid transaction id '{id}'"))?;
    if tag.trim().is_empty() {
        bail!("tag must not be empty");
    }
    let pattern = ctx.correct(id, tag, expense_type).await?;
    println!(
        "'{}' -> {} (confidence {:.2}, seen {} time(s))",
        pattern.merchant_token, pattern.tag, pattern.confidence, pattern.usage_count
    );
    Ok(())
}

pub async fn cmd_tag_untagged(ctx: &AppContext) -> Result<()> {
    let tagged = ctx.tag_untagged().await?;
    println!("Tagged {tagged} transaction(s)");
    Ok(())
}

pub async fn cmd_dedup(ctx: &AppContext) -> Result<()> {
    let removed = ctx.remove_duplicates().await?;
    println!("Removed {removed} duplicate(s)");
    Ok(())
}

pub async fn cmd_stats(ctx: &AppContext) -> Result<()> {
    for (tag, stats) in ctx.tag_statistics().await? {
        let d = stats.expense_types;
        println!(
            "{tag:<20} {:>4} tx  {:>12}  fixed {} / variable {} / unset {}  last {}",
            stats.transaction_count, stats.total_amount.to_string(), d.fixed, d.variable, d.unset, stats.last_used
        );
    }
    Ok(())
}

pub fn cmd_patterns(ctx: &AppContext) -> Result<()> {
    for p in ctx.patterns() {
        let expense_type = p.expense_type.map(|e| e.to_string()).unwrap_or_default();
        println!(
            "{:<30} {:<16} {:<8} {:.2}  x{}  {}",
            p.merchant_token, p.tag, expense_type, p.confidence, p.usage_count, p.origin
        );
    }
    Ok(())
}
