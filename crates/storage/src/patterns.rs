use chrono::{DateTime, Utc};
use std::str::FromStr;
use tally_core::{ExpenseType, LearnedPattern, PatternOrigin};

use crate::db::{decode_error, DbPool};

type PatternRow = (String, String, Option<String>, f64, i64, DateTime<Utc>, String);

/// Upserts every pattern by merchant token in one SQL transaction.
pub async fn save_patterns(pool: &DbPool, patterns: &[LearnedPattern]) -> Result<usize, sqlx::Error> {
    let mut db_tx = pool.begin().await?;
    for p in patterns {
        sqlx::query(
            "INSERT INTO learned_patterns (merchant_token, tag, expense_type, confidence, usage_count, last_reinforced, origin) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(merchant_token) DO UPDATE SET tag = excluded.tag, expense_type = excluded.expense_type, \
             confidence = excluded.confidence, usage_count = excluded.usage_count, \
             last_reinforced = excluded.last_reinforced, origin = excluded.origin",
        )
        .bind(&p.merchant_token)
        .bind(&p.tag)
        .bind(p.expense_type.map(|e| e.to_string()))
        .bind(p.confidence)
        .bind(i64::from(p.usage_count))
        .bind(p.last_reinforced)
        .bind(p.origin.to_string())
        .execute(&mut *db_tx)
        .await?;
    }
    db_tx.commit().await?;
    Ok(patterns.len())
}

pub async fn load_patterns(pool: &DbPool) -> Result<Vec<LearnedPattern>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PatternRow>(
        "SELECT merchant_token, tag, expense_type, confidence, usage_count, last_reinforced, origin \
         FROM learned_patterns ORDER BY merchant_token",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| -> Result<LearnedPattern, sqlx::Error> {
            let expense_type = r
                .2
                .as_deref()
                .map(|s| ExpenseType::from_str(s).map_err(|e| decode_error("expense_type", s, e)))
                .transpose()?;
            let origin = PatternOrigin::from_str(&r.6).map_err(|e| decode_error("origin", &r.6, e))?;
            Ok(LearnedPattern {
                merchant_token: r.0,
                tag: r.1,
                expense_type,
                confidence: r.3,
                usage_count: u32::try_from(r.4).unwrap_or(u32::MAX),
                last_reinforced: r.5,
                origin,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_in_memory;

    fn pattern(token: &str, tag: &str, confidence: f64) -> LearnedPattern {
        LearnedPattern {
            merchant_token: token.to_string(),
            tag: tag.to_string(),
            expense_type: Some(ExpenseType::Fixed),
            confidence,
            usage_count: 3,
            last_reinforced: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            origin: PatternOrigin::UserCorrection,
        }
    }

    #[tokio::test]
    async fn patterns_round_trip() {
        let pool = create_in_memory().await.unwrap();
        let saved = vec![pattern("edf", "utilities", 0.72), pattern("netflix", "subscription", 0.9)];
        save_patterns(&pool, &saved).await.unwrap();
        assert_eq!(load_patterns(&pool).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn save_overwrites_by_token() {
        let pool = create_in_memory().await.unwrap();
        save_patterns(&pool, &[pattern("x", "a", 0.6)]).await.unwrap();
        save_patterns(&pool, &[pattern("x", "b", 0.6)]).await.unwrap();
        let loaded = load_patterns(&pool).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].tag, "b");
    }
}
