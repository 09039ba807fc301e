use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{
    normalize, ExpenseType, LearnedPattern, Money, PatternOrigin, Settings, Transaction,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::keywords::KeywordClassifier;
use crate::pattern_store::PatternStore;
use crate::research::ResearchProvider;
use crate::result::ClassificationResult;
use crate::strategy::{KeywordStrategy, LearnedPatternStrategy, Query, ResearchStrategy, Strategy};

/// A user fixing the tag of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEvent {
    pub transaction_label: String,
    pub amount: Decimal,
    pub corrected_tag: String,
    pub corrected_expense_type: Option<ExpenseType>,
}

impl CorrectionEvent {
    pub fn for_transaction(tx: &Transaction, tag: &str, expense_type: Option<ExpenseType>) -> Self {
        Self {
            transaction_label: tx.label.clone(),
            amount: tx.amount.as_decimal(),
            corrected_tag: tag.to_string(),
            corrected_expense_type: expense_type,
        }
    }

    /// Replaces the transaction's tags with the corrected one.
    pub fn apply_to(&self, tx: &mut Transaction) {
        tx.retag(&self.corrected_tag, self.corrected_expense_type);
    }
}

struct Inner {
    patterns: Arc<PatternStore>,
    chain: Vec<Box<dyn Strategy>>,
    trusted_threshold: f64,
    batch_concurrency: usize,
}

/// Runs the strategy chain: learned patterns, then keywords, then external
/// research. The first result at or above the trusted threshold wins; weaker
/// results only contribute alternatives. Cheap to clone.
#[derive(Clone)]
pub struct ClassificationEngine {
    inner: Arc<Inner>,
}

impl ClassificationEngine {
    pub fn new(
        settings: &Settings,
        patterns: Arc<PatternStore>,
        keywords: KeywordClassifier,
        research: Arc<dyn ResearchProvider>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        let chain: Vec<Box<dyn Strategy>> = vec![
            Box::new(LearnedPatternStrategy::new(Arc::clone(&patterns))),
            Box::new(KeywordStrategy::new(keywords, settings.classify.keyword_confidence)),
            Box::new(ResearchStrategy::new(
                research,
                cache,
                Duration::from_millis(settings.classify.research_timeout_ms),
                chrono::Duration::try_seconds(settings.cache.ttl_secs).unwrap_or(chrono::Duration::MAX),
            )),
        ];
        Self::with_chain(settings, patterns, chain)
    }

    /// Builds an engine over an explicit strategy chain, evaluated in order.
    pub fn with_chain(settings: &Settings, patterns: Arc<PatternStore>, chain: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                patterns,
                chain,
                trusted_threshold: settings.classify.trusted_threshold,
                batch_concurrency: settings.classify.batch_concurrency.max(1),
            }),
        }
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.inner.patterns
    }

    pub async fn classify(&self, label: &str, amount: Money) -> ClassificationResult {
        let query = Query::new(label, amount);
        let mut weaker: Vec<ClassificationResult> = Vec::new();

        for strategy in &self.inner.chain {
            let Some(mut result) = strategy.attempt(&query).await else {
                debug!(strategy = strategy.name(), token = %query.merchant_token, "no match");
                continue;
            };
            if !result.is_unknown() && result.confidence >= self.inner.trusted_threshold {
                debug!(
                    strategy = strategy.name(),
                    token = %query.merchant_token,
                    confidence = result.confidence,
                    "classified"
                );
                result.push_alternatives(weaker.into_iter().filter_map(|w| w.tag));
                return result;
            }
            debug!(
                strategy = strategy.name(),
                confidence = result.confidence,
                "below trusted threshold"
            );
            weaker.push(result);
        }

        let mut unknown = ClassificationResult::unknown(format!(
            "No strategy reached confidence {:.2} for '{}'",
            self.inner.trusted_threshold, query.merchant_token
        ));
        unknown.used_external = weaker.iter().any(|w| w.used_external);
        unknown.push_alternatives(weaker.into_iter().filter_map(|w| w.tag));
        unknown
    }

    /// Classifies every item independently, at most `batch_concurrency` at a
    /// time. Results come back in input order.
    pub async fn classify_batch(&self, items: Vec<(String, Money)>) -> Vec<ClassificationResult> {
        let permits = Arc::new(Semaphore::new(self.inner.batch_concurrency));
        let mut tasks = JoinSet::new();
        let total = items.len();

        for (index, (label, amount)) in items.into_iter().enumerate() {
            let engine = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, engine.classify(&label, amount).await)
            });
        }

        let mut results: Vec<Option<ClassificationResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("classification task failed: {e}"),
            }
        }
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| ClassificationResult::unknown("classification task failed")))
            .collect()
    }

    /// Feeds a correction back into the pattern store.
    pub fn learn(&self, event: &CorrectionEvent) -> LearnedPattern {
        let token = normalize(&event.transaction_label);
        let pattern = self.inner.patterns.reinforce(
            &token,
            &event.corrected_tag,
            event.corrected_expense_type,
            PatternOrigin::UserCorrection,
        );
        info!(
            token = %pattern.merchant_token,
            tag = %pattern.tag,
            confidence = pattern.confidence,
            usage = pattern.usage_count,
            "pattern learned"
        );
        pattern
    }
}
