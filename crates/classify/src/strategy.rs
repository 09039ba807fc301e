//! The steps of the classification chain. Each one either produces a result
//! or passes; the engine decides which result is trusted.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{normalize, Money};
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::error::ResearchError;
use crate::keywords::KeywordClassifier;
use crate::pattern_store::{MatchKind, PatternStore};
use crate::research::{ResearchFinding, ResearchProvider};
use crate::result::{ClassificationResult, Source};

/// One classification request.
#[derive(Debug, Clone)]
pub struct Query {
    pub label: String,
    pub merchant_token: String,
    pub amount: Money,
}

impl Query {
    pub fn new(label: &str, amount: Money) -> Self {
        Self {
            label: label.to_string(),
            merchant_token: normalize(label),
            amount,
        }
    }
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, query: &Query) -> Option<ClassificationResult>;
}

// ── Learned patterns ──────────────────────────────────────────────────────────

pub struct LearnedPatternStrategy {
    patterns: Arc<PatternStore>,
}

impl LearnedPatternStrategy {
    pub fn new(patterns: Arc<PatternStore>) -> Self {
        Self { patterns }
    }
}

#[async_trait]
impl Strategy for LearnedPatternStrategy {
    fn name(&self) -> &'static str {
        "learned_pattern"
    }

    async fn attempt(&self, query: &Query) -> Option<ClassificationResult> {
        let mut ranked = self.patterns.lookup_ranked(&query.merchant_token).into_iter();
        let best = ranked.next()?;

        let how = match best.kind {
            MatchKind::Exact => "exact match".to_string(),
            MatchKind::Substring => format!("partial match on '{}'", best.pattern.merchant_token),
        };
        let mut result = ClassificationResult {
            tag: Some(best.pattern.tag.clone()),
            expense_type: best.pattern.expense_type,
            confidence: best.confidence,
            explanation: format!(
                "Learned pattern for '{}' ({how}, {} observation(s), {})",
                query.merchant_token, best.pattern.usage_count, best.pattern.origin
            ),
            alternatives: Vec::new(),
            used_external: false,
            source: Source::LearnedPattern,
        };
        result.push_alternatives(ranked.map(|m| m.pattern.tag));
        Some(result)
    }
}

// ── Keywords ──────────────────────────────────────────────────────────────────

pub struct KeywordStrategy {
    classifier: KeywordClassifier,
    confidence: f64,
}

impl KeywordStrategy {
    pub fn new(classifier: KeywordClassifier, confidence: f64) -> Self {
        Self { classifier, confidence }
    }
}

#[async_trait]
impl Strategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn attempt(&self, query: &Query) -> Option<ClassificationResult> {
        let mut ranked = self.classifier.classify(&query.label).into_iter();
        let best = ranked.next()?;
        let mut tags = best.tags.iter().cloned();

        let mut result = ClassificationResult {
            tag: tags.next(),
            expense_type: best.expense_type,
            confidence: self.confidence,
            explanation: format!(
                "Keyword category '{}' matched: {}",
                best.category,
                best.matched.join(", ")
            ),
            alternatives: Vec::new(),
            used_external: false,
            source: Source::Keyword,
        };
        result.push_alternatives(tags);
        result.push_alternatives(ranked.filter_map(|m| m.tags.into_iter().next()));
        Some(result)
    }
}

// ── External research ─────────────────────────────────────────────────────────

/// Wraps a [`ResearchProvider`] with the response cache and a timeout.
/// A failed lookup yields an untagged, zero-confidence result flagged as
/// external; an unconfigured provider yields nothing.
pub struct ResearchStrategy {
    provider: Arc<dyn ResearchProvider>,
    cache: Arc<ResponseCache>,
    timeout: Duration,
    ttl: chrono::Duration,
}

impl ResearchStrategy {
    pub fn new(
        provider: Arc<dyn ResearchProvider>,
        cache: Arc<ResponseCache>,
        timeout: Duration,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
            ttl,
        }
    }

    async fn fetch(&self, query: &Query) -> Result<ResearchFinding, ResearchError> {
        match tokio::time::timeout(
            self.timeout,
            self.provider.research(&query.merchant_token, query.amount),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ResearchError::Timeout),
        }
    }
}

#[async_trait]
impl Strategy for ResearchStrategy {
    fn name(&self) -> &'static str {
        "research"
    }

    async fn attempt(&self, query: &Query) -> Option<ClassificationResult> {
        if !self.provider.is_configured() {
            return None;
        }
        let key = CacheKey::new(&query.merchant_token, query.amount, self.provider.id());

        if let Some(entry) = self.cache.get(&key) {
            match serde_json::from_value::<ResearchFinding>(entry.payload) {
                Ok(finding) => {
                    debug!(token = %query.merchant_token, hits = entry.hit_count, "research cache hit");
                    return Some(finding_result(finding, self.provider.id(), true));
                }
                Err(e) => warn!(key = %key, "discarding unreadable cache entry: {e}"),
            }
        }

        let finding = match self.fetch(query).await {
            Ok(finding) => finding,
            Err(e) => {
                warn!(token = %query.merchant_token, provider = self.provider.id(), "research failed: {e}");
                return Some(failed_result(self.provider.id(), &e));
            }
        };

        match serde_json::to_value(&finding) {
            Ok(payload) => self.cache.put(
                key,
                payload,
                self.provider.id(),
                finding.confidence,
                self.ttl,
            ),
            Err(e) => warn!("research finding not cached: {e}"),
        }
        Some(finding_result(finding, self.provider.id(), false))
    }
}

fn failed_result(provider: &str, error: &ResearchError) -> ClassificationResult {
    ClassificationResult {
        used_external: true,
        source: Source::Research,
        ..ClassificationResult::unknown(format!("External research via {provider} failed: {error}"))
    }
}

fn finding_result(finding: ResearchFinding, provider: &str, cached: bool) -> ClassificationResult {
    let mut result = ClassificationResult {
        tag: Some(finding.tag.trim().to_lowercase()),
        expense_type: finding.expense_type,
        confidence: finding.confidence.clamp(0.0, 1.0),
        explanation: format!(
            "External research via {provider}{}: {}",
            if cached { " (cached)" } else { "" },
            finding.summary
        ),
        alternatives: Vec::new(),
        used_external: true,
        source: Source::Research,
    };
    result.push_alternatives(finding.alternatives);
    result
}
