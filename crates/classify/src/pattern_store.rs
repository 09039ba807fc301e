//! Merchant token → tag associations learned from corrections.
//!
//! The map is behind a `RwLock` and every pattern behind its own `Mutex`:
//! reinforcing an existing token only locks that token, and only the first
//! sighting of a token takes the map's write lock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tally_core::{ExpenseType, LearnedPattern, LearningSettings, PatternOrigin};
use tracing::debug;

use crate::error::ClassifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub pattern: LearnedPattern,
    pub kind: MatchKind,
    /// Stored confidence, reduced by the substring penalty for substring hits.
    pub confidence: f64,
}

/// A curated pattern used to seed the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSeed {
    pub merchant_token: String,
    pub tag: String,
    #[serde(default)]
    pub expense_type: Option<ExpenseType>,
}

type Slot = Arc<Mutex<LearnedPattern>>;

pub struct PatternStore {
    settings: LearningSettings,
    patterns: RwLock<HashMap<String, Slot>>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new(LearningSettings::default())
    }
}

impl PatternStore {
    pub fn new(settings: LearningSettings) -> Self {
        Self {
            settings,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Best match for the token: exact first, then the strongest substring hit.
    pub fn lookup(&self, merchant_token: &str) -> Option<LearnedPattern> {
        self.lookup_ranked(merchant_token)
            .into_iter()
            .next()
            .map(|m| m.pattern)
    }

    /// Exact match only.
    pub fn require(&self, merchant_token: &str) -> Result<LearnedPattern, ClassifyError> {
        let slot = self.read_map().get(merchant_token).cloned();
        slot.as_deref()
            .map(|s| lock(s).clone())
            .ok_or_else(|| ClassifyError::NotFound(merchant_token.to_string()))
    }

    /// Every pattern that matches the token. The exact match (if any) comes
    /// first; substring hits follow by penalized confidence, then by longer
    /// stored token. Substring matching needs both tokens to be at least
    /// `min_substring_len` characters long.
    pub fn lookup_ranked(&self, merchant_token: &str) -> Vec<PatternMatch> {
        let query = merchant_token.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let min_len = self.settings.min_substring_len;
        let query_long_enough = query.chars().count() >= min_len;

        let slots: Vec<(bool, Slot)> = {
            let map = self.read_map();
            map.iter()
                .filter_map(|(token, slot)| {
                    if token == query {
                        Some((true, Arc::clone(slot)))
                    } else if query_long_enough
                        && token.chars().count() >= min_len
                        && (query.contains(token.as_str()) || token.contains(query))
                    {
                        Some((false, Arc::clone(slot)))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let mut matches: Vec<PatternMatch> = slots
            .into_iter()
            .map(|(exact, slot)| {
                let pattern = lock(&slot).clone();
                if exact {
                    PatternMatch {
                        confidence: pattern.confidence,
                        pattern,
                        kind: MatchKind::Exact,
                    }
                } else {
                    PatternMatch {
                        confidence: pattern.confidence * self.settings.substring_penalty,
                        pattern,
                        kind: MatchKind::Substring,
                    }
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            (b.kind == MatchKind::Exact)
                .cmp(&(a.kind == MatchKind::Exact))
                .then(b.confidence.total_cmp(&a.confidence))
                .then(b.pattern.merchant_token.len().cmp(&a.pattern.merchant_token.len()))
                .then(a.pattern.merchant_token.cmp(&b.pattern.merchant_token))
        });
        matches
    }

    /// Records one observation of `merchant_token → tag`.
    ///
    /// - unseen token: new pattern at the origin's bootstrap confidence;
    /// - same tag: closes `reinforcement_rate` of the gap to 1.0, expense type
    ///   follows the latest observation;
    /// - different tag: the new tag wins outright and confidence restarts at
    ///   the bootstrap value.
    pub fn reinforce(
        &self,
        merchant_token: &str,
        tag: &str,
        expense_type: Option<ExpenseType>,
        origin: PatternOrigin,
    ) -> LearnedPattern {
        let token = merchant_token.trim().to_string();
        let tag = tag.trim().to_lowercase();

        let existing = self.read_map().get(&token).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut map = self.write_map();
                if let Some(slot) = map.get(&token) {
                    // Lost the race to another writer; reinforce theirs.
                    Arc::clone(slot)
                } else {
                    let pattern = self.bootstrap(&token, &tag, expense_type, origin);
                    debug!(token = %token, tag = %tag, confidence = pattern.confidence, "pattern created");
                    map.insert(token, Arc::new(Mutex::new(pattern.clone())));
                    return pattern;
                }
            }
        };

        let mut pattern = lock(&slot);
        if pattern.tag == tag {
            let gap = 1.0 - pattern.confidence;
            pattern.confidence = (pattern.confidence + gap * self.settings.reinforcement_rate).min(1.0);
            pattern.usage_count = pattern.usage_count.saturating_add(1);
            pattern.expense_type = expense_type;
            if origin == PatternOrigin::UserCorrection {
                pattern.origin = origin;
            }
            pattern.last_reinforced = Utc::now();
            debug!(token = %token, tag = %tag, confidence = pattern.confidence, "pattern reinforced");
        } else {
            debug!(token = %token, from = %pattern.tag, to = %tag, "pattern superseded");
            *pattern = self.bootstrap(&token, &tag, expense_type, origin);
        }
        pattern.clone()
    }

    /// Inserts curated patterns for tokens not yet known. Learned patterns
    /// are never overwritten by seeds. Returns how many were added.
    pub fn seed<I>(&self, seeds: I) -> usize
    where
        I: IntoIterator<Item = PatternSeed>,
    {
        let mut map = self.write_map();
        let mut added = 0;
        for seed in seeds {
            let token = seed.merchant_token.trim().to_string();
            if token.is_empty() || map.contains_key(&token) {
                continue;
            }
            let pattern = self.bootstrap(
                &token,
                &seed.tag.trim().to_lowercase(),
                seed.expense_type,
                PatternOrigin::Predefined,
            );
            map.insert(token, Arc::new(Mutex::new(pattern)));
            added += 1;
        }
        added
    }

    /// Replaces stored patterns with previously persisted ones, token by token.
    pub fn load<I>(&self, patterns: I)
    where
        I: IntoIterator<Item = LearnedPattern>,
    {
        let mut map = self.write_map();
        for pattern in patterns {
            map.insert(pattern.merchant_token.clone(), Arc::new(Mutex::new(pattern)));
        }
    }

    /// Copy of every pattern, ordered by token.
    pub fn snapshot(&self) -> Vec<LearnedPattern> {
        let slots: Vec<Slot> = self.read_map().values().cloned().collect();
        let mut patterns: Vec<LearnedPattern> = slots.iter().map(|s| lock(s).clone()).collect();
        patterns.sort_by(|a, b| a.merchant_token.cmp(&b.merchant_token));
        patterns
    }

    fn bootstrap(
        &self,
        token: &str,
        tag: &str,
        expense_type: Option<ExpenseType>,
        origin: PatternOrigin,
    ) -> LearnedPattern {
        let confidence = match origin {
            PatternOrigin::Predefined => self.settings.predefined_bootstrap,
            PatternOrigin::UserCorrection => self.settings.user_bootstrap,
        };
        LearnedPattern {
            merchant_token: token.to_string(),
            tag: tag.to_string(),
            expense_type,
            confidence: confidence.clamp(0.0, 1.0),
            usage_count: 1,
            last_reinforced: Utc::now(),
            origin,
        }
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.patterns.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(slot: &Mutex<LearnedPattern>) -> std::sync::MutexGuard<'_, LearnedPattern> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A small curated set of unambiguous merchants.
pub fn default_seeds() -> Vec<PatternSeed> {
    [
        ("edf", "utilities", Some(ExpenseType::Fixed)),
        ("engie", "utilities", Some(ExpenseType::Fixed)),
        ("netflix", "subscription", Some(ExpenseType::Fixed)),
        ("spotify", "subscription", Some(ExpenseType::Fixed)),
        ("navigo", "transport", Some(ExpenseType::Fixed)),
        ("doctolib", "health", Some(ExpenseType::Variable)),
    ]
    .into_iter()
    .map(|(token, tag, expense_type)| PatternSeed {
        merchant_token: token.to_string(),
        tag: tag.to_string(),
        expense_type,
    })
    .collect()
}
