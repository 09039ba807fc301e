pub mod cache;
pub mod engine;
pub mod error;
pub mod keywords;
pub mod pattern_store;
pub mod research;
pub mod result;
pub mod strategy;

pub use cache::{CacheEntry, CacheKey, ResponseCache};
pub use engine::{ClassificationEngine, CorrectionEvent};
pub use error::{ClassifyError, ResearchError};
pub use keywords::{KeywordCategory, KeywordClassifier, KeywordMatch};
pub use pattern_store::{default_seeds, MatchKind, PatternMatch, PatternSeed, PatternStore};
pub use research::{NoResearch, ResearchFinding, ResearchProvider};
pub use result::{ClassificationResult, Source};
pub use strategy::{KeywordStrategy, LearnedPatternStrategy, Query, ResearchStrategy, Strategy};
