pub mod config;
pub mod error;
pub mod money;
pub mod normalize;
pub mod pattern;
pub mod period;
pub mod reconcile;
pub mod stats;
pub mod store;
pub mod transaction;

pub use config::{CacheSettings, ClassifySettings, ImportSettings, LearningSettings, Settings};
pub use error::{ConfigError, StoreError, ValidationError};
pub use money::Money;
pub use normalize::normalize;
pub use pattern::{LearnedPattern, PatternOrigin};
pub use period::MonthBucket;
pub use reconcile::{reconcile, Reconciliation, ReconcileKind};
pub use stats::{tag_statistics, ExpenseTypeDistribution, TagStats};
pub use store::{MemoryStore, TransactionStore};
pub use transaction::{ExpenseType, IdentityKey, Transaction, TransactionId};
