//! Wires the import pipeline, the classification engine and SQLite storage
//! into one application context.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tally_classify::{
    default_seeds, ClassificationEngine, ClassificationResult, CorrectionEvent, KeywordClassifier,
    NoResearch, PatternStore, ResponseCache,
};
use tally_core::{
    tag_statistics, ExpenseType, LearnedPattern, Money, MonthBucket, Settings, TagStats, Transaction,
    TransactionId, TransactionStore,
};
use tally_import::{DedupEngine, ImportFile, ImportId, ImportPipeline, ImportPreview, ImportResult};
use tally_storage::{DbPool, SqliteStore};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.toml";
pub const KEYWORDS_FILE: &str = "keywords.toml";
pub const DATABASE_FILE: &str = "tally.db";

pub struct AppContext {
    settings: Settings,
    store: Arc<SqliteStore>,
    pipeline: ImportPipeline<SqliteStore>,
    engine: ClassificationEngine,
    cache: Arc<ResponseCache>,
}

impl AppContext {
    /// Opens (or creates) everything under `data_dir`: `config.toml`, an
    /// optional `keywords.toml`, and the SQLite database.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let settings = Settings::load(&data_dir.join(CONFIG_FILE)).context("loading config.toml")?;
        let keywords_path = data_dir.join(KEYWORDS_FILE);
        let keywords = if keywords_path.exists() {
            let content = std::fs::read_to_string(&keywords_path)
                .with_context(|| format!("reading {}", keywords_path.display()))?;
            KeywordClassifier::from_toml(&content).context("parsing keywords.toml")?
        } else {
            KeywordClassifier::builtin()
        };

        let db_path = data_dir.join(DATABASE_FILE);
        let pool = tally_storage::create_db(&db_path)
            .await
            .with_context(|| format!("opening database {}", db_path.display()))?;
        Self::new(settings, pool, keywords).await
    }

    pub async fn new(settings: Settings, pool: DbPool, keywords: KeywordClassifier) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(pool));

        let patterns = Arc::new(PatternStore::new(settings.learning.clone()));
        let saved = store.load_patterns().await.context("loading learned patterns")?;
        let restored = saved.len();
        patterns.load(saved);
        let seeded = patterns.seed(default_seeds());
        info!(restored, seeded, "pattern store ready");

        let cache = Arc::new(ResponseCache::new());
        let engine = ClassificationEngine::new(
            &settings,
            patterns,
            keywords,
            Arc::new(NoResearch),
            Arc::clone(&cache),
        );
        let pipeline = ImportPipeline::new(
            Arc::clone(&store),
            DedupEngine::new(settings.import.amount_tolerance),
        )
        .with_pending_ttl(chrono::Duration::try_seconds(settings.import.pending_ttl_secs).unwrap_or(chrono::Duration::MAX));

        Ok(Self {
            settings,
            store,
            pipeline,
            engine,
            cache,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    // ── Import ────────────────────────────────────────────────────────────────

    pub async fn analyze(&self, file: &ImportFile) -> Result<ImportPreview> {
        Ok(self.pipeline.analyze(file).await?)
    }

    pub async fn confirm(&self, import_id: ImportId) -> Result<ImportResult> {
        Ok(self.pipeline.confirm(import_id).await?)
    }

    /// Deletes stored rows that duplicate an earlier row. Returns the number
    /// of rows removed.
    pub async fn remove_duplicates(&self) -> Result<usize> {
        let rows = self.store.transactions().await?;
        let engine = DedupEngine::new(self.settings.import.amount_tolerance);
        let duplicates: Vec<TransactionId> = engine
            .find_duplicates(&rows)
            .into_iter()
            .map(|(_, dup)| dup)
            .collect();
        let removed = self.store.delete_transactions(&duplicates).await?;
        info!(removed, "duplicate transactions removed");
        Ok(removed)
    }

    // ── Classification ────────────────────────────────────────────────────────

    pub async fn classify(&self, label: &str, amount: Money) -> ClassificationResult {
        self.engine.classify(label, amount).await
    }

    /// Classifies every untagged, non-excluded transaction and stores the
    /// suggestions that produced a tag. Returns how many were tagged.
    pub async fn tag_untagged(&self) -> Result<usize> {
        let pending: Vec<Transaction> = self
            .store
            .transactions()
            .await?
            .into_iter()
            .filter(|tx| !tx.is_tagged() && !tx.excluded)
            .collect();
        let evicted = self.cache.purge_expired();
        if evicted > 0 {
            debug!(evicted, "expired research answers dropped");
        }
        let items = pending.iter().map(|tx| (tx.label.clone(), tx.amount)).collect();
        let results = self.engine.classify_batch(items).await;

        let mut tagged = 0;
        for (mut tx, result) in pending.into_iter().zip(results) {
            if result.apply_to(&mut tx) {
                self.store.update_transaction(&tx).await?;
                tagged += 1;
            }
        }
        info!(tagged, "untagged transactions classified");
        Ok(tagged)
    }

    /// Retags a stored transaction and teaches the pattern store the
    /// correction; the learned pattern is persisted immediately.
    pub async fn correct(
        &self,
        id: TransactionId,
        tag: &str,
        expense_type: Option<ExpenseType>,
    ) -> Result<LearnedPattern> {
        let mut tx = self.store.transaction(id).await?;
        let event = CorrectionEvent::for_transaction(&tx, tag, expense_type);
        event.apply_to(&mut tx);
        self.store.update_transaction(&tx).await?;

        let pattern = self.engine.learn(&event);
        self.store.save_patterns(std::slice::from_ref(&pattern)).await?;
        Ok(pattern)
    }

    pub fn patterns(&self) -> Vec<LearnedPattern> {
        self.engine.patterns().snapshot()
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.transactions().await?)
    }

    pub async fn transactions_in_month(&self, month: MonthBucket) -> Result<Vec<Transaction>> {
        Ok(self.store.transactions_in_month(month).await?)
    }

    pub async fn tag_statistics(&self) -> Result<BTreeMap<String, TagStats>> {
        let rows = self.store.transactions().await?;
        Ok(tag_statistics(&rows))
    }
}
