use async_trait::async_trait;
use tally_core::{LearnedPattern, MonthBucket, StoreError, Transaction, TransactionId, TransactionStore};
use tracing::debug;

use crate::db::DbPool;
use crate::{patterns, transactions};

/// [`TransactionStore`] backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Rows filed under one month, served by the month index.
    pub async fn transactions_in_month(&self, month: MonthBucket) -> Result<Vec<Transaction>, StoreError> {
        transactions::transactions_in_month(&self.pool, &month.to_string())
            .await
            .map_err(StoreError::backend)
    }

    pub async fn save_patterns(&self, patterns: &[LearnedPattern]) -> Result<usize, StoreError> {
        patterns::save_patterns(&self.pool, patterns)
            .await
            .map_err(StoreError::backend)
    }

    pub async fn load_patterns(&self) -> Result<Vec<LearnedPattern>, StoreError> {
        patterns::load_patterns(&self.pool).await.map_err(StoreError::backend)
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        transactions::all_transactions(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn transaction(&self, id: TransactionId) -> Result<Transaction, StoreError> {
        transactions::get_transaction(&self.pool, id)
            .await
            .map_err(StoreError::backend)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn insert_transactions(&self, batch: &[Transaction]) -> Result<usize, StoreError> {
        let inserted = transactions::insert_transactions(&self.pool, batch)
            .await
            .map_err(StoreError::backend)?;
        debug!(inserted, "transactions written");
        Ok(inserted)
    }

    async fn update_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let found = transactions::update_transaction(&self.pool, tx)
            .await
            .map_err(StoreError::backend)?;
        if found {
            Ok(())
        } else {
            Err(StoreError::NotFound(tx.id.to_string()))
        }
    }

    async fn delete_transactions(&self, ids: &[TransactionId]) -> Result<usize, StoreError> {
        transactions::delete_transactions(&self.pool, ids)
            .await
            .map_err(StoreError::backend)
    }
}
