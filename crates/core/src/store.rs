use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StoreError;
use super::transaction::{Transaction, TransactionId};

/// Keyed persistence for transactions. Implementations must make
/// `insert_transactions` all-or-nothing.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    async fn transaction(&self, id: TransactionId) -> Result<Transaction, StoreError>;

    /// Inserts the whole batch atomically and returns the number of rows written.
    async fn insert_transactions(&self, batch: &[Transaction]) -> Result<usize, StoreError>;

    /// Overwrites an existing transaction, including its month bucket.
    async fn update_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    async fn delete_transactions(&self, ids: &[TransactionId]) -> Result<usize, StoreError>;
}

/// In-process store, used by tests and as a scratch ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn transaction(&self, id: TransactionId) -> Result<Transaction, StoreError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn insert_transactions(&self, batch: &[Transaction]) -> Result<usize, StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(dup) = batch.iter().find(|b| rows.iter().any(|r| r.id == b.id)) {
            return Err(StoreError::Backend(format!("duplicate id {}", dup.id)));
        }
        rows.extend_from_slice(batch);
        Ok(batch.len())
    }

    async fn update_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let slot = rows
            .iter_mut()
            .find(|r| r.id == tx.id)
            .ok_or_else(|| StoreError::NotFound(tx.id.to_string()))?;
        *slot = tx.clone();
        Ok(())
    }

    async fn delete_transactions(&self, ids: &[TransactionId]) -> Result<usize, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !ids.contains(&r.id));
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::NaiveDate;

    fn tx(label: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            label,
            Money::from_cents(-500),
        )
    }

    #[tokio::test]
    async fn insert_then_read_back() {
        let store = MemoryStore::new();
        let batch = vec![tx("A"), tx("B")];
        assert_eq!(store.insert_transactions(&batch).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
        let found = store.transaction(batch[1].id).await.unwrap();
        assert_eq!(found.label, "B");
    }

    #[tokio::test]
    async fn insert_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = tx("A");
        store.insert_transactions(std::slice::from_ref(&a)).await.unwrap();
        let result = store.insert_transactions(&[tx("B"), a]).await;
        assert!(result.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_unknown_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update_transaction(&tx("ghost")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_only_listed_ids() {
        let store = MemoryStore::new();
        let batch = vec![tx("A"), tx("B"), tx("C")];
        store.insert_transactions(&batch).await.unwrap();
        let removed = store
            .delete_transactions(&[batch[0].id, batch[2].id])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.transactions().await.unwrap()[0].label, "B");
    }
}
