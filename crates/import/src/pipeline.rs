use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tally_core::{MonthBucket, Transaction, TransactionStore, ValidationError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dedup::DedupEngine;
use crate::delimited::read_delimited;
use crate::document::read_document;
use crate::error::ImportError;
use crate::format::{detect_format, FileFormat};
use crate::mapping::map_rows;
use crate::spreadsheet::read_spreadsheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportId(pub Uuid);

impl ImportId {
    pub fn new() -> Self {
        ImportId(Uuid::new_v4())
    }
}

impl Default for ImportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw upload: the bytes plus the name the user gave the file.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self { filename, bytes })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub import_id: ImportId,
    pub format: FileFormat,
    /// Every month that has at least one accepted row, ascending.
    pub detected_months: Vec<MonthBucket>,
    pub per_month_new_count: BTreeMap<MonthBucket, usize>,
    pub per_month_duplicate_count: BTreeMap<MonthBucket, usize>,
    /// Month with the most new rows, latest month on ties. `None` when
    /// nothing would be inserted.
    pub suggested_month: Option<MonthBucket>,
    pub warnings: Vec<ValidationError>,
    /// Rows whose date was taken from the label instead of the date column.
    pub reconciled_dates: usize,
}

impl ImportPreview {
    pub fn new_count(&self) -> usize {
        self.per_month_new_count.values().sum()
    }

    pub fn duplicate_count(&self) -> usize {
        self.per_month_duplicate_count.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub import_id: ImportId,
    pub inserted_count: usize,
    pub duplicate_count: usize,
    /// Set when this id had already been confirmed; nothing was written.
    pub already_confirmed: bool,
}

enum ImportState {
    Pending {
        candidates: Vec<Transaction>,
        analyzed_at: DateTime<Utc>,
    },
    Confirmed(ImportResult),
}

type Slots = HashMap<ImportId, Arc<tokio::sync::Mutex<ImportState>>>;

/// Two-phase import: `analyze` reads the file and previews what would
/// change, `confirm` writes it. Only `confirm` touches the store.
/// Unconfirmed imports expire after `pending_ttl`; confirmed ones are kept
/// as a small result so a repeated confirm stays a no-op.
pub struct ImportPipeline<S: TransactionStore> {
    store: Arc<S>,
    dedup: DedupEngine,
    pending_ttl: Duration,
    imports: Mutex<Slots>,
}

impl<S: TransactionStore> ImportPipeline<S> {
    pub fn new(store: Arc<S>, dedup: DedupEngine) -> Self {
        Self {
            store,
            dedup,
            pending_ttl: Duration::hours(1),
            imports: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Parses, maps, reconciles and dedups the file against the current
    /// store, and keeps the candidates under a fresh import id.
    pub async fn analyze(&self, file: &ImportFile) -> Result<ImportPreview, ImportError> {
        // 1. Classify the file by content.
        let format = detect_format(&file.bytes, &file.filename)?;

        // 2. Read it into a grid of cells.
        let rows = match format {
            FileFormat::Delimited => read_delimited(&file.bytes)?,
            FileFormat::Spreadsheet => read_spreadsheet(&file.bytes)?,
            FileFormat::Document => read_document(&file.bytes)?,
        };

        // 3. Map columns; normalization and date reconciliation happen per row.
        let mapped = map_rows(&rows)?;
        for warning in &mapped.warnings {
            warn!(file = %file.filename, "{warning}");
        }

        // 4. Dedup against what is stored now.
        let existing = self.store.transactions().await?;
        let partition = self.dedup.partition(mapped.transactions.clone(), &existing);

        let mut per_month_new_count = BTreeMap::new();
        let mut per_month_duplicate_count = BTreeMap::new();
        for tx in &mapped.transactions {
            per_month_new_count.entry(tx.month()).or_insert(0);
            per_month_duplicate_count.entry(tx.month()).or_insert(0);
        }
        for tx in &partition.to_insert {
            *per_month_new_count.entry(tx.month()).or_insert(0) += 1;
        }
        for tx in &partition.duplicates {
            *per_month_duplicate_count.entry(tx.month()).or_insert(0) += 1;
        }

        let suggested_month = per_month_new_count
            .iter()
            .filter(|(_, count)| **count > 0)
            .max_by_key(|(month, count)| (**count, **month))
            .map(|(month, _)| *month);

        let import_id = ImportId::new();
        let now = Utc::now();
        self.purge_pending_at(now);
        self.slots().insert(
            import_id,
            Arc::new(tokio::sync::Mutex::new(ImportState::Pending {
                candidates: mapped.transactions,
                analyzed_at: now,
            })),
        );

        let preview = ImportPreview {
            import_id,
            format,
            detected_months: per_month_new_count.keys().copied().collect(),
            per_month_new_count,
            per_month_duplicate_count,
            suggested_month,
            warnings: mapped.warnings,
            reconciled_dates: mapped.reconciled,
        };
        info!(
            %import_id,
            file = %file.filename,
            %format,
            new = preview.new_count(),
            duplicates = preview.duplicate_count(),
            warnings = preview.warnings.len(),
            "import analyzed"
        );
        Ok(preview)
    }

    /// Writes the analyzed rows. The duplicate check is redone against the
    /// store as it is now, under a lock held for this import id, so a repeated
    /// or concurrent confirm inserts nothing more.
    pub async fn confirm(&self, import_id: ImportId) -> Result<ImportResult, ImportError> {
        let slot = self
            .slots()
            .get(&import_id)
            .cloned()
            .ok_or(ImportError::NotFound(import_id))?;
        let mut state = slot.lock().await;

        let expired = matches!(
            &*state,
            ImportState::Pending { analyzed_at, .. } if self.is_expired(*analyzed_at, Utc::now())
        );
        if expired {
            drop(state);
            self.slots().remove(&import_id);
            info!(%import_id, "pending import expired");
            return Err(ImportError::NotFound(import_id));
        }

        let candidates = match &*state {
            ImportState::Confirmed(done) => {
                info!(%import_id, "import already confirmed");
                return Ok(ImportResult {
                    import_id,
                    inserted_count: 0,
                    duplicate_count: done.inserted_count + done.duplicate_count,
                    already_confirmed: true,
                });
            }
            ImportState::Pending { candidates, .. } => candidates.clone(),
        };

        let existing = self.store.transactions().await?;
        let partition = self.dedup.partition(candidates, &existing);
        let inserted_count = self.store.insert_transactions(&partition.to_insert).await?;

        let result = ImportResult {
            import_id,
            inserted_count,
            duplicate_count: partition.duplicates.len(),
            already_confirmed: false,
        };
        *state = ImportState::Confirmed(result.clone());
        info!(%import_id, inserted = inserted_count, duplicates = result.duplicate_count, "import confirmed");
        Ok(result)
    }

    /// Drops a pending import. Returns false for unknown or confirmed ids.
    pub async fn discard(&self, import_id: ImportId) -> bool {
        let Some(slot) = self.slots().get(&import_id).cloned() else {
            return false;
        };
        let state = slot.lock().await;
        if matches!(*state, ImportState::Confirmed(_)) {
            return false;
        }
        drop(state);
        self.slots().remove(&import_id).is_some()
    }

    /// Drops pending imports older than the TTL. Returns how many went.
    pub fn purge_pending(&self) -> usize {
        self.purge_pending_at(Utc::now())
    }

    fn purge_pending_at(&self, now: DateTime<Utc>) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        // A slot locked by a running confirm is left alone.
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(state) => match &*state {
                ImportState::Pending { analyzed_at, .. } => !self.is_expired(*analyzed_at, now),
                ImportState::Confirmed(_) => true,
            },
            Err(_) => true,
        });
        let purged = before - slots.len();
        if purged > 0 {
            debug!(purged, "expired pending imports dropped");
        }
        purged
    }

    fn is_expired(&self, analyzed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        analyzed_at
            .checked_add_signed(self.pending_ttl)
            .is_some_and(|deadline| now >= deadline)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.imports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
