//! The only writer of ledger state: applies signed quantity deltas to
//! stock rows and appends the matching history entries.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    EdanProduct, ExpiryDate, FIELD_SENTINEL, HistoryFields, HistoryRecord, StockKey,
};
use crate::sheets::{LedgerTables, StoreError, Table, layout};

pub mod archive;
pub mod cache;

/// How many applied commit keys are remembered for replay detection.
const APPLIED_COMMITS_CAP: usize = 4096;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: i64 },
    #[error("stock updated to {new_quantity} but the history append failed")]
    Reconciliation {
        new_quantity: i64,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
struct AppliedCommits {
    results: HashMap<String, i64>,
    order: VecDeque<String>,
}

impl AppliedCommits {
    fn get(&self, commit_key: &str) -> Option<i64> {
        self.results.get(commit_key).copied()
    }

    fn record(&mut self, commit_key: &str, quantity: i64) {
        if self.results.insert(commit_key.to_string(), quantity).is_none() {
            self.order.push_back(commit_key.to_string());
        }
        while self.order.len() > APPLIED_COMMITS_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.results.remove(&oldest);
            }
        }
    }
}

pub struct LedgerService {
    store: Arc<dyn LedgerTables>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    history_lock: Mutex<()>,
    applied: Mutex<AppliedCommits>,
    archive_threshold: usize,
    archive_retain: usize,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerTables>, archive_threshold: usize, archive_retain: usize) -> Self {
        Self {
            store,
            key_locks: Mutex::new(HashMap::new()),
            history_lock: Mutex::new(()),
            applied: Mutex::new(AppliedCommits::default()),
            archive_threshold,
            archive_retain,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerTables> {
        &self.store
    }

    /// Applies one signed delta to the stock row identified by `key` and
    /// appends the matching history entry. Returns the new quantity.
    ///
    /// Replaying a commit key that already applied returns the recorded
    /// quantity without touching the ledger again. Mutations on the same
    /// key serialize on a per-key lock, so concurrent sessions cannot
    /// lose updates.
    pub async fn apply(
        &self,
        key: &StockKey,
        delta: i64,
        fields: &HistoryFields,
        commit_key: &str,
    ) -> Result<i64, LedgerError> {
        if delta == 0 {
            return Err(StoreError::InvalidData("zero quantity delta".to_string()).into());
        }

        if let Some(quantity) = self.applied.lock().await.get(commit_key) {
            return Ok(quantity);
        }

        let key_lock = self.key_lock(key).await;
        let _key_guard = key_lock.lock().await;

        // A replay may have raced us to the lock.
        if let Some(quantity) = self.applied.lock().await.get(commit_key) {
            return Ok(quantity);
        }

        let new_quantity = self.mutate_row(key, delta).await?;

        let record = HistoryRecord::new(key, delta, fields, Utc::now());
        let append_result = {
            let _history_guard = self.history_lock.lock().await;
            self.store.append_row(Table::History, &record.to_row()).await
        };

        // The quantity mutation is already durable either way.
        self.applied.lock().await.record(commit_key, new_quantity);

        match append_result {
            Ok(()) => Ok(new_quantity),
            Err(source) => Err(LedgerError::Reconciliation {
                new_quantity,
                source,
            }),
        }
    }

    async fn key_lock(&self, key: &StockKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.lock_id()).or_default().clone()
    }

    async fn mutate_row(&self, key: &StockKey, delta: i64) -> Result<i64, LedgerError> {
        match key {
            StockKey::Gem {
                variant,
                tests,
                expiry,
            } => {
                self.mutate_gem_block(
                    layout::gem_date_col(*variant),
                    layout::gem_test_col(*variant, *tests),
                    &expiry.to_string(),
                    delta,
                )
                .await
            }
            StockKey::Edan {
                product,
                lot,
                expiry,
            } => {
                let key_cells = edan_key_cells(product, lot.as_deref(), *expiry);
                self.mutate_side_table(Table::Edan, &key_cells, layout::EDAN_QTY_COL, delta)
                    .await
            }
            StockKey::Getein { item, expiry } => {
                let key_cells = vec![item.clone(), expiry.to_string()];
                self.mutate_side_table(Table::Getein, &key_cells, layout::GETEIN_QTY_COL, delta)
                    .await
            }
        }
    }

    /// Scans a variant's expiry column for the matching batch row. The
    /// first empty cell ends the populated range; an unseen expiry takes
    /// that row when the delta adds stock.
    async fn mutate_gem_block(
        &self,
        date_col: u32,
        qty_col: u32,
        expiry: &str,
        delta: i64,
    ) -> Result<i64, LedgerError> {
        let dates = self
            .store
            .read_column(
                Table::Stock,
                date_col,
                layout::FIRST_STOCK_ROW,
                layout::LAST_STOCK_ROW,
            )
            .await?;

        for (offset, cell) in dates.iter().enumerate() {
            let row = layout::FIRST_STOCK_ROW + offset as u32;
            let cell = cell.trim();

            if cell.is_empty() {
                if delta < 0 {
                    return Err(LedgerError::InsufficientStock { available: 0 });
                }
                self.store
                    .write_cell(Table::Stock, row, date_col, expiry)
                    .await?;
                self.store
                    .write_cell(Table::Stock, row, qty_col, &delta.to_string())
                    .await?;
                return Ok(delta);
            }

            if cell == expiry {
                let current = parse_quantity(&self.store.read_cell(Table::Stock, row, qty_col).await?)?;
                let next = next_quantity(current, delta)?;
                self.store
                    .write_cell(Table::Stock, row, qty_col, &next.to_string())
                    .await?;
                return Ok(next);
            }
        }

        Err(StoreError::InvalidData(format!(
            "stock column {date_col} has no free batch rows"
        ))
        .into())
    }

    async fn mutate_side_table(
        &self,
        table: Table,
        key_cells: &[String],
        qty_col: u32,
        delta: i64,
    ) -> Result<i64, LedgerError> {
        let rows = self.store.read_all_rows(table).await?;

        for (idx, row) in rows.iter().enumerate().skip(layout::FIRST_DATA_ROW as usize - 1) {
            let matches = key_cells.iter().enumerate().all(|(col, want)| {
                row.get(col).map(String::as_str).unwrap_or("").trim() == want.as_str()
            });
            if !matches {
                continue;
            }

            let current = parse_quantity(row.get(qty_col as usize - 1).map(String::as_str).unwrap_or(""))?;
            let next = next_quantity(current, delta)?;
            self.store
                .write_cell(table, idx as u32 + 1, qty_col, &next.to_string())
                .await?;
            return Ok(next);
        }

        if delta < 0 {
            return Err(LedgerError::InsufficientStock { available: 0 });
        }

        let mut new_row = key_cells.to_vec();
        new_row.push(delta.to_string());
        self.store.append_row(table, &new_row).await?;
        Ok(delta)
    }
}

fn edan_key_cells(
    product: &EdanProduct,
    lot: Option<&str>,
    expiry: Option<ExpiryDate>,
) -> Vec<String> {
    vec![
        product.label().to_string(),
        lot.unwrap_or(FIELD_SENTINEL).to_string(),
        expiry.map_or_else(|| FIELD_SENTINEL.to_string(), |e| e.to_string()),
    ]
}

/// Non-negativity check plus the defensive floor at zero.
fn next_quantity(current: i64, delta: i64) -> Result<i64, LedgerError> {
    if delta < 0 && -delta > current {
        return Err(LedgerError::InsufficientStock { available: current });
    }
    Ok((current + delta).max(0))
}

fn parse_quantity(cell: &str) -> Result<i64, LedgerError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0);
    }
    cell.parse::<i64>()
        .map_err(|_| StoreError::InvalidData(format!("quantity cell holds {cell:?}")).into())
}

/// Deterministic idempotency key for one commit attempt. The transaction
/// id makes two otherwise identical transactions distinct; retries of the
/// same transaction hash to the same key.
pub fn commit_key(chat_id: i64, transaction_id: Uuid, key: &StockKey, delta: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chat_id.to_be_bytes());
    hasher.update([0x1f]);
    hasher.update(transaction_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(key.lock_id().as_bytes());
    hasher.update([0x1f]);
    hasher.update(delta.to_be_bytes());

    let digest = hasher.finalize();
    format!("{}:{}", key.family().as_str(), URL_SAFE_NO_PAD.encode(digest))
}
