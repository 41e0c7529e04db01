//! Periodically refreshed read cache over the stock tables. Availability
//! lookups and status queries read an immutable snapshot and never wait
//! on the live store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{ExpiryDate, GemVariant, TestCount};
use crate::sheets::{LedgerTables, StoreError, Table, layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemBatch {
    pub expiry: ExpiryDate,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdanStockRow {
    pub product: String,
    pub lot: String,
    pub expiry: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeteinStockRow {
    pub item: String,
    pub expiry: String,
    pub quantity: i64,
}

/// Point-in-time copy of all stock rows. Built in full before it is
/// published; readers never see a partially filled snapshot.
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    pub captured_at: DateTime<Utc>,
    gem: HashMap<(GemVariant, TestCount), Vec<GemBatch>>,
    edan: Vec<EdanStockRow>,
    getein: Vec<GeteinStockRow>,
}

impl StockSnapshot {
    fn empty() -> Self {
        Self {
            captured_at: DateTime::UNIX_EPOCH,
            gem: HashMap::new(),
            edan: Vec::new(),
            getein: Vec::new(),
        }
    }

    /// Expiry batches with stock on hand for one Gem bucket, in table
    /// order.
    pub fn gem_batches(&self, variant: GemVariant, tests: TestCount) -> Vec<GemBatch> {
        self.gem
            .get(&(variant, tests))
            .map(|batches| {
                batches
                    .iter()
                    .copied()
                    .filter(|batch| batch.quantity > 0)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn gem_total(&self, variant: GemVariant, tests: TestCount) -> i64 {
        self.gem
            .get(&(variant, tests))
            .map(|batches| batches.iter().map(|batch| batch.quantity).sum())
            .unwrap_or(0)
    }

    /// Expiry batches with stock on hand for one Edan (product, lot)
    /// pair.
    pub fn edan_batches(&self, product: &str, lot: &str) -> Vec<(String, i64)> {
        self.edan
            .iter()
            .filter(|row| row.product == product && row.lot == lot && row.quantity > 0)
            .map(|row| (row.expiry.clone(), row.quantity))
            .collect()
    }

    /// On-hand total for a product across lots; whole-unit lines have a
    /// single sentinel-keyed row.
    pub fn edan_available(&self, product: &str) -> i64 {
        self.edan
            .iter()
            .filter(|row| row.product == product)
            .map(|row| row.quantity)
            .sum()
    }

    pub fn edan_rows(&self) -> &[EdanStockRow] {
        &self.edan
    }

    pub fn getein_batches(&self, item: &str) -> Vec<(String, i64)> {
        self.getein
            .iter()
            .filter(|row| row.item == item && row.quantity > 0)
            .map(|row| (row.expiry.clone(), row.quantity))
            .collect()
    }

    pub fn getein_rows(&self) -> &[GeteinStockRow] {
        &self.getein
    }
}

/// Holder of the published snapshot. Writers build a complete replacement
/// and swap it in one guarded assignment; readers clone the `Arc` out.
pub struct StockCache {
    current: RwLock<Arc<StockSnapshot>>,
}

impl StockCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(StockSnapshot::empty())),
        }
    }

    pub async fn snapshot(&self) -> Arc<StockSnapshot> {
        self.current.read().await.clone()
    }

    /// Rebuilds the snapshot from the store and publishes it. On failure
    /// the previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn LedgerTables) -> Result<(), StoreError> {
        let next = build_snapshot(store).await?;
        *self.current.write().await = Arc::new(next);
        Ok(())
    }
}

impl Default for StockCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn build_snapshot(store: &dyn LedgerTables) -> Result<StockSnapshot, StoreError> {
    let first = layout::FIRST_STOCK_ROW;
    let last = layout::FIRST_STOCK_ROW + layout::CACHE_ROW_SPAN - 1;

    let mut gem = HashMap::new();
    for variant in GemVariant::ALL {
        let dates = store
            .read_column(Table::Stock, layout::gem_date_col(variant), first, last)
            .await?;

        for tests in TestCount::ALL {
            let quantities = store
                .read_column(Table::Stock, layout::gem_test_col(variant, tests), first, last)
                .await?;

            let batches: Vec<GemBatch> = dates
                .iter()
                .zip(quantities.iter())
                .filter_map(|(date, quantity)| {
                    let expiry = ExpiryDate::parse(date)?;
                    Some(GemBatch {
                        expiry,
                        quantity: quantity.trim().parse::<i64>().unwrap_or(0),
                    })
                })
                .collect();
            gem.insert((variant, tests), batches);
        }
    }

    let edan = store
        .read_all_rows(Table::Edan)
        .await?
        .into_iter()
        .skip(layout::FIRST_DATA_ROW as usize - 1)
        .map(|row| EdanStockRow {
            product: cell(&row, layout::EDAN_PRODUCT_COL),
            lot: cell(&row, layout::EDAN_LOT_COL),
            expiry: cell(&row, layout::EDAN_EXPIRY_COL),
            quantity: cell(&row, layout::EDAN_QTY_COL).parse().unwrap_or(0),
        })
        .collect();

    let getein = store
        .read_all_rows(Table::Getein)
        .await?
        .into_iter()
        .skip(layout::FIRST_DATA_ROW as usize - 1)
        .map(|row| GeteinStockRow {
            item: cell(&row, layout::GETEIN_ITEM_COL),
            expiry: cell(&row, layout::GETEIN_EXPIRY_COL),
            quantity: cell(&row, layout::GETEIN_QTY_COL).parse().unwrap_or(0),
        })
        .collect();

    Ok(StockSnapshot {
        captured_at: Utc::now(),
        gem,
        edan,
        getein,
    })
}

fn cell(row: &[String], col: u32) -> String {
    row.get(col as usize - 1).map(|s| s.trim().to_string()).unwrap_or_default()
}
