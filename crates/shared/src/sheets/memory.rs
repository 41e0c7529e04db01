//! In-memory ledger store used by tests and local runs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LedgerTables, StoreError, Table, layout};

#[derive(Default)]
struct Inner {
    tables: HashMap<Table, Vec<Vec<String>>>,
    fail_all: bool,
    fail_appends: HashSet<Table>,
}

pub struct MemorySheets {
    inner: Mutex<Inner>,
}

impl MemorySheets {
    /// A fresh store with header rows in place, matching the persisted
    /// layout the service expects to find.
    pub fn new() -> Self {
        let mut tables: HashMap<Table, Vec<Vec<String>>> = HashMap::new();
        tables.insert(Table::Stock, Vec::new());
        tables.insert(Table::Edan, vec![to_row(&layout::EDAN_HEADER)]);
        tables.insert(Table::Getein, vec![to_row(&layout::GETEIN_HEADER)]);
        tables.insert(Table::History, vec![to_row(&layout::HISTORY_HEADER)]);
        tables.insert(Table::Archive, vec![to_row(&layout::HISTORY_HEADER)]);

        Self {
            inner: Mutex::new(Inner {
                tables,
                fail_all: false,
                fail_appends: HashSet::new(),
            }),
        }
    }

    /// Makes every operation fail with [`StoreError::Unavailable`], as if
    /// the backing service went down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().await.fail_all = unreachable;
    }

    /// Makes appends to one table fail while everything else keeps
    /// working; used to exercise the reconciliation path.
    pub async fn fail_appends_to(&self, table: Table, fail: bool) {
        let mut inner = self.inner.lock().await;
        if fail {
            inner.fail_appends.insert(table);
        } else {
            inner.fail_appends.remove(&table);
        }
    }

    pub async fn row_count(&self, table: Table) -> usize {
        self.inner
            .lock()
            .await
            .tables
            .get(&table)
            .map_or(0, Vec::len)
    }

    pub async fn rows(&self, table: Table) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .await
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MemorySheets {
    fn default() -> Self {
        Self::new()
    }
}

fn to_row(header: &[&str]) -> Vec<String> {
    header.iter().map(|cell| cell.to_string()).collect()
}

fn check_reachable(inner: &Inner) -> Result<(), StoreError> {
    if inner.fail_all {
        return Err(StoreError::Unavailable(
            "in-memory store marked unreachable".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl LedgerTables for MemorySheets {
    async fn ping(&self) -> Result<(), StoreError> {
        check_reachable(&*self.inner.lock().await)
    }

    async fn read_cell(&self, table: Table, row: u32, col: u32) -> Result<String, StoreError> {
        let inner = self.inner.lock().await;
        check_reachable(&inner)?;
        Ok(inner
            .tables
            .get(&table)
            .and_then(|rows| rows.get(row as usize - 1))
            .and_then(|cells| cells.get(col as usize - 1))
            .cloned()
            .unwrap_or_default())
    }

    async fn write_cell(
        &self,
        table: Table,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        check_reachable(&inner)?;
        let rows = inner.tables.entry(table).or_default();
        let row_idx = row as usize - 1;
        let col_idx = col as usize - 1;
        if rows.len() <= row_idx {
            rows.resize(row_idx + 1, Vec::new());
        }
        let cells = &mut rows[row_idx];
        if cells.len() <= col_idx {
            cells.resize(col_idx + 1, String::new());
        }
        cells[col_idx] = value.to_string();
        Ok(())
    }

    async fn read_column(
        &self,
        table: Table,
        col: u32,
        from_row: u32,
        to_row: u32,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        check_reachable(&inner)?;
        let rows = inner.tables.get(&table);
        Ok((from_row..=to_row)
            .map(|row| {
                rows.and_then(|rows| rows.get(row as usize - 1))
                    .and_then(|cells| cells.get(col as usize - 1))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn read_all_rows(&self, table: Table) -> Result<Vec<Vec<String>>, StoreError> {
        let inner = self.inner.lock().await;
        check_reachable(&inner)?;
        Ok(inner.tables.get(&table).cloned().unwrap_or_default())
    }

    async fn append_row(&self, table: Table, row: &[String]) -> Result<(), StoreError> {
        self.append_rows(table, &[row.to_vec()]).await
    }

    async fn append_rows(&self, table: Table, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        check_reachable(&inner)?;
        if inner.fail_appends.contains(&table) {
            return Err(StoreError::Unavailable(format!(
                "appends to {} are failing",
                table.name()
            )));
        }
        inner
            .tables
            .entry(table)
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }

    async fn delete_rows(
        &self,
        table: Table,
        from_row: u32,
        count: u32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        check_reachable(&inner)?;
        let rows = inner.tables.entry(table).or_default();
        let start = from_row as usize - 1;
        if start > rows.len() {
            return Err(StoreError::InvalidData(format!(
                "delete starts past the end of {}",
                table.name()
            )));
        }
        let end = (start + count as usize).min(rows.len());
        rows.drain(start..end);
        Ok(())
    }
}
