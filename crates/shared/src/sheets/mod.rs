//! Boundary to the external spreadsheet-like ledger store: named tables
//! addressed by 1-based row/column coordinates.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod layout;
pub mod memory;

pub use http::HttpSheets;
pub use memory::MemorySheets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Stock,
    Edan,
    Getein,
    History,
    Archive,
}

impl Table {
    pub const ALL: [Self; 5] = [
        Self::Stock,
        Self::Edan,
        Self::Getein,
        Self::History,
        Self::Archive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stock => "Stock",
            Self::Edan => "Edan",
            Self::Getein => "Getein",
            Self::History => "History",
            Self::Archive => "Archive",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger store unreachable: {0}")]
    Unavailable(String),
    #[error("invalid ledger data: {0}")]
    InvalidData(String),
}

/// Row/cell CRUD against the ledger store. Rows and columns are 1-based;
/// reading past the populated range yields empty strings.
#[async_trait]
pub trait LedgerTables: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn read_cell(&self, table: Table, row: u32, col: u32) -> Result<String, StoreError>;

    async fn write_cell(
        &self,
        table: Table,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Values of one column for the inclusive row range.
    async fn read_column(
        &self,
        table: Table,
        col: u32,
        from_row: u32,
        to_row: u32,
    ) -> Result<Vec<String>, StoreError>;

    async fn read_all_rows(&self, table: Table) -> Result<Vec<Vec<String>>, StoreError>;

    async fn append_row(&self, table: Table, row: &[String]) -> Result<(), StoreError>;

    async fn append_rows(&self, table: Table, rows: &[Vec<String>]) -> Result<(), StoreError>;

    /// Deletes `count` rows starting at `from_row`; later rows shift up.
    async fn delete_rows(&self, table: Table, from_row: u32, count: u32)
    -> Result<(), StoreError>;
}
