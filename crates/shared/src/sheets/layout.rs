//! Persisted table geometry. The stock table keeps one five-column block
//! per GEM variant (expiry date column plus one column per test count);
//! rows above [`FIRST_STOCK_ROW`] are a reserved header region. Non-Gem
//! families live in flat side tables keyed by their own field sets.

use crate::models::{GemVariant, TestCount};

/// First usable stock row; rows 1..=8 are headers and legend.
pub const FIRST_STOCK_ROW: u32 = 9;
/// Last usable stock row; a variant block is full beyond this.
pub const LAST_STOCK_ROW: u32 = 200;
/// How many stock rows the cache snapshot reads per column.
pub const CACHE_ROW_SPAN: u32 = 100;

/// First data row of the flat side tables and of history/archive; row 1
/// is the column header.
pub const FIRST_DATA_ROW: u32 = 2;

pub const HISTORY_HEADER: [&str; 9] = [
    "Actor",
    "Destination",
    "Purpose",
    "Equipment",
    "Variant",
    "Quantity",
    "Expiry",
    "Timestamp",
    "Operation",
];

pub const EDAN_HEADER: [&str; 4] = ["Product", "Lot", "Expiry", "Quantity"];
pub const GETEIN_HEADER: [&str; 3] = ["Item", "Expiry", "Quantity"];

/// Expiry-date column of a variant's block.
pub fn gem_date_col(variant: GemVariant) -> u32 {
    match variant {
        GemVariant::V3500 => 1,
        GemVariant::V4000 => 6,
        GemVariant::V5000 => 11,
    }
}

/// Quantity column for one (variant, test count) bucket.
pub fn gem_test_col(variant: GemVariant, tests: TestCount) -> u32 {
    let offset = match tests {
        TestCount::T150 => 1,
        TestCount::T300 => 2,
        TestCount::T450 => 3,
        TestCount::T600 => 4,
    };
    gem_date_col(variant) + offset
}

pub const EDAN_PRODUCT_COL: u32 = 1;
pub const EDAN_LOT_COL: u32 = 2;
pub const EDAN_EXPIRY_COL: u32 = 3;
pub const EDAN_QTY_COL: u32 = 4;

pub const GETEIN_ITEM_COL: u32 = 1;
pub const GETEIN_EXPIRY_COL: u32 = 2;
pub const GETEIN_QTY_COL: u32 = 3;
