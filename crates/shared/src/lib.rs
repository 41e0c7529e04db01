pub mod config;
pub mod label;
pub mod ledger;
pub mod models;
pub mod sheets;
