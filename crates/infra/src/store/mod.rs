//! Stock storage boundary.
//!
//! This module defines the infrastructure-facing abstraction behind which
//! products, the append-only movement ledger, sales, and catalog records
//! live, without making any storage assumptions. The one non-negotiable is
//! [`StockStore::commit`]: a ledger append and the cached-quantity update it
//! implies are a single atomic unit, never observable half-applied.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{
    CommitReceipt, PendingMovement, ResetReport, StockCommit, StockStore, StoreError,
    StoredProduct,
};
