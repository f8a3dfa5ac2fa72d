//! Inventory domain module: the stock-movement ledger and balance rules.
//!
//! This crate contains the business rules for stock changes, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//! movement kinds and their sign convention, stock-out validation, and the
//! running-balance timeline computed from a product's movement history.

pub mod movement;
pub mod timeline;

pub use movement::{
    MovementKind, MovementRequest, REORDER_BUFFER, StockError, StockMovement, check_movement,
};
pub use timeline::{BalanceTimeline, SortOrder, TimelineEntry, balance_timeline, signed_total};
