//! Running-balance reconstruction from a product's movement history.
//!
//! The source of truth for "how much is on hand right now" sits at the *end*
//! of history (the cached quantity), so the timeline works backward from the
//! current quantity to infer the stock that existed before the earliest
//! recorded movement, then walks forward again to attach per-movement
//! balances.

use serde::{Deserialize, Serialize};

use crate::movement::StockMovement;

/// Presentation order for a ledger listing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Sum of signed movement deltas over a history slice.
pub fn signed_total(history: &[StockMovement]) -> i64 {
    history
        .iter()
        .map(|m| m.kind.signed_delta(m.quantity))
        .sum()
}

/// One movement annotated with the balances around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub movement: StockMovement,
    /// On-hand quantity immediately before this movement.
    pub opening_balance: i64,
    /// On-hand quantity immediately after this movement.
    pub running_balance: i64,
}

/// A product's full balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTimeline {
    /// Stock implied to have existed before the earliest recorded movement
    /// (opening-balance imports make this zero for bootstrapped products).
    pub opening_stock: i64,
    /// Entries in chronological (ascending) order.
    pub entries: Vec<TimelineEntry>,
}

impl BalanceTimeline {
    /// Entries in the requested presentation order.
    ///
    /// Balances are always computed on the forward pass; descending order
    /// only reverses the annotated output for display.
    pub fn entries_in(self, order: SortOrder) -> Vec<TimelineEntry> {
        match order {
            SortOrder::Ascending => self.entries,
            SortOrder::Descending => {
                let mut entries = self.entries;
                entries.reverse();
                entries
            }
        }
    }
}

/// Derive per-movement balances from the cached current quantity and the full
/// chronological movement history (ascending by `(recorded_at, sequence)`).
///
/// The opening baseline is `current_quantity - sum(signed deltas)`, clamped
/// to zero since stock can never be meaningfully negative; every intermediate
/// balance is clamped the same way.
pub fn balance_timeline(current_quantity: i64, history: Vec<StockMovement>) -> BalanceTimeline {
    let opening_stock = (current_quantity - signed_total(&history)).max(0);

    let mut balance = opening_stock;
    let entries = history
        .into_iter()
        .map(|movement| {
            let opening_balance = balance;
            balance = (balance + movement.kind.signed_delta(movement.quantity)).max(0);
            TimelineEntry {
                movement,
                opening_balance,
                running_balance: balance,
            }
        })
        .collect();

    BalanceTimeline {
        opening_stock,
        entries,
    }
}
