use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stocktill_core::{MovementId, ProductId, UserId};

/// Hard floor enforced on every stock-out: an outbound movement may not leave
/// fewer than this many units on hand. Independent of each product's own
/// `reorder_level`, which is advisory and only drives low-stock reporting.
///
/// TODO: confirm with the product owner whether this should track the
/// per-product reorder_level instead of a fixed floor.
pub const REORDER_BUFFER: i64 = 20;

/// Direction-tagged kind of a stock movement.
///
/// The sign convention lives in [`MovementKind::signed_delta`]: inbound and
/// adjustment movements add stock, outbound movements remove it. Adjustments
/// are always additive; downward corrections are recorded as outbound
/// movements by callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "in")]
    Inbound,
    #[serde(rename = "out")]
    Outbound,
    #[serde(rename = "adjustment")]
    Adjustment,
}

impl MovementKind {
    /// Stable wire name ("in" / "out" / "adjustment").
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "in",
            MovementKind::Outbound => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }

    /// Map a positive magnitude to its signed effect on the cached quantity.
    pub fn signed_delta(&self, magnitude: i64) -> i64 {
        match self {
            MovementKind::Inbound | MovementKind::Adjustment => magnitude,
            MovementKind::Outbound => -magnitude,
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementKind::Inbound),
            "out" => Ok(MovementKind::Outbound),
            "adjustment" => Ok(MovementKind::Adjustment),
            other => Err(StockError::UnknownMovementType {
                value: other.to_string(),
            }),
        }
    }
}

/// Stock validation failure.
///
/// All variants are recoverable, user-facing validation failures; none is a
/// process-level fault. The amounts carried here feed the human-readable
/// messages shown at the request boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("movement quantity must be a positive integer (got {requested})")]
    InvalidQuantity { requested: i64 },

    #[error("insufficient stock: requested {requested}, only {current} on hand")]
    InsufficientStock { current: i64, requested: i64 },

    #[error(
        "stock-out of {requested} would leave {remaining} units (currently {current}), below the reorder buffer"
    )]
    BelowReorderBuffer {
        current: i64,
        requested: i64,
        remaining: i64,
    },

    #[error("unknown movement type '{value}' (expected one of: in, out, adjustment)")]
    UnknownMovementType { value: String },

    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },
}

/// Validate a proposed stock change against the current on-hand quantity.
///
/// `current` must be a freshly read value; callers re-read it inside their
/// commit loop so concurrent writers cannot slip a stale quantity past these
/// checks. Checks run in a fixed order: quantity positivity, then (for
/// stock-outs) availability, then the reorder buffer floor.
pub fn check_movement(current: i64, kind: MovementKind, quantity: i64) -> Result<(), StockError> {
    if quantity <= 0 {
        return Err(StockError::InvalidQuantity {
            requested: quantity,
        });
    }

    if kind == MovementKind::Outbound {
        if current < quantity {
            return Err(StockError::InsufficientStock {
                current,
                requested: quantity,
            });
        }

        let remaining = current - quantity;
        if remaining < REORDER_BUFFER {
            return Err(StockError::BelowReorderBuffer {
                current,
                requested: quantity,
                remaining,
            });
        }
    }

    Ok(())
}

/// One immutable record in a product's stock ledger.
///
/// Movements are append-only: corrections are expressed as new adjustment
/// movements, never edits. `recorded_at` is the ordering key; `sequence` is
/// the per-product insertion order and breaks timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    /// Acting user, informational only.
    pub user_id: Option<UserId>,
    pub kind: MovementKind,
    /// Positive magnitude; direction is encoded by `kind`.
    pub quantity: i64,
    pub reason: String,
    /// Correlation id, e.g. the sale number that caused this movement.
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Monotonically increasing position in the product's ledger.
    pub sequence: u64,
}

/// A proposed stock change, before validation and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub actor: Option<UserId>,
    /// Caller-supplied timestamp for backfill/seeding; the store assigns the
    /// current time when absent.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl MovementRequest {
    pub fn new(kind: MovementKind, quantity: i64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            quantity,
            reason: reason.into(),
            reference: None,
            actor: None,
            occurred_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_names() {
        for kind in [
            MovementKind::Inbound,
            MovementKind::Outbound,
            MovementKind::Adjustment,
        ] {
            assert_eq!(kind.as_str().parse::<MovementKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = "transfer".parse::<MovementKind>().unwrap_err();
        match err {
            StockError::UnknownMovementType { value } => assert_eq!(value, "transfer"),
            other => panic!("expected UnknownMovementType, got {other:?}"),
        }
    }

    #[test]
    fn sign_convention_matches_kind() {
        assert_eq!(MovementKind::Inbound.signed_delta(5), 5);
        assert_eq!(MovementKind::Adjustment.signed_delta(5), 5);
        assert_eq!(MovementKind::Outbound.signed_delta(5), -5);
    }

    #[test]
    fn non_positive_quantity_is_rejected_first() {
        let err = check_movement(100, MovementKind::Outbound, 0).unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity { requested: 0 }));

        let err = check_movement(100, MovementKind::Inbound, -3).unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity { requested: -3 }));
    }

    #[test]
    fn outbound_beyond_on_hand_is_insufficient() {
        let err = check_movement(10, MovementKind::Outbound, 11).unwrap_err();
        match err {
            StockError::InsufficientStock { current, requested } => {
                assert_eq!(current, 10);
                assert_eq!(requested, 11);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn outbound_into_the_buffer_is_rejected() {
        // 25 - 6 = 19, one unit under the floor.
        let err = check_movement(25, MovementKind::Outbound, 6).unwrap_err();
        match err {
            StockError::BelowReorderBuffer {
                current,
                requested,
                remaining,
            } => {
                assert_eq!(current, 25);
                assert_eq!(requested, 6);
                assert_eq!(remaining, 19);
            }
            other => panic!("expected BelowReorderBuffer, got {other:?}"),
        }
    }

    #[test]
    fn exactly_depleting_stock_still_hits_the_buffer() {
        // The floor applies even when the caller thinks all 50 are "available".
        let err = check_movement(50, MovementKind::Outbound, 50).unwrap_err();
        assert!(matches!(
            err,
            StockError::BelowReorderBuffer { remaining: 0, .. }
        ));
    }

    #[test]
    fn outbound_leaving_exactly_the_buffer_passes() {
        assert!(check_movement(26, MovementKind::Outbound, 6).is_ok());
    }

    #[test]
    fn inbound_and_adjustment_ignore_the_buffer() {
        assert!(check_movement(0, MovementKind::Inbound, 100).is_ok());
        assert!(check_movement(0, MovementKind::Adjustment, 3).is_ok());
    }
}
