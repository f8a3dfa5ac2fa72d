//! Integration notifications published after committed stock mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktill_core::{ProductId, SaleId, UserId};
use stocktill_inventory::MovementKind;

use crate::event::Event;

/// Realtime sync message for connected clients.
///
/// Emitted by the balance engine *after* a successful commit; carries enough
/// state for a client to update its view without re-querying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockNotification {
    /// A movement was recorded and the product's cached quantity updated.
    StockChanged {
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        new_quantity: i64,
        actor: Option<UserId>,
        reference: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    /// A multi-line sale committed in full.
    SaleCompleted {
        sale_id: SaleId,
        number: String,
        lines: usize,
        total_cents: u64,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for StockNotification {
    fn event_type(&self) -> &'static str {
        match self {
            StockNotification::StockChanged { .. } => "stock.changed",
            StockNotification::SaleCompleted { .. } => "sale.completed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockNotification::StockChanged { occurred_at, .. } => *occurred_at,
            StockNotification::SaleCompleted { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::in_memory_bus::InMemoryEventBus;

    #[test]
    fn notifications_fan_out_through_the_bus() {
        let bus: InMemoryEventBus<StockNotification> = InMemoryEventBus::new();
        let sub = bus.subscribe();

        let note = StockNotification::StockChanged {
            product_id: ProductId::new(),
            kind: MovementKind::Inbound,
            quantity: 10,
            new_quantity: 10,
            actor: None,
            reference: None,
            occurred_at: Utc::now(),
        };
        bus.publish(note.clone()).unwrap();

        let received = sub.try_recv().unwrap();
        assert_eq!(received, note);
        assert_eq!(received.event_type(), "stock.changed");
    }
}
