//! Best-effort notification layer.
//!
//! After the balance engine commits a stock change, it publishes a typed
//! notification here for realtime consumers (connected tills, dashboards).
//! Publication is strictly best-effort: the committed mutation is never
//! rolled back or blocked by a failing subscriber.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::StockNotification;
