use std::sync::Arc;

use stocktill_events::{EventBus, InMemoryEventBus, StockNotification};
use stocktill_infra::engine::BalanceEngine;
use stocktill_infra::store::{InMemoryStockStore, PostgresStockStore, StockStore};

pub type SharedStore = Arc<dyn StockStore>;
pub type SharedBus = Arc<InMemoryEventBus<StockNotification>>;

/// Application-level services shared by all handlers.
pub struct AppServices {
    engine: BalanceEngine<SharedStore, SharedBus>,
    store: SharedStore,
    bus: SharedBus,
}

impl AppServices {
    pub fn engine(&self) -> &BalanceEngine<SharedStore, SharedBus> {
        &self.engine
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }
}

/// Wire up the stock store, notification bus, and balance engine.
///
/// The store backend is selected at startup: in-memory by default,
/// Postgres when `USE_PERSISTENT_STORE=true` (requires `DATABASE_URL`).
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORE")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let store: SharedStore = if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORE=true");
        let store = PostgresStockStore::connect(&database_url)
            .await
            .expect("failed to connect to postgres stock store");
        tracing::info!("using postgres stock store");
        Arc::new(store)
    } else {
        tracing::info!("using in-memory stock store");
        Arc::new(InMemoryStockStore::new())
    };

    let bus: SharedBus = Arc::new(InMemoryEventBus::new());

    // Background subscriber: keeps a live consumer on the bus and surfaces
    // notifications in the logs for debugging realtime clients.
    {
        let sub = bus.subscribe();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(notification) => {
                        tracing::debug!(?notification, "stock notification");
                    }
                    Err(_) => break,
                }
            }
        });
    }

    AppServices {
        engine: BalanceEngine::new(store.clone(), bus.clone()),
        store,
        bus,
    }
}
