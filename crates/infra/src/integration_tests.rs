//! Integration tests for the full stock pipeline.
//!
//! Tests: BalanceEngine → StockStore → EventBus
//!
//! Verifies:
//! - The cached quantity always reconciles with the ledger
//! - Stock-out validation (insufficient stock, reorder buffer) holds under
//!   concurrent writers
//! - Multi-item sales commit all-or-nothing
//! - The opening-balance import is idempotent

use std::sync::{Arc, Barrier, mpsc};
use std::thread;

use chrono::{TimeZone, Utc};

use stocktill_core::ProductId;
use stocktill_events::{EventBus, InMemoryEventBus, StockNotification, Subscription};
use stocktill_inventory::{MovementKind, MovementRequest, SortOrder, StockError, signed_total};
use stocktill_products::ProductDraft;
use stocktill_sales::{SaleDraft, SaleLine};

use crate::engine::{BalanceEngine, EngineError};
use crate::store::{InMemoryStockStore, StockStore};

type TestEngine = BalanceEngine<Arc<InMemoryStockStore>, Arc<InMemoryEventBus<StockNotification>>>;

fn setup() -> (
    TestEngine,
    Arc<InMemoryStockStore>,
    Arc<InMemoryEventBus<StockNotification>>,
) {
    let store = Arc::new(InMemoryStockStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    (BalanceEngine::new(store.clone(), bus.clone()), store, bus)
}

fn seed_product(store: &InMemoryStockStore, name: &str, quantity: i64) -> ProductId {
    let product = ProductDraft {
        name: name.to_string(),
        sku: format!("SKU-{name}"),
        price_cents: 100,
        category_id: None,
        supplier_id: None,
        initial_quantity: quantity,
        reorder_level: None,
    }
    .into_product(ProductId::new(), Utc::now())
    .unwrap();
    store.insert_product(product).unwrap().product.id
}

fn outbound(quantity: i64) -> MovementRequest {
    MovementRequest::new(MovementKind::Outbound, quantity, "test")
}

fn inbound(quantity: i64) -> MovementRequest {
    MovementRequest::new(MovementKind::Inbound, quantity, "test")
}

#[test]
fn inbound_movement_updates_quantity_and_ledger() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 0);

    let applied = engine.apply_movement(product_id, inbound(100)).unwrap();
    assert_eq!(applied.new_quantity, 100);
    assert_eq!(applied.movement.sequence, 1);

    let view = engine.ledger(product_id, SortOrder::Ascending).unwrap();
    assert_eq!(view.current_quantity, 100);
    assert_eq!(view.opening_stock, 0);
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].running_balance, 100);
}

#[test]
fn outbound_into_the_reorder_buffer_leaves_no_trace() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 25);

    let err = engine.apply_movement(product_id, outbound(6)).unwrap_err();
    match err {
        EngineError::Stock(StockError::BelowReorderBuffer {
            current,
            requested,
            remaining,
        }) => {
            assert_eq!((current, requested, remaining), (25, 6, 19));
        }
        other => panic!("expected BelowReorderBuffer, got {other:?}"),
    }

    // Nothing recorded, nothing changed.
    let stored = store.product(product_id).unwrap().unwrap();
    assert_eq!(stored.product.quantity, 25);
    assert!(
        store
            .movements_by_product(product_id, SortOrder::Ascending)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn exactly_depleting_stock_is_still_blocked_by_the_buffer() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 50);

    let err = engine.apply_movement(product_id, outbound(50)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Stock(StockError::BelowReorderBuffer { remaining: 0, .. })
    ));
}

#[test]
fn movement_against_unknown_product_reports_not_found() {
    let (engine, _store, _bus) = setup();
    let err = engine
        .apply_movement(ProductId::new(), inbound(5))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Stock(StockError::ProductNotFound { .. })
    ));
}

#[test]
fn cached_quantity_always_reconciles_with_the_ledger() {
    let (engine, store, _bus) = setup();
    // Baseline 40 exists before any ledger history.
    let product_id = seed_product(&store, "beans", 40);

    engine.apply_movement(product_id, inbound(60)).unwrap();
    engine.apply_movement(product_id, outbound(30)).unwrap();
    engine
        .apply_movement(
            product_id,
            MovementRequest::new(MovementKind::Adjustment, 5, "recount"),
        )
        .unwrap();

    let stored = store.product(product_id).unwrap().unwrap();
    let history = store
        .movements_by_product(product_id, SortOrder::Ascending)
        .unwrap();
    assert_eq!(stored.product.quantity, 40 + signed_total(&history));

    let view = engine.ledger(product_id, SortOrder::Ascending).unwrap();
    assert_eq!(view.opening_stock, 40);
    assert_eq!(view.entries.last().unwrap().running_balance, 75);
}

#[test]
fn opening_balance_import_is_idempotent() {
    let (engine, store, _bus) = setup();
    let bootstrapped = seed_product(&store, "beans", 40);
    let empty = seed_product(&store, "rice", 0);
    let tracked = seed_product(&store, "salt", 30);
    engine.apply_movement(tracked, inbound(10)).unwrap();

    let first = engine.import_opening_balances(None).unwrap();
    assert_eq!(first.seeded, 1);
    assert_eq!(first.skipped, 2);

    let second = engine.import_opening_balances(None).unwrap();
    assert_eq!(second.seeded, 0);
    assert_eq!(second.skipped, 3);

    let history = store
        .movements_by_product(bootstrapped, SortOrder::Ascending)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, MovementKind::Inbound);
    assert_eq!(history[0].quantity, 40);
    assert_eq!(history[0].reason, "Opening balance");

    assert!(
        store
            .movements_by_product(empty, SortOrder::Ascending)
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        store
            .movements_by_product(tracked, SortOrder::Ascending)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn concurrent_stockouts_cannot_oversell() {
    let (engine, store, _bus) = setup();
    // 120 on hand, floor of 20: exactly one outbound of 100 can succeed.
    let product_id = seed_product(&store, "beans", 120);

    let engine = Arc::new(engine);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.apply_movement(product_id, outbound(100))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one stock-out must win: {results:?}");
    let failure = results
        .into_iter()
        .find(Result::is_err)
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        failure,
        EngineError::Stock(
            StockError::InsufficientStock { .. } | StockError::BelowReorderBuffer { .. }
        )
    ));

    let stored = store.product(product_id).unwrap().unwrap();
    assert_eq!(stored.product.quantity, 20);
    assert_eq!(
        store
            .movements_by_product(product_id, SortOrder::Ascending)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn failing_sale_line_rolls_back_the_whole_sale() {
    let (engine, store, _bus) = setup();
    let a = seed_product(&store, "beans", 100);
    // 21 on hand: taking 5 would leave 16, under the floor.
    let b = seed_product(&store, "rice", 21);
    let c = seed_product(&store, "salt", 100);

    let draft = SaleDraft {
        lines: vec![
            SaleLine {
                product_id: a,
                quantity: 10,
                unit_price_cents: 100,
            },
            SaleLine {
                product_id: b,
                quantity: 5,
                unit_price_cents: 200,
            },
            SaleLine {
                product_id: c,
                quantity: 10,
                unit_price_cents: 300,
            },
        ],
        cashier: None,
    };

    let err = engine.process_sale(draft).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Stock(StockError::BelowReorderBuffer { .. })
    ));

    // No movements, no quantity changes, no sale record.
    for product_id in [a, b, c] {
        assert!(
            store
                .movements_by_product(product_id, SortOrder::Ascending)
                .unwrap()
                .is_empty()
        );
    }
    assert_eq!(store.product(a).unwrap().unwrap().product.quantity, 100);
    assert_eq!(store.product(b).unwrap().unwrap().product.quantity, 21);
    assert_eq!(store.product(c).unwrap().unwrap().product.quantity, 100);
    assert!(store.sales().unwrap().is_empty());
}

#[test]
fn committed_sale_records_movements_sale_and_notifications() {
    let (engine, store, bus) = setup();
    let a = seed_product(&store, "beans", 100);
    let b = seed_product(&store, "rice", 50);
    let sub = bus.subscribe();

    let receipt = engine
        .process_sale(SaleDraft {
            lines: vec![
                SaleLine {
                    product_id: a,
                    quantity: 10,
                    unit_price_cents: 100,
                },
                SaleLine {
                    product_id: b,
                    quantity: 5,
                    unit_price_cents: 200,
                },
            ],
            cashier: None,
        })
        .unwrap();

    assert_eq!(receipt.sale.number, "POS-000001");
    assert_eq!(receipt.sale.total_cents, 2000);
    assert_eq!(receipt.movements.len(), 2);
    for movement in &receipt.movements {
        assert_eq!(movement.kind, MovementKind::Outbound);
        assert_eq!(movement.reason, "Sale");
        assert_eq!(movement.reference.as_deref(), Some("POS-000001"));
    }
    assert_eq!(receipt.quantities[&a], 90);
    assert_eq!(receipt.quantities[&b], 45);

    let sales = store.sales().unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].id, receipt.sale.id);

    // Two stock notifications plus the sale-completed one.
    let mut kinds = Vec::new();
    while let Ok(note) = sub.try_recv() {
        kinds.push(match note {
            StockNotification::StockChanged { .. } => "stock",
            StockNotification::SaleCompleted { number, .. } => {
                assert_eq!(number, "POS-000001");
                "sale"
            }
        });
    }
    assert_eq!(kinds, vec!["stock", "stock", "sale"]);
}

#[test]
fn repeated_product_lines_validate_against_working_quantity() {
    let (engine, store, _bus) = setup();
    // 50 on hand: 10 then 25 would end at 15, under the floor — the second
    // line must see the first line's deduction.
    let product_id = seed_product(&store, "beans", 50);

    let err = engine
        .process_sale(SaleDraft {
            lines: vec![
                SaleLine {
                    product_id,
                    quantity: 10,
                    unit_price_cents: 100,
                },
                SaleLine {
                    product_id,
                    quantity: 25,
                    unit_price_cents: 100,
                },
            ],
            cashier: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Stock(StockError::BelowReorderBuffer { remaining: 15, .. })
    ));
    assert_eq!(
        store.product(product_id).unwrap().unwrap().product.quantity,
        50
    );

    // With enough stock both lines commit and the ledger carries both.
    let roomy = seed_product(&store, "rice", 100);
    engine
        .process_sale(SaleDraft {
            lines: vec![
                SaleLine {
                    product_id: roomy,
                    quantity: 10,
                    unit_price_cents: 100,
                },
                SaleLine {
                    product_id: roomy,
                    quantity: 25,
                    unit_price_cents: 100,
                },
            ],
            cashier: None,
        })
        .unwrap();
    assert_eq!(store.product(roomy).unwrap().unwrap().product.quantity, 65);
    assert_eq!(
        store
            .movements_by_product(roomy, SortOrder::Ascending)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn ledger_descending_presents_newest_first_with_forward_balances() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 0);

    engine.apply_movement(product_id, inbound(100)).unwrap();
    engine.apply_movement(product_id, outbound(30)).unwrap();

    let view = engine.ledger(product_id, SortOrder::Descending).unwrap();
    assert_eq!(view.entries.len(), 2);
    assert_eq!(view.entries[0].movement.kind, MovementKind::Outbound);
    assert_eq!(view.entries[0].opening_balance, 100);
    assert_eq!(view.entries[0].running_balance, 70);
    assert_eq!(view.entries[1].movement.kind, MovementKind::Inbound);
    assert_eq!(view.entries[1].running_balance, 100);
}

#[test]
fn period_summary_filters_by_year_and_month() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 0);

    let jan = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
    let feb = Utc.with_ymd_and_hms(2025, 2, 3, 9, 30, 0).unwrap();

    let mut first = inbound(100);
    first.occurred_at = Some(jan);
    engine.apply_movement(product_id, first).unwrap();

    let mut second = outbound(25);
    second.occurred_at = Some(feb);
    engine.apply_movement(product_id, second).unwrap();

    let january = engine.period_summary(product_id, 2025, Some(1)).unwrap();
    assert_eq!(january.inbound_total, 100);
    assert_eq!(january.outbound_total, 0);
    assert_eq!(january.net_change, 100);
    assert_eq!(january.movement_count, 1);

    let whole_year = engine.period_summary(product_id, 2025, None).unwrap();
    assert_eq!(whole_year.movement_count, 2);
    assert_eq!(whole_year.net_change, 75);

    let other_year = engine.period_summary(product_id, 2024, None).unwrap();
    assert_eq!(other_year.movement_count, 0);
}

#[test]
fn reset_clears_ledgers_sales_and_quantities() {
    let (engine, store, _bus) = setup();
    let product_id = seed_product(&store, "beans", 0);
    engine.apply_movement(product_id, inbound(100)).unwrap();
    engine
        .process_sale(SaleDraft {
            lines: vec![SaleLine {
                product_id,
                quantity: 10,
                unit_price_cents: 100,
            }],
            cashier: None,
        })
        .unwrap();

    let report = store.reset_stock_data().unwrap();
    assert_eq!(report.movements_deleted, 2);
    assert_eq!(report.sales_deleted, 1);
    assert_eq!(report.products_zeroed, 1);

    assert_eq!(
        store.product(product_id).unwrap().unwrap().product.quantity,
        0
    );
    assert!(
        store
            .movements_by_product(product_id, SortOrder::Ascending)
            .unwrap()
            .is_empty()
    );
    assert!(store.sales().unwrap().is_empty());
}

/// Bus that rejects every publish, standing in for a broken realtime layer.
struct FailingBus;

impl EventBus<StockNotification> for FailingBus {
    type Error = String;

    fn publish(&self, _message: StockNotification) -> Result<(), Self::Error> {
        Err("realtime layer down".to_string())
    }

    fn subscribe(&self) -> Subscription<StockNotification> {
        let (_tx, rx) = mpsc::channel();
        Subscription::new(rx)
    }
}

#[test]
fn notification_failures_never_unwind_the_commit() {
    let store = Arc::new(InMemoryStockStore::new());
    let engine = BalanceEngine::new(store.clone(), FailingBus);
    let product_id = seed_product(&store, "beans", 0);

    let applied = engine.apply_movement(product_id, inbound(10)).unwrap();
    assert_eq!(applied.new_quantity, 10);
    assert_eq!(
        store.product(product_id).unwrap().unwrap().product.quantity,
        10
    );
}
