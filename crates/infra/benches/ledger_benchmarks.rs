use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use stocktill_core::ProductId;
use stocktill_events::{InMemoryEventBus, StockNotification};
use stocktill_infra::engine::BalanceEngine;
use stocktill_infra::store::{InMemoryStockStore, StockStore};
use stocktill_inventory::{MovementKind, MovementRequest, SortOrder, balance_timeline};
use stocktill_products::ProductDraft;

type BenchEngine =
    BalanceEngine<Arc<InMemoryStockStore>, Arc<InMemoryEventBus<StockNotification>>>;

fn setup_engine() -> (BenchEngine, Arc<InMemoryStockStore>) {
    let store = Arc::new(InMemoryStockStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    (BalanceEngine::new(store.clone(), bus), store)
}

fn seed_product(store: &InMemoryStockStore, quantity: i64) -> ProductId {
    let product = ProductDraft {
        name: "bench".to_string(),
        sku: format!("BENCH-{}", ProductId::new()),
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

fn bench_movement_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_application");
    group.sample_size(1000);

    group.bench_function("inbound_fresh_product", |b| {
        let (engine, store) = setup_engine();
        b.iter(|| {
            let product_id = seed_product(&store, 0);
            engine
                .apply_movement(
                    product_id,
                    MovementRequest::new(MovementKind::Inbound, black_box(100), "bench"),
                )
                .unwrap()
        });
    });

    group.bench_function("inbound_growing_ledger", |b| {
        let (engine, store) = setup_engine();
        let product_id = seed_product(&store, 0);
        b.iter(|| {
            engine
                .apply_movement(
                    product_id,
                    MovementRequest::new(MovementKind::Inbound, black_box(1), "bench"),
                )
                .unwrap()
        });
    });

    group.finish();
}

fn bench_timeline_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_reconstruction");

    for size in [10usize, 100, 1_000] {
        let (engine, store) = setup_engine();
        let product_id = seed_product(&store, 0);
        engine
            .apply_movement(
                product_id,
                MovementRequest::new(MovementKind::Inbound, (size as i64) * 10, "seed"),
            )
            .unwrap();
        for _ in 0..size.saturating_sub(1) {
            engine
                .apply_movement(
                    product_id,
                    MovementRequest::new(MovementKind::Outbound, 1, "bench"),
                )
                .unwrap();
        }

        let history = store
            .movements_by_product(product_id, SortOrder::Ascending)
            .unwrap();
        let current = store
            .product(product_id)
            .unwrap()
            .unwrap()
            .product
            .quantity;

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("balance_timeline", size), &size, |b, _| {
            b.iter(|| balance_timeline(black_box(current), black_box(history.clone())))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_movement_application,
    bench_timeline_reconstruction
);
criterion_main!(benches);
