//! The balance engine: the single gateway for stock mutation.
//!
//! Every stock change — POS sale, manual adjustment, opening-balance import —
//! flows through here as a read-validate-commit cycle:
//!
//! ```text
//! loop {
//!   1. Re-read product quantity + version from the store
//!   2. Validate the proposed movement against the fresh quantity
//!   3. Commit movement(s) + cached-quantity update atomically,
//!      guarded by the version read in step 1
//!   4. On version conflict: another writer landed first — go around
//! }
//! ```
//!
//! The retry loop is what serializes concurrent writers on the same product:
//! validation always runs against a quantity that was current when the
//! version was read, and the commit fails if that stops being true. Two
//! concurrent stock-outs racing for the last units therefore resolve to one
//! success and one validation failure, never to overselling.
//!
//! After a successful commit the engine publishes a notification for
//! realtime consumers. Publication is best-effort: failures are logged and
//! swallowed, never propagated into the already-committed mutation.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use stocktill_core::{ExpectedVersion, ProductId, SaleId, UserId};
use stocktill_events::{EventBus, StockNotification};
use stocktill_inventory::{
    MovementKind, MovementRequest, SortOrder, StockError, StockMovement, TimelineEntry,
    balance_timeline, check_movement,
};
use stocktill_sales::{Sale, SaleDraft, SaleError, format_sale_number};

use crate::store::{PendingMovement, StockCommit, StockStore, StoreError, StoredProduct};

/// Upper bound on commit attempts per operation. Each conflict means another
/// writer made progress, so hitting this bound takes pathological contention.
const MAX_COMMIT_ATTEMPTS: usize = 16;

/// Balance engine failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Stock validation failure (user-facing, recoverable).
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Sale draft validation failure (user-facing, recoverable).
    #[error(transparent)]
    Sale(#[from] SaleError),

    /// Concurrent writers kept invalidating the commit.
    #[error("gave up after repeated conflicting commit attempts")]
    Contention,

    /// Storage backend failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ProductNotFound(product_id) => {
                EngineError::Stock(StockError::ProductNotFound { product_id })
            }
            other => EngineError::Store(other),
        }
    }
}

/// Outcome of a single accepted movement.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMovement {
    pub movement: StockMovement,
    pub new_quantity: i64,
}

/// Outcome of a committed sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub movements: Vec<StockMovement>,
    /// Updated cached quantity per product sold.
    pub quantities: HashMap<ProductId, i64>,
}

/// Outcome of the opening-balance import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpeningBalanceReport {
    /// Products that received a synthesized opening movement.
    pub seeded: usize,
    /// Products left untouched (existing history or zero quantity).
    pub skipped: usize,
}

/// A product's ledger with per-movement balances, in presentation order.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub product_id: ProductId,
    pub current_quantity: i64,
    /// Stock implied to have existed before the earliest recorded movement.
    pub opening_stock: i64,
    pub entries: Vec<TimelineEntry>,
}

/// Movement totals over a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MovementSummary {
    pub year: i32,
    pub month: Option<u32>,
    pub inbound_total: i64,
    pub outbound_total: i64,
    pub adjustment_total: i64,
    /// Signed sum over the period.
    pub net_change: i64,
    pub movement_count: usize,
}

/// Validates proposed stock changes, applies them atomically through the
/// store, reconstructs balance timelines, and notifies realtime consumers.
#[derive(Debug)]
pub struct BalanceEngine<S, B> {
    store: S,
    bus: B,
}

impl<S, B> BalanceEngine<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> BalanceEngine<S, B>
where
    S: StockStore,
    B: EventBus<StockNotification>,
{
    /// Validate and record a single stock movement, returning the stored
    /// record and the product's updated quantity.
    pub fn apply_movement(
        &self,
        product_id: ProductId,
        request: MovementRequest,
    ) -> Result<AppliedMovement, EngineError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            // Fresh read every attempt: never validate against a quantity
            // loaded before a competing commit.
            let stored = self
                .store
                .product(product_id)?
                .ok_or(StockError::ProductNotFound { product_id })?;

            check_movement(stored.product.quantity, request.kind, request.quantity)?;

            let commit = StockCommit {
                movements: vec![PendingMovement {
                    product_id,
                    request: request.clone(),
                }],
                sale: None,
            };

            match self
                .store
                .commit(commit, vec![(product_id, ExpectedVersion::Exact(stored.version))])
            {
                Ok(receipt) => {
                    let movement = receipt.movements.into_iter().next().ok_or_else(|| {
                        EngineError::Store(StoreError::Backend(
                            "commit receipt missing movement".to_string(),
                        ))
                    })?;
                    let new_quantity =
                        receipt.quantities.get(&product_id).copied().ok_or_else(|| {
                            EngineError::Store(StoreError::Backend(
                                "commit receipt missing quantity".to_string(),
                            ))
                        })?;

                    self.notify(StockNotification::StockChanged {
                        product_id,
                        kind: movement.kind,
                        quantity: movement.quantity,
                        new_quantity,
                        actor: movement.user_id,
                        reference: movement.reference.clone(),
                        occurred_at: movement.recorded_at,
                    });

                    return Ok(AppliedMovement {
                        movement,
                        new_quantity,
                    });
                }
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(%product_id, "movement commit conflicted, retrying: {msg}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Contention)
    }

    /// Process a multi-line sale: all lines commit together with the sale
    /// record, or nothing persists at all.
    ///
    /// Lines are validated in submission order against working quantities, so
    /// a product appearing on several lines is checked against what earlier
    /// lines already took.
    pub fn process_sale(&self, draft: SaleDraft) -> Result<SaleReceipt, EngineError> {
        draft.validate()?;

        let number = format_sale_number(self.store.reserve_sale_number()?);
        let sale_id = SaleId::new();

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            // Snapshot every referenced product once per attempt.
            let mut snapshots: HashMap<ProductId, StoredProduct> = HashMap::new();
            for line in &draft.lines {
                if !snapshots.contains_key(&line.product_id) {
                    let stored = self.store.product(line.product_id)?.ok_or(
                        StockError::ProductNotFound {
                            product_id: line.product_id,
                        },
                    )?;
                    snapshots.insert(line.product_id, stored);
                }
            }

            let mut working: HashMap<ProductId, i64> = snapshots
                .iter()
                .map(|(id, s)| (*id, s.product.quantity))
                .collect();
            for line in &draft.lines {
                let current = working[&line.product_id];
                check_movement(current, MovementKind::Outbound, line.quantity)?;
                working.insert(line.product_id, current - line.quantity);
            }

            let movements = draft
                .lines
                .iter()
                .map(|line| PendingMovement {
                    product_id: line.product_id,
                    request: MovementRequest {
                        kind: MovementKind::Outbound,
                        quantity: line.quantity,
                        reason: "Sale".to_string(),
                        reference: Some(number.clone()),
                        actor: draft.cashier,
                        occurred_at: None,
                    },
                })
                .collect();

            let sale = Sale {
                id: sale_id,
                number: number.clone(),
                lines: draft.lines.clone(),
                total_cents: draft.total_cents(),
                cashier: draft.cashier,
                recorded_at: chrono::Utc::now(),
            };

            let expected = snapshots
                .iter()
                .map(|(id, s)| (*id, ExpectedVersion::Exact(s.version)))
                .collect();

            match self.store.commit(
                StockCommit {
                    movements,
                    sale: Some(sale.clone()),
                },
                expected,
            ) {
                Ok(receipt) => {
                    // Per-movement running quantities for notifications.
                    let mut running: HashMap<ProductId, i64> = snapshots
                        .iter()
                        .map(|(id, s)| (*id, s.product.quantity))
                        .collect();
                    for movement in &receipt.movements {
                        let quantity = running.entry(movement.product_id).or_insert(0);
                        *quantity += movement.kind.signed_delta(movement.quantity);
                        self.notify(StockNotification::StockChanged {
                            product_id: movement.product_id,
                            kind: movement.kind,
                            quantity: movement.quantity,
                            new_quantity: *quantity,
                            actor: movement.user_id,
                            reference: movement.reference.clone(),
                            occurred_at: movement.recorded_at,
                        });
                    }
                    self.notify(StockNotification::SaleCompleted {
                        sale_id: sale.id,
                        number: sale.number.clone(),
                        lines: sale.lines.len(),
                        total_cents: sale.total_cents,
                        occurred_at: sale.recorded_at,
                    });

                    return Ok(SaleReceipt {
                        sale,
                        movements: receipt.movements,
                        quantities: receipt.quantities,
                    });
                }
                Err(StoreError::Conflict(msg)) => {
                    tracing::debug!(sale = %number, "sale commit conflicted, retrying: {msg}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Contention)
    }

    /// One-time ledger bootstrap: synthesize an opening `in` movement for
    /// every product that has stock but no movement history.
    ///
    /// Idempotent per product — anything with existing history is skipped, so
    /// running the import twice never doubles a ledger.
    pub fn import_opening_balances(
        &self,
        actor: Option<UserId>,
    ) -> Result<OpeningBalanceReport, EngineError> {
        let mut report = OpeningBalanceReport::default();

        'products: for mut stored in self.store.list_products()? {
            let product_id = stored.product.id;

            for _ in 0..MAX_COMMIT_ATTEMPTS {
                let history = self
                    .store
                    .movements_by_product(product_id, SortOrder::Ascending)?;
                if !history.is_empty() || stored.product.quantity <= 0 {
                    report.skipped += 1;
                    continue 'products;
                }

                let commit = StockCommit {
                    movements: vec![PendingMovement {
                        product_id,
                        request: MovementRequest {
                            kind: MovementKind::Inbound,
                            quantity: stored.product.quantity,
                            reason: "Opening balance".to_string(),
                            reference: None,
                            actor,
                            occurred_at: None,
                        },
                    }],
                    sale: None,
                };

                match self
                    .store
                    .commit(commit, vec![(product_id, ExpectedVersion::Exact(stored.version))])
                {
                    Ok(receipt) => {
                        if let Some(movement) = receipt.movements.first() {
                            self.notify(StockNotification::StockChanged {
                                product_id,
                                kind: movement.kind,
                                quantity: movement.quantity,
                                new_quantity: receipt
                                    .quantities
                                    .get(&product_id)
                                    .copied()
                                    .unwrap_or(movement.quantity),
                                actor: movement.user_id,
                                reference: None,
                                occurred_at: movement.recorded_at,
                            });
                        }
                        report.seeded += 1;
                        continue 'products;
                    }
                    Err(StoreError::Conflict(_)) => {
                        // Another writer touched the product; re-read and
                        // re-check whether it still qualifies.
                        match self.store.product(product_id)? {
                            Some(fresh) => stored = fresh,
                            None => {
                                report.skipped += 1;
                                continue 'products;
                            }
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            return Err(EngineError::Contention);
        }

        Ok(report)
    }

    /// Reconstruct a product's ledger with per-movement balances.
    ///
    /// Balances are always computed on the forward chronological pass;
    /// descending order only reverses the presented entries.
    pub fn ledger(
        &self,
        product_id: ProductId,
        order: SortOrder,
    ) -> Result<LedgerView, EngineError> {
        let stored = self
            .store
            .product(product_id)?
            .ok_or(StockError::ProductNotFound { product_id })?;

        let history = self
            .store
            .movements_by_product(product_id, SortOrder::Ascending)?;
        let timeline = balance_timeline(stored.product.quantity, history);

        Ok(LedgerView {
            product_id,
            current_quantity: stored.product.quantity,
            opening_stock: timeline.opening_stock,
            entries: timeline.entries_in(order),
        })
    }

    /// Movement totals for one product over a year or a single month.
    pub fn period_summary(
        &self,
        product_id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<MovementSummary, EngineError> {
        if self.store.product(product_id)?.is_none() {
            return Err(StockError::ProductNotFound { product_id }.into());
        }

        let movements = self.store.movements_in_period(product_id, year, month)?;

        let mut summary = MovementSummary {
            year,
            month,
            inbound_total: 0,
            outbound_total: 0,
            adjustment_total: 0,
            net_change: 0,
            movement_count: movements.len(),
        };
        for movement in &movements {
            match movement.kind {
                MovementKind::Inbound => summary.inbound_total += movement.quantity,
                MovementKind::Outbound => summary.outbound_total += movement.quantity,
                MovementKind::Adjustment => summary.adjustment_total += movement.quantity,
            }
            summary.net_change += movement.kind.signed_delta(movement.quantity);
        }

        Ok(summary)
    }

    /// Best-effort publication; a failed notification never unwinds the
    /// committed stock change.
    fn notify(&self, notification: StockNotification) {
        if let Err(e) = self.bus.publish(notification) {
            tracing::warn!("stock notification publish failed (ignored): {e:?}");
        }
    }
}
