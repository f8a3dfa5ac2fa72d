use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use stocktill_core::{CategoryId, ExpectedVersion, ProductId, SaleId, SupplierId};
use stocktill_inventory::{MovementRequest, SortOrder, StockMovement};
use stocktill_products::{Category, Product, Supplier};
use stocktill_sales::Sale;

/// A product record plus its store-side version counter.
///
/// The version is bumped on every committed write that touches the record
/// and drives the optimistic concurrency check in [`StockStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProduct {
    pub product: Product,
    pub version: u64,
}

/// One movement scheduled inside an atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMovement {
    pub product_id: ProductId,
    pub request: MovementRequest,
}

/// The atomic unit of the write path: a batch of movements plus an optional
/// sale record, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct StockCommit {
    pub movements: Vec<PendingMovement>,
    pub sale: Option<Sale>,
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Stored movements, in the order they were submitted.
    pub movements: Vec<StockMovement>,
    /// Updated cached quantity per touched product.
    pub quantities: HashMap<ProductId, i64>,
    pub sale: Option<Sale>,
}

/// Outcome of the bulk data-reset operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ResetReport {
    pub movements_deleted: usize,
    pub sales_deleted: usize,
    pub products_zeroed: usize,
}

/// Stock store operation error.
///
/// These are infrastructure failures (concurrency, storage) plus the few
/// referential checks only the store can make. Stock *validation* failures
/// live in the domain layer and never originate here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed; the caller should re-read and
    /// re-validate before retrying.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("sku '{0}' is already in use")]
    DuplicateSku(String),

    /// The commit would corrupt the ledger/quantity invariant (e.g. drive a
    /// cached quantity negative). Validation upstream normally prevents this.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Durable home of products, their append-only movement ledgers, sales, and
/// catalog records.
///
/// ## Commit semantics
///
/// `commit()` is the only write path for stock:
/// - verifies the caller's `ExpectedVersion` for every listed product,
/// - appends every movement (assigning id, per-product `sequence`, and
///   `recorded_at` — a caller-supplied `occurred_at` wins, for
///   backfill/seeding),
/// - applies each movement's signed delta to the owning product's cached
///   quantity and bumps the product version,
/// - persists the optional sale record,
///
/// all within one atomic unit. On any failure nothing is applied and the
/// error reports why; concurrent readers never observe a half-applied
/// commit. Movements are never edited or removed afterwards except by
/// `reset_stock_data`.
///
/// ## Read semantics
///
/// Ledger reads are ordered by `(recorded_at, sequence)`; an unknown product
/// yields an empty ledger (existence checks belong to the caller).
pub trait StockStore: Send + Sync {
    fn insert_product(&self, product: Product) -> Result<StoredProduct, StoreError>;

    fn product(&self, id: ProductId) -> Result<Option<StoredProduct>, StoreError>;

    fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError>;

    /// Replace a product's catalog fields. The cached quantity is preserved
    /// from the stored record regardless of the value passed in; stock only
    /// moves through `commit()`.
    fn update_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<StoredProduct, StoreError>;

    /// Delete a product and its ledger. Returns whether it existed.
    fn remove_product(&self, id: ProductId) -> Result<bool, StoreError>;

    fn commit(
        &self,
        commit: StockCommit,
        expected: Vec<(ProductId, ExpectedVersion)>,
    ) -> Result<CommitReceipt, StoreError>;

    fn movements_by_product(
        &self,
        id: ProductId,
        order: SortOrder,
    ) -> Result<Vec<StockMovement>, StoreError>;

    /// Reporting filter; an omitted month means the entire year.
    fn movements_in_period(
        &self,
        id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<StockMovement>, StoreError>;

    /// Atomically reserve the next sale-number counter value. Gaps from
    /// abandoned sales are acceptable.
    fn reserve_sale_number(&self) -> Result<u64, StoreError>;

    fn sales(&self) -> Result<Vec<Sale>, StoreError>;

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError>;

    fn insert_category(&self, category: Category) -> Result<(), StoreError>;

    fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    fn remove_category(&self, id: CategoryId) -> Result<bool, StoreError>;

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), StoreError>;

    fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError>;

    fn remove_supplier(&self, id: SupplierId) -> Result<bool, StoreError>;

    /// Bulk data reset: delete all movements and sales, zero every cached
    /// quantity. The only sanctioned way ledger records ever disappear.
    fn reset_stock_data(&self) -> Result<ResetReport, StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn insert_product(&self, product: Product) -> Result<StoredProduct, StoreError> {
        (**self).insert_product(product)
    }

    fn product(&self, id: ProductId) -> Result<Option<StoredProduct>, StoreError> {
        (**self).product(id)
    }

    fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError> {
        (**self).list_products()
    }

    fn update_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<StoredProduct, StoreError> {
        (**self).update_product(product, expected)
    }

    fn remove_product(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).remove_product(id)
    }

    fn commit(
        &self,
        commit: StockCommit,
        expected: Vec<(ProductId, ExpectedVersion)>,
    ) -> Result<CommitReceipt, StoreError> {
        (**self).commit(commit, expected)
    }

    fn movements_by_product(
        &self,
        id: ProductId,
        order: SortOrder,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements_by_product(id, order)
    }

    fn movements_in_period(
        &self,
        id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements_in_period(id, year, month)
    }

    fn reserve_sale_number(&self) -> Result<u64, StoreError> {
        (**self).reserve_sale_number()
    }

    fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        (**self).sales()
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        (**self).sale(id)
    }

    fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        (**self).insert_category(category)
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        (**self).list_categories()
    }

    fn remove_category(&self, id: CategoryId) -> Result<bool, StoreError> {
        (**self).remove_category(id)
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), StoreError> {
        (**self).insert_supplier(supplier)
    }

    fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        (**self).list_suppliers()
    }

    fn remove_supplier(&self, id: SupplierId) -> Result<bool, StoreError> {
        (**self).remove_supplier(id)
    }

    fn reset_stock_data(&self) -> Result<ResetReport, StoreError> {
        (**self).reset_stock_data()
    }
}
