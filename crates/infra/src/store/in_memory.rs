use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Datelike, Utc};

use stocktill_core::{CategoryId, ExpectedVersion, MovementId, ProductId, SaleId, SupplierId};
use stocktill_inventory::{SortOrder, StockMovement};
use stocktill_products::{Category, Product, Supplier};
use stocktill_sales::Sale;

use super::r#trait::{
    CommitReceipt, ResetReport, StockCommit, StockStore, StoreError, StoredProduct,
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, StoredProduct>,
    ledgers: HashMap<ProductId, Vec<StockMovement>>,
    sales: Vec<Sale>,
    categories: HashMap<CategoryId, Category>,
    suppliers: HashMap<SupplierId, Supplier>,
    sale_counter: u64,
}

impl State {
    fn next_sequence(&self, product_id: ProductId) -> u64 {
        self.ledgers
            .get(&product_id)
            .and_then(|ledger| ledger.last())
            .map(|m| m.sequence)
            .unwrap_or(0)
            + 1
    }
}

/// In-memory stock store.
///
/// One lock over the whole state makes the commit trivially atomic: a write
/// either fully lands or the lock was never taken for writing. Intended for
/// tests/dev; not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: RwLock<State>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl StockStore for InMemoryStockStore {
    fn insert_product(&self, product: Product) -> Result<StoredProduct, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        if state.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        if state
            .products
            .values()
            .any(|s| s.product.sku == product.sku)
        {
            return Err(StoreError::DuplicateSku(product.sku));
        }

        let stored = StoredProduct {
            product,
            version: 1,
        };
        state.products.insert(stored.product.id, stored.clone());
        Ok(stored)
    }

    fn product(&self, id: ProductId) -> Result<Option<StoredProduct>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.products.get(&id).cloned())
    }

    fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut products: Vec<StoredProduct> = state.products.values().cloned().collect();
        products.sort_by_key(|s| (s.product.created_at, *s.product.id.as_uuid().as_bytes()));
        Ok(products)
    }

    fn update_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<StoredProduct, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        let current = state
            .products
            .get(&product.id)
            .ok_or(StoreError::ProductNotFound(product.id))?
            .clone();

        if !expected.matches(current.version) {
            return Err(StoreError::Conflict(format!(
                "expected {expected:?}, found {}",
                current.version
            )));
        }
        if state
            .products
            .values()
            .any(|s| s.product.id != product.id && s.product.sku == product.sku)
        {
            return Err(StoreError::DuplicateSku(product.sku));
        }

        // Catalog update only: stock moves exclusively through commit().
        let mut product = product;
        product.quantity = current.product.quantity;

        let stored = StoredProduct {
            product,
            version: current.version + 1,
        };
        state.products.insert(stored.product.id, stored.clone());
        Ok(stored)
    }

    fn remove_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.ledgers.remove(&id);
        Ok(state.products.remove(&id).is_some())
    }

    fn commit(
        &self,
        commit: StockCommit,
        expected: Vec<(ProductId, ExpectedVersion)>,
    ) -> Result<CommitReceipt, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        // 1) Optimistic concurrency checks, before anything is staged.
        for (product_id, expected_version) in &expected {
            let current = state
                .products
                .get(product_id)
                .ok_or(StoreError::ProductNotFound(*product_id))?;
            if !expected_version.matches(current.version) {
                return Err(StoreError::Conflict(format!(
                    "product {product_id}: expected {expected_version:?}, found {}",
                    current.version
                )));
            }
        }

        // 2) Stage quantity updates; reject the whole batch if any movement
        //    would drive a cached quantity negative.
        let mut staged: HashMap<ProductId, i64> = HashMap::new();
        for pending in &commit.movements {
            let current = state
                .products
                .get(&pending.product_id)
                .ok_or(StoreError::ProductNotFound(pending.product_id))?;
            let quantity = staged
                .entry(pending.product_id)
                .or_insert(current.product.quantity);
            let next = *quantity + pending.request.kind.signed_delta(pending.request.quantity);
            if next < 0 {
                return Err(StoreError::InvalidCommit(format!(
                    "movement would drive product {} quantity to {next}",
                    pending.product_id
                )));
            }
            *quantity = next;
        }

        // 3) Apply: append movements, update cached quantities, bump versions.
        let now = Utc::now();
        let mut movements = Vec::with_capacity(commit.movements.len());
        for pending in commit.movements {
            let sequence = state.next_sequence(pending.product_id);
            let movement = StockMovement {
                id: MovementId::new(),
                product_id: pending.product_id,
                user_id: pending.request.actor,
                kind: pending.request.kind,
                quantity: pending.request.quantity,
                reason: pending.request.reason,
                reference: pending.request.reference,
                recorded_at: pending.request.occurred_at.unwrap_or(now),
                sequence,
            };
            state
                .ledgers
                .entry(pending.product_id)
                .or_default()
                .push(movement.clone());
            movements.push(movement);
        }

        for (product_id, quantity) in &staged {
            if let Some(stored) = state.products.get_mut(product_id) {
                stored.product.quantity = *quantity;
                stored.version += 1;
            }
        }

        if let Some(sale) = &commit.sale {
            state.sales.push(sale.clone());
        }

        Ok(CommitReceipt {
            movements,
            quantities: staged,
            sale: commit.sale,
        })
    }

    fn movements_by_product(
        &self,
        id: ProductId,
        order: SortOrder,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut movements = state.ledgers.get(&id).cloned().unwrap_or_default();
        movements.sort_by_key(|m| (m.recorded_at, m.sequence));
        if order == SortOrder::Descending {
            movements.reverse();
        }
        Ok(movements)
    }

    fn movements_in_period(
        &self,
        id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let mut movements = self.movements_by_product(id, SortOrder::Ascending)?;
        movements.retain(|m| {
            m.recorded_at.year() == year && month.is_none_or(|mo| m.recorded_at.month() == mo)
        });
        Ok(movements)
    }

    fn reserve_sale_number(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.sale_counter += 1;
        Ok(state.sale_counter)
    }

    fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.sales.clone())
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.sales.iter().find(|s| s.id == id).cloned())
    }

    fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.categories.insert(category.id, category);
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    fn remove_category(&self, id: CategoryId) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        Ok(state.categories.remove(&id).is_some())
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.suppliers.insert(supplier.id, supplier);
        Ok(())
    }

    fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut suppliers: Vec<Supplier> = state.suppliers.values().cloned().collect();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(suppliers)
    }

    fn remove_supplier(&self, id: SupplierId) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        Ok(state.suppliers.remove(&id).is_some())
    }

    fn reset_stock_data(&self) -> Result<ResetReport, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        let movements_deleted: usize = state.ledgers.values().map(Vec::len).sum();
        let sales_deleted = state.sales.len();
        let products_zeroed = state
            .products
            .values()
            .filter(|s| s.product.quantity != 0)
            .count();

        state.ledgers.clear();
        state.sales.clear();
        state.sale_counter = 0;
        for stored in state.products.values_mut() {
            if stored.product.quantity != 0 {
                stored.product.quantity = 0;
                stored.version += 1;
            }
        }

        Ok(ResetReport {
            movements_deleted,
            sales_deleted,
            products_zeroed,
        })
    }
}
