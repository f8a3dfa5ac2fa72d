//! Postgres-backed stock store.
//!
//! Persistence for products, the movement ledger, sales, and catalog records
//! using PostgreSQL. The commit path runs inside a transaction that takes
//! `FOR UPDATE` row locks on every touched product, so the version check,
//! the ledger append, and the cached-quantity update land as one atomic
//! unit — exactly the critical section the balance engine's retry loop
//! expects.
//!
//! ## Error mapping
//!
//! | PostgreSQL error code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `23505` (unique)      | `Conflict` / `DuplicateSku` | concurrent append or duplicate sku |
//! | `23514` (check)       | `InvalidCommit` | quantity would go negative |
//! | other database errors | `Backend` | connectivity, pool, corruption |
//!
//! ## Sync bridge
//!
//! The `StockStore` trait is synchronous; Postgres operations are async. The
//! trait impl bridges via `tokio::runtime::Handle`, which works when called
//! from within a tokio runtime (e.g. from axum handlers).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stocktill_core::{CategoryId, ExpectedVersion, MovementId, ProductId, SaleId, SupplierId, UserId};
use stocktill_inventory::{MovementKind, SortOrder, StockMovement};
use stocktill_products::{Category, Product, Supplier};
use stocktill_sales::{Sale, SaleLine};

use super::r#trait::{
    CommitReceipt, ResetReport, StockCommit, StockStore, StoreError, StoredProduct,
};

/// Postgres-backed stock store.
///
/// Thread-safe via the SQLx connection pool; all multi-statement operations
/// run inside transactions.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and prepare the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect: {e}")))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for ddl in [
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id            UUID PRIMARY KEY,
                name          TEXT NOT NULL,
                sku           TEXT NOT NULL UNIQUE,
                price_cents   BIGINT NOT NULL,
                category_id   UUID NULL,
                supplier_id   UUID NULL,
                quantity      BIGINT NOT NULL CHECK (quantity >= 0),
                reorder_level BIGINT NOT NULL CHECK (reorder_level >= 0),
                version       BIGINT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS stock_movements (
                id          UUID PRIMARY KEY,
                product_id  UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                user_id     UUID NULL,
                kind        TEXT NOT NULL,
                quantity    BIGINT NOT NULL CHECK (quantity > 0),
                reason      TEXT NOT NULL,
                reference   TEXT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                sequence    BIGINT NOT NULL CHECK (sequence > 0),
                UNIQUE (product_id, sequence)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sales (
                id          UUID PRIMARY KEY,
                number      TEXT NOT NULL UNIQUE,
                total_cents BIGINT NOT NULL,
                cashier     UUID NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sale_lines (
                sale_id          UUID NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
                line_no          INT NOT NULL,
                product_id       UUID NOT NULL,
                quantity         BIGINT NOT NULL,
                unit_price_cents BIGINT NOT NULL,
                PRIMARY KEY (sale_id, line_no)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id         UUID PRIMARY KEY,
                name       TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS suppliers (
                id         UUID PRIMARY KEY,
                name       TEXT NOT NULL,
                contact    TEXT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS counters (
                name  TEXT PRIMARY KEY,
                value BIGINT NOT NULL
            )
            "#,
        ] {
            sqlx::query(ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn insert_product_inner(&self, product: Product) -> Result<StoredProduct, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, price_cents, category_id, supplier_id,
                quantity, reorder_level, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents as i64)
        .bind(product.category_id.map(uuid::Uuid::from))
        .bind(product.supplier_id.map(uuid::Uuid::from))
        .bind(product.quantity)
        .bind(product.reorder_level)
        .bind(1i64)
        .bind(product.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_write_error("insert_product", &product.sku, e))?;

        Ok(StoredProduct {
            product,
            version: 1,
        })
    }

    async fn product_inner(&self, id: ProductId) -> Result<Option<StoredProduct>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, sku, price_cents, category_id, supplier_id,
                   quantity, reorder_level, version, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.map(|r| ProductRow::from_row(&r).map(StoredProduct::from))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("failed to decode product row: {e}")))
    }

    async fn list_products_inner(&self) -> Result<Vec<StoredProduct>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, sku, price_cents, category_id, supplier_id,
                   quantity, reorder_level, version, created_at
            FROM products
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter()
            .map(|r| ProductRow::from_row(r).map(StoredProduct::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(format!("failed to decode product row: {e}")))
    }

    async fn update_product_inner(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<StoredProduct, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (version, quantity) = lock_product(&mut tx, product.id).await?;
        if !expected.matches(version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!(
                "product {}: expected {expected:?}, found {version}",
                product.id
            )));
        }

        // Catalog update only: stock moves exclusively through commit().
        let mut product = product;
        product.quantity = quantity;

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, sku = $3, price_cents = $4, category_id = $5,
                supplier_id = $6, reorder_level = $7, version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents as i64)
        .bind(product.category_id.map(uuid::Uuid::from))
        .bind(product.supplier_id.map(uuid::Uuid::from))
        .bind(product.reorder_level)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error("update_product", &product.sku, e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(StoredProduct {
            product,
            version: version + 1,
        })
    }

    async fn remove_product_inner(&self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, commit), fields(movements = commit.movements.len()), err)]
    async fn commit_inner(
        &self,
        commit: StockCommit,
        expected: Vec<(ProductId, ExpectedVersion)>,
    ) -> Result<CommitReceipt, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // 1) Lock every involved product row and check expectations.
        let mut quantities: HashMap<ProductId, i64> = HashMap::new();

        for (product_id, expected_version) in &expected {
            let (version, quantity) = lock_product(&mut tx, *product_id).await?;
            if !expected_version.matches(version) {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!(
                    "product {product_id}: expected {expected_version:?}, found {version}"
                )));
            }
            quantities.insert(*product_id, quantity);
        }

        // 2) Stage quantity updates; reject the batch if any would go negative.
        for pending in &commit.movements {
            if !quantities.contains_key(&pending.product_id) {
                let (_, quantity) = lock_product(&mut tx, pending.product_id).await?;
                quantities.insert(pending.product_id, quantity);
            }
            let quantity = quantities
                .entry(pending.product_id)
                .or_default();
            let next = *quantity + pending.request.kind.signed_delta(pending.request.quantity);
            if next < 0 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::InvalidCommit(format!(
                    "movement would drive product {} quantity to {next}",
                    pending.product_id
                )));
            }
            *quantity = next;
        }

        // 3) Append movements with per-product sequence numbers.
        let now = Utc::now();
        let mut sequences: HashMap<ProductId, u64> = HashMap::new();
        let mut movements = Vec::with_capacity(commit.movements.len());

        for pending in commit.movements {
            let next_sequence = match sequences.get(&pending.product_id) {
                Some(s) => s + 1,
                None => current_sequence(&mut tx, pending.product_id).await? + 1,
            };
            sequences.insert(pending.product_id, next_sequence);

            let movement = StockMovement {
                id: MovementId::new(),
                product_id: pending.product_id,
                user_id: pending.request.actor,
                kind: pending.request.kind,
                quantity: pending.request.quantity,
                reason: pending.request.reason,
                reference: pending.request.reference,
                recorded_at: pending.request.occurred_at.unwrap_or(now),
                sequence: next_sequence,
            };

            sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id, product_id, user_id, kind, quantity,
                    reason, reference, recorded_at, sequence
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(movement.id.as_uuid())
            .bind(movement.product_id.as_uuid())
            .bind(movement.user_id.map(uuid::Uuid::from))
            .bind(movement.kind.as_str())
            .bind(movement.quantity)
            .bind(&movement.reason)
            .bind(&movement.reference)
            .bind(movement.recorded_at)
            .bind(movement.sequence as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    // Another transaction slipped in a movement despite the
                    // row lock; surface as a retryable conflict.
                    StoreError::Conflict(format!(
                        "concurrent append detected for product {}",
                        movement.product_id
                    ))
                } else {
                    map_sqlx_error("insert_movement", e)
                }
            })?;

            movements.push(movement);
        }

        // 4) Apply cached quantities and bump versions.
        for (product_id, quantity) in &quantities {
            sqlx::query(
                "UPDATE products SET quantity = $2, version = version + 1 WHERE id = $1",
            )
            .bind(product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_quantity", e))?;
        }

        // 5) Persist the sale record, if any.
        if let Some(sale) = &commit.sale {
            sqlx::query(
                r#"
                INSERT INTO sales (id, number, total_cents, cashier, recorded_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(sale.id.as_uuid())
            .bind(&sale.number)
            .bind(sale.total_cents as i64)
            .bind(sale.cashier.map(uuid::Uuid::from))
            .bind(sale.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_sale", e))?;

            for (idx, line) in sale.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO sale_lines (sale_id, line_no, product_id, quantity, unit_price_cents)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(sale.id.as_uuid())
                .bind((idx + 1) as i32)
                .bind(line.product_id.as_uuid())
                .bind(line.quantity)
                .bind(line.unit_price_cents as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_sale_line", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(CommitReceipt {
            movements,
            quantities,
            sale: commit.sale,
        })
    }

    async fn movements_by_product_inner(
        &self,
        id: ProductId,
        order: SortOrder,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let sql = match order {
            SortOrder::Ascending => {
                r#"
                SELECT id, product_id, user_id, kind, quantity,
                       reason, reference, recorded_at, sequence
                FROM stock_movements
                WHERE product_id = $1
                ORDER BY recorded_at ASC, sequence ASC
                "#
            }
            SortOrder::Descending => {
                r#"
                SELECT id, product_id, user_id, kind, quantity,
                       reason, reference, recorded_at, sequence
                FROM stock_movements
                WHERE product_id = $1
                ORDER BY recorded_at DESC, sequence DESC
                "#
            }
        };

        let rows = sqlx::query(sql)
            .bind(id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("movements_by_product", e))?;

        decode_movements(&rows)
    }

    async fn movements_in_period_inner(
        &self,
        id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, user_id, kind, quantity,
                   reason, reference, recorded_at, sequence
            FROM stock_movements
            WHERE product_id = $1
              AND EXTRACT(YEAR FROM recorded_at)::int = $2
              AND ($3::int IS NULL OR EXTRACT(MONTH FROM recorded_at)::int = $3)
            ORDER BY recorded_at ASC, sequence ASC
            "#,
        )
        .bind(id.as_uuid())
        .bind(year)
        .bind(month.map(|m| m as i32))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_in_period", e))?;

        decode_movements(&rows)
    }

    async fn reserve_sale_number_inner(&self) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO counters (name, value)
            VALUES ('sale_number', 1)
            ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserve_sale_number", e))?;

        let value: i64 = row
            .try_get("value")
            .map_err(|e| StoreError::Backend(format!("failed to read counter: {e}")))?;
        Ok(value as u64)
    }

    async fn sales_inner(&self) -> Result<Vec<Sale>, StoreError> {
        let sale_rows = sqlx::query(
            "SELECT id, number, total_cents, cashier, recorded_at FROM sales ORDER BY recorded_at ASC, id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sales", e))?;

        let line_rows = sqlx::query(
            r#"
            SELECT sale_id, line_no, product_id, quantity, unit_price_cents
            FROM sale_lines
            ORDER BY sale_id ASC, line_no ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sale_lines", e))?;

        let mut lines_by_sale: HashMap<uuid::Uuid, Vec<SaleLine>> = HashMap::new();
        for row in &line_rows {
            let line = SaleLineRow::from_row(row)
                .map_err(|e| StoreError::Backend(format!("failed to decode sale line: {e}")))?;
            lines_by_sale
                .entry(line.sale_id)
                .or_default()
                .push(line.into());
        }

        sale_rows
            .iter()
            .map(|row| {
                let sale = SaleRow::from_row(row)
                    .map_err(|e| StoreError::Backend(format!("failed to decode sale: {e}")))?;
                let lines = lines_by_sale.remove(&sale.id).unwrap_or_default();
                Ok(sale.into_sale(lines))
            })
            .collect()
    }

    async fn sale_inner(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query(
            "SELECT id, number, total_cents, cashier, recorded_at FROM sales WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sale", e))?;

        let Some(row) = row else { return Ok(None) };
        let sale = SaleRow::from_row(&row)
            .map_err(|e| StoreError::Backend(format!("failed to decode sale: {e}")))?;

        let line_rows = sqlx::query(
            r#"
            SELECT sale_id, line_no, product_id, quantity, unit_price_cents
            FROM sale_lines
            WHERE sale_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("sale_lines", e))?;

        let lines = line_rows
            .iter()
            .map(|row| SaleLineRow::from_row(row).map(SaleLine::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(format!("failed to decode sale line: {e}")))?;

        Ok(Some(sale.into_sale(lines)))
    }

    async fn insert_category_inner(&self, category: Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn list_categories_inner(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM categories ORDER BY name ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;

        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: CategoryId::from_uuid(get(row, "id")?),
                    name: get(row, "name")?,
                    created_at: get(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn remove_category_inner(&self, id: CategoryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_category", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_supplier_inner(&self, supplier: Supplier) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO suppliers (id, name, contact, created_at) VALUES ($1, $2, $3, $4)")
            .bind(supplier.id.as_uuid())
            .bind(&supplier.name)
            .bind(&supplier.contact)
            .bind(supplier.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    async fn list_suppliers_inner(&self) -> Result<Vec<Supplier>, StoreError> {
        let rows =
            sqlx::query("SELECT id, name, contact, created_at FROM suppliers ORDER BY name ASC")
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_suppliers", e))?;

        rows.iter()
            .map(|row| {
                Ok(Supplier {
                    id: SupplierId::from_uuid(get(row, "id")?),
                    name: get(row, "name")?,
                    contact: get(row, "contact")?,
                    created_at: get(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn remove_supplier_inner(&self, id: SupplierId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_supplier", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn reset_stock_data_inner(&self) -> Result<ResetReport, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let movements_deleted = count(&mut tx, "SELECT COUNT(*) AS n FROM stock_movements").await?;
        let sales_deleted = count(&mut tx, "SELECT COUNT(*) AS n FROM sales").await?;
        let products_zeroed =
            count(&mut tx, "SELECT COUNT(*) AS n FROM products WHERE quantity <> 0").await?;

        for sql in [
            "DELETE FROM stock_movements",
            "DELETE FROM sale_lines",
            "DELETE FROM sales",
            "UPDATE products SET quantity = 0, version = version + 1 WHERE quantity <> 0",
            "UPDATE counters SET value = 0 WHERE name = 'sale_number'",
        ] {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("reset_stock_data", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(ResetReport {
            movements_deleted,
            sales_deleted,
            products_zeroed,
        })
    }
}

impl StockStore for PostgresStockStore {
    fn insert_product(&self, product: Product) -> Result<StoredProduct, StoreError> {
        block_on(self.insert_product_inner(product))
    }

    fn product(&self, id: ProductId) -> Result<Option<StoredProduct>, StoreError> {
        block_on(self.product_inner(id))
    }

    fn list_products(&self) -> Result<Vec<StoredProduct>, StoreError> {
        block_on(self.list_products_inner())
    }

    fn update_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<StoredProduct, StoreError> {
        block_on(self.update_product_inner(product, expected))
    }

    fn remove_product(&self, id: ProductId) -> Result<bool, StoreError> {
        block_on(self.remove_product_inner(id))
    }

    fn commit(
        &self,
        commit: StockCommit,
        expected: Vec<(ProductId, ExpectedVersion)>,
    ) -> Result<CommitReceipt, StoreError> {
        block_on(self.commit_inner(commit, expected))
    }

    fn movements_by_product(
        &self,
        id: ProductId,
        order: SortOrder,
    ) -> Result<Vec<StockMovement>, StoreError> {
        block_on(self.movements_by_product_inner(id, order))
    }

    fn movements_in_period(
        &self,
        id: ProductId,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        block_on(self.movements_in_period_inner(id, year, month))
    }

    fn reserve_sale_number(&self) -> Result<u64, StoreError> {
        block_on(self.reserve_sale_number_inner())
    }

    fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        block_on(self.sales_inner())
    }

    fn sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        block_on(self.sale_inner(id))
    }

    fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        block_on(self.insert_category_inner(category))
    }

    fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        block_on(self.list_categories_inner())
    }

    fn remove_category(&self, id: CategoryId) -> Result<bool, StoreError> {
        block_on(self.remove_category_inner(id))
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), StoreError> {
        block_on(self.insert_supplier_inner(supplier))
    }

    fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        block_on(self.list_suppliers_inner())
    }

    fn remove_supplier(&self, id: SupplierId) -> Result<bool, StoreError> {
        block_on(self.remove_supplier_inner(id))
    }

    fn reset_stock_data(&self) -> Result<ResetReport, StoreError> {
        block_on(self.reset_stock_data_inner())
    }
}

/// Run an async store operation from the synchronous trait.
///
/// Works when called from within a tokio runtime (e.g. from axum handlers);
/// outside one, the caller gets a descriptive backend error instead of a
/// panic.
fn block_on<F, T>(future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresStockStore requires an async runtime (tokio); ensure calls happen within a tokio runtime context".to_string(),
        )
    })?;
    handle.block_on(future)
}

/// Lock a product row and return `(version, quantity)`.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<(u64, i64), StoreError> {
    let row = sqlx::query("SELECT version, quantity FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .ok_or(StoreError::ProductNotFound(product_id))?;

    let version: i64 = row
        .try_get("version")
        .map_err(|e| StoreError::Backend(format!("failed to read version: {e}")))?;
    let quantity: i64 = row
        .try_get("quantity")
        .map_err(|e| StoreError::Backend(format!("failed to read quantity: {e}")))?;
    Ok((version as u64, quantity))
}

async fn current_sequence(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<u64, StoreError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(sequence), 0) AS current FROM stock_movements WHERE product_id = $1",
    )
    .bind(product_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("current_sequence", e))?;

    let current: i64 = row
        .try_get("current")
        .map_err(|e| StoreError::Backend(format!("failed to read sequence: {e}")))?;
    Ok(current as u64)
}

async fn count(tx: &mut Transaction<'_, Postgres>, sql: &str) -> Result<usize, StoreError> {
    let row = sqlx::query(sql)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("count", e))?;
    let n: i64 = row
        .try_get("n")
        .map_err(|e| StoreError::Backend(format!("failed to read count: {e}")))?;
    Ok(n as usize)
}

fn get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: concurrent append or duplicate key.
                Some("23505") => StoreError::Conflict(msg),
                // Check constraint violation (e.g. quantity >= 0).
                Some("23514") => StoreError::InvalidCommit(msg),
                _ => StoreError::Backend(msg),
            }
        }
        other => StoreError::Backend(format!("database error in {operation}: {other}")),
    }
}

/// Like `map_sqlx_error`, but recognizes the sku uniqueness constraint.
fn map_write_error(operation: &str, sku: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint().is_some_and(|c| c.contains("sku"))
        {
            return StoreError::DuplicateSku(sku.to_string());
        }
    }
    map_sqlx_error(operation, err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn decode_movements(rows: &[sqlx::postgres::PgRow]) -> Result<Vec<StockMovement>, StoreError> {
    rows.iter()
        .map(|row| {
            MovementRow::from_row(row)
                .map_err(|e| StoreError::Backend(format!("failed to decode movement row: {e}")))?
                .try_into()
        })
        .collect()
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    sku: String,
    price_cents: i64,
    category_id: Option<uuid::Uuid>,
    supplier_id: Option<uuid::Uuid>,
    quantity: i64,
    reorder_level: i64,
    version: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            price_cents: row.try_get("price_cents")?,
            category_id: row.try_get("category_id")?,
            supplier_id: row.try_get("supplier_id")?,
            quantity: row.try_get("quantity")?,
            reorder_level: row.try_get("reorder_level")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<ProductRow> for StoredProduct {
    fn from(row: ProductRow) -> Self {
        StoredProduct {
            product: Product {
                id: ProductId::from_uuid(row.id),
                name: row.name,
                sku: row.sku,
                price_cents: row.price_cents.max(0) as u64,
                category_id: row.category_id.map(CategoryId::from_uuid),
                supplier_id: row.supplier_id.map(SupplierId::from_uuid),
                quantity: row.quantity,
                reorder_level: row.reorder_level,
                created_at: row.created_at,
            },
            version: row.version as u64,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    user_id: Option<uuid::Uuid>,
    kind: String,
    quantity: i64,
    reason: String,
    reference: Option<String>,
    recorded_at: DateTime<Utc>,
    sequence: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            reason: row.try_get("reason")?,
            reference: row.try_get("reference")?,
            recorded_at: row.try_get("recorded_at")?,
            sequence: row.try_get("sequence")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind: MovementKind = row
            .kind
            .parse()
            .map_err(|_| StoreError::Backend(format!("corrupt movement kind '{}'", row.kind)))?;

        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            user_id: row.user_id.map(UserId::from_uuid),
            kind,
            quantity: row.quantity,
            reason: row.reason,
            reference: row.reference,
            recorded_at: row.recorded_at,
            sequence: row.sequence as u64,
        })
    }
}

#[derive(Debug)]
struct SaleRow {
    id: uuid::Uuid,
    number: String,
    total_cents: i64,
    cashier: Option<uuid::Uuid>,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for SaleRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleRow {
            id: row.try_get("id")?,
            number: row.try_get("number")?,
            total_cents: row.try_get("total_cents")?,
            cashier: row.try_get("cashier")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl SaleRow {
    fn into_sale(self, lines: Vec<SaleLine>) -> Sale {
        Sale {
            id: SaleId::from_uuid(self.id),
            number: self.number,
            lines,
            total_cents: self.total_cents.max(0) as u64,
            cashier: self.cashier.map(UserId::from_uuid),
            recorded_at: self.recorded_at,
        }
    }
}

#[derive(Debug)]
struct SaleLineRow {
    sale_id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i64,
    unit_price_cents: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for SaleLineRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleLineRow {
            sale_id: row.try_get("sale_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price_cents: row.try_get("unit_price_cents")?,
        })
    }
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        SaleLine {
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents.max(0) as u64,
        }
    }
}
