//! Read-only reporting queries over the stock store.

use serde::Serialize;

use stocktill_inventory::SortOrder;

use crate::store::{StockStore, StoreError, StoredProduct};

/// Headline counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub products: usize,
    pub units_on_hand: i64,
    pub low_stock_products: usize,
    pub movements_recorded: usize,
    pub sales_recorded: usize,
}

/// Products at or below their own advisory `reorder_level`.
///
/// This is the per-product threshold, distinct from the fixed reorder buffer
/// the balance engine enforces on stock-outs.
pub fn low_stock<S>(store: &S) -> Result<Vec<StoredProduct>, StoreError>
where
    S: StockStore + ?Sized,
{
    let mut products = store.list_products()?;
    products.retain(|s| s.product.quantity <= s.product.reorder_level);
    Ok(products)
}

pub fn dashboard<S>(store: &S) -> Result<DashboardSummary, StoreError>
where
    S: StockStore + ?Sized,
{
    let products = store.list_products()?;

    let mut summary = DashboardSummary {
        products: products.len(),
        sales_recorded: store.sales()?.len(),
        ..DashboardSummary::default()
    };

    for stored in &products {
        summary.units_on_hand += stored.product.quantity;
        if stored.product.quantity <= stored.product.reorder_level {
            summary.low_stock_products += 1;
        }
        summary.movements_recorded += store
            .movements_by_product(stored.product.id, SortOrder::Ascending)?
            .len();
    }

    Ok(summary)
}
