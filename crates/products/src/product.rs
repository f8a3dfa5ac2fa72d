use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktill_core::{CategoryId, DomainError, DomainResult, ProductId, SupplierId};

/// Default advisory low-stock threshold for new products.
///
/// Distinct from the hard stock-out floor enforced on outbound movements;
/// this one only drives low-stock reporting.
pub const DEFAULT_REORDER_LEVEL: i64 = 20;

/// Catalog product record.
///
/// `quantity` is the cached on-hand stock. It mirrors the sum of signed
/// movement deltas in the product's ledger and is mutated exclusively by the
/// stock store on behalf of the balance engine, never assigned directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    /// Unit price in smallest currency unit (e.g., cents).
    pub price_cents: u64,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    /// Cached on-hand stock; always >= 0.
    pub quantity: i64,
    /// Advisory low-stock threshold (reporting only).
    pub reorder_level: i64,
    pub created_at: DateTime<Utc>,
}

/// Input shape for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub sku: String,
    pub price_cents: u64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    /// Stock on hand before ledger tracking starts (opening-balance import
    /// turns this into a synthesized movement later).
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub reorder_level: Option<i64>,
}

impl ProductDraft {
    /// Validate the draft and build the catalog record.
    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> DomainResult<Product> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.initial_quantity < 0 {
            return Err(DomainError::validation("initial_quantity cannot be negative"));
        }
        let reorder_level = self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL);
        if reorder_level < 0 {
            return Err(DomainError::validation("reorder_level cannot be negative"));
        }

        Ok(Product {
            id,
            name: self.name,
            sku: self.sku,
            price_cents: self.price_cents,
            category_id: self.category_id,
            supplier_id: self.supplier_id,
            quantity: self.initial_quantity,
            reorder_level,
            created_at,
        })
    }
}

/// Partial update for a product's catalog fields.
///
/// `quantity` is deliberately absent: stock changes go through the balance
/// engine as movements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price_cents: Option<u64>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub reorder_level: Option<i64>,
}

impl ProductPatch {
    /// Apply the patch to an existing record, validating changed fields.
    pub fn apply(self, mut product: Product) -> DomainResult<Product> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            product.name = name;
        }
        if let Some(sku) = self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be empty"));
            }
            product.sku = sku;
        }
        if let Some(price) = self.price_cents {
            product.price_cents = price;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(supplier_id) = self.supplier_id {
            product.supplier_id = Some(supplier_id);
        }
        if let Some(level) = self.reorder_level {
            if level < 0 {
                return Err(DomainError::validation("reorder_level cannot be negative"));
            }
            product.reorder_level = level;
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, sku: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            sku: sku.to_string(),
            price_cents: 250,
            category_id: None,
            supplier_id: None,
            initial_quantity: 0,
            reorder_level: None,
        }
    }

    #[test]
    fn draft_builds_product_with_default_reorder_level() {
        let product = draft("Beans 1kg", "BEANS-1KG")
            .into_product(ProductId::new(), Utc::now())
            .unwrap();
        assert_eq!(product.reorder_level, DEFAULT_REORDER_LEVEL);
        assert_eq!(product.quantity, 0);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = draft("  ", "SKU-1")
            .into_product(ProductId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_initial_quantity_is_rejected() {
        let mut d = draft("Beans", "SKU-1");
        d.initial_quantity = -5;
        let err = d.into_product(ProductId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let product = draft("Beans", "SKU-1")
            .into_product(ProductId::new(), Utc::now())
            .unwrap();
        let patched = ProductPatch {
            price_cents: Some(300),
            ..ProductPatch::default()
        }
        .apply(product.clone())
        .unwrap();
        assert_eq!(patched.price_cents, 300);
        assert_eq!(patched.name, product.name);
        assert_eq!(patched.quantity, product.quantity);
    }

    #[test]
    fn patch_rejects_negative_reorder_level() {
        let product = draft("Beans", "SKU-1")
            .into_product(ProductId::new(), Utc::now())
            .unwrap();
        let err = ProductPatch {
            reorder_level: Some(-1),
            ..ProductPatch::default()
        }
        .apply(product)
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
