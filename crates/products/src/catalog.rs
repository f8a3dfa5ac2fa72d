use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktill_core::{CategoryId, DomainError, DomainResult, SupplierId};

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
}

impl CategoryDraft {
    pub fn into_category(self, id: CategoryId, created_at: DateTime<Utc>) -> DomainResult<Category> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Category {
            id,
            name: self.name,
            created_at,
        })
    }
}

/// Supplier of catalog products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDraft {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

impl SupplierDraft {
    pub fn into_supplier(self, id: SupplierId, created_at: DateTime<Utc>) -> DomainResult<Supplier> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Supplier {
            id,
            name: self.name,
            contact: self.contact,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_draft_rejects_blank_name() {
        let err = CategoryDraft {
            name: "   ".to_string(),
        }
        .into_category(CategoryId::new(), Utc::now())
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn supplier_draft_keeps_contact() {
        let supplier = SupplierDraft {
            name: "Acme Wholesale".to_string(),
            contact: Some("orders@acme.test".to_string()),
        }
        .into_supplier(SupplierId::new(), Utc::now())
        .unwrap();
        assert_eq!(supplier.contact.as_deref(), Some("orders@acme.test"));
    }
}
