use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stocktill_core::{ProductId, SaleId, UserId};

/// Sale validation failure (deterministic, user-facing).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    #[error("sale must contain at least one line item")]
    EmptySale,

    #[error("line {line}: quantity must be a positive integer (got {quantity})")]
    InvalidLineQuantity { line: usize, quantity: i64 },
}

/// One line of a sale: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price_cents: u64,
}

impl SaleLine {
    pub fn line_total_cents(&self) -> u64 {
        // quantity is validated positive before totals are taken.
        self.unit_price_cents * self.quantity.max(0) as u64
    }
}

/// A sale as submitted by the till, before stock validation and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDraft {
    pub lines: Vec<SaleLine>,
    #[serde(default)]
    pub cashier: Option<UserId>,
}

impl SaleDraft {
    /// Structural validation; stock availability is checked per line by the
    /// balance engine at commit time.
    pub fn validate(&self) -> Result<(), SaleError> {
        if self.lines.is_empty() {
            return Err(SaleError::EmptySale);
        }
        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(SaleError::InvalidLineQuantity {
                    line: idx + 1,
                    quantity: line.quantity,
                });
            }
        }
        Ok(())
    }

    pub fn total_cents(&self) -> u64 {
        self.lines.iter().map(SaleLine::line_total_cents).sum()
    }
}

/// A completed, persisted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    /// Human-facing sequential number, also used as the movement reference.
    pub number: String,
    pub lines: Vec<SaleLine>,
    pub total_cents: u64,
    pub cashier: Option<UserId>,
    pub recorded_at: DateTime<Utc>,
}

/// Format a store-assigned sequential counter as a sale number.
pub fn format_sale_number(counter: u64) -> String {
    format!("POS-{counter:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, unit_price_cents: u64) -> SaleLine {
        SaleLine {
            product_id: ProductId::new(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn empty_draft_is_rejected() {
        let draft = SaleDraft {
            lines: vec![],
            cashier: None,
        };
        assert_eq!(draft.validate().unwrap_err(), SaleError::EmptySale);
    }

    #[test]
    fn non_positive_line_quantity_is_rejected_with_its_position() {
        let draft = SaleDraft {
            lines: vec![line(2, 100), line(0, 50)],
            cashier: None,
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            SaleError::InvalidLineQuantity {
                line: 2,
                quantity: 0
            }
        );
    }

    #[test]
    fn totals_sum_over_lines() {
        let draft = SaleDraft {
            lines: vec![line(2, 100), line(3, 50)],
            cashier: None,
        };
        assert!(draft.validate().is_ok());
        assert_eq!(draft.total_cents(), 350);
    }

    #[test]
    fn sale_numbers_are_zero_padded() {
        assert_eq!(format_sale_number(1), "POS-000001");
        assert_eq!(format_sale_number(123_456), "POS-123456");
        assert_eq!(format_sale_number(1_234_567), "POS-1234567");
    }
}
