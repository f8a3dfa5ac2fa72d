//! Sales domain module.
//!
//! Point-of-sale transactions: line items, draft validation, totals, and
//! sale-number formatting. Pure domain logic; stock effects are decided by
//! the balance engine, which turns each line into an outbound movement.

pub mod sale;

pub use sale::{Sale, SaleDraft, SaleError, SaleLine, format_sale_number};
