//! Product catalog domain module.
//!
//! This crate contains the catalog records (products, categories, suppliers)
//! and their validation, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod catalog;
pub mod product;

pub use catalog::{Category, CategoryDraft, Supplier, SupplierDraft};
pub use product::{DEFAULT_REORDER_LEVEL, Product, ProductDraft, ProductPatch};
