//! Purchasing domain module (suppliers and product purchases).
//!
//! This crate contains business rules for suppliers and purchases, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod purchase;
pub mod supplier;

pub use purchase::{NewPurchase, Purchase, PurchaseId};
pub use supplier::{ContactInfo, NewSupplier, Supplier, SupplierId, SupplierPatch};
