//! Product catalog for finished-goods inventory.
//!
//! This crate provides the catalog collaborator used by the stock
//! reconciliation core:
//! - Product and bundle-edge entities
//! - The async [`CatalogStore`] trait (single-record writes, batch reads)
//! - An in-memory store with fault injection and a PostgreSQL store

pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod product;
pub mod store;

pub use common::{ComponentId, ProductId};
pub use error::{CatalogError, Result};
pub use filter::ProductFilter;
pub use memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;
pub use product::{NewComponent, NewProduct, Product, ProductComponent, ProductKind, ProductPatch};
pub use store::CatalogStore;
