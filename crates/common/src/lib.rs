//! Shared identifier types for the stock reconciliation workspace.

pub mod types;

pub use types::{BatchId, ComponentId, ProductId, SessionId};
