//! `merchkit-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod decimal;
pub mod error;
pub mod id;

pub use decimal::Decimal;
pub use error::{DomainError, DomainResult};
pub use id::{CollectionId, ProductId};
