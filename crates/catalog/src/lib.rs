//! `merchkit-catalog` — declarative catalog model.
//!
//! Read-only product snapshots plus collection/rule definitions. The
//! membership engine consumes these through the reader traits in [`store`];
//! it never writes back to the catalog.

pub mod collection;
pub mod product;
pub mod rule;
pub mod store;

pub use collection::{Collection, SortOrder};
pub use product::Product;
pub use rule::{Rule, RuleColumn, RuleRelation};
pub use store::{CatalogReader, CollectionReader, InMemoryCatalog, InMemoryCollections};
