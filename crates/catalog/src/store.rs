//! Reader traits at the catalog boundary.
//!
//! The engine consumes product snapshots and collection definitions through
//! these traits and never writes back. In-memory implementations are provided
//! for tests/dev; production stores live outside this workspace.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::Arc;

use merchkit_core::{CollectionId, ProductId};

use crate::collection::Collection;
use crate::product::Product;

/// Read snapshot of product attributes keyed by product id.
pub trait CatalogReader: Send + Sync {
    fn product(&self, id: ProductId) -> Option<Product>;

    /// Full catalog scan (used by full-collection recomputation).
    fn products(&self) -> Vec<Product>;
}

/// Declarative collection/rule definitions.
pub trait CollectionReader: Send + Sync {
    fn collection(&self, id: CollectionId) -> Option<Collection>;

    fn collections(&self) -> Vec<Collection>;
}

impl<S> CatalogReader for Arc<S>
where
    S: CatalogReader + ?Sized,
{
    fn product(&self, id: ProductId) -> Option<Product> {
        (**self).product(id)
    }

    fn products(&self) -> Vec<Product> {
        (**self).products()
    }
}

impl<S> CollectionReader for Arc<S>
where
    S: CollectionReader + ?Sized,
{
    fn collection(&self, id: CollectionId) -> Option<Collection> {
        (**self).collection(id)
    }

    fn collections(&self) -> Vec<Collection> {
        (**self).collections()
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, product: Product) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(product.id, product);
        }
    }

    pub fn remove(&self, id: ProductId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&id);
        }
    }
}

impl CatalogReader for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Option<Product> {
        let map = self.inner.read().ok()?;
        map.get(&id).cloned()
    }

    fn products(&self) -> Vec<Product> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// In-memory collection store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCollections {
    inner: RwLock<HashMap<CollectionId, Collection>>,
}

impl InMemoryCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, collection: Collection) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(collection.id, collection);
        }
    }

    pub fn remove(&self, id: CollectionId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&id);
        }
    }
}

impl CollectionReader for InMemoryCollections {
    fn collection(&self, id: CollectionId) -> Option<Collection> {
        let map = self.inner.read().ok()?;
        map.get(&id).cloned()
    }

    fn collections(&self) -> Vec<Collection> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}
