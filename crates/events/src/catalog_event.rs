use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merchkit_core::{CollectionId, ProductId};

use crate::event::Event;

/// A product's rule-relevant attributes (or tags) changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanged {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// A product was deleted from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// A collection's rules changed: rule added/removed/edited or the
/// disjunctive flag toggled. Triggers a full recompute of that collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRulesChanged {
    pub collection_id: CollectionId,
    pub occurred_at: DateTime<Utc>,
}

/// Change notification consumed by the recomputation coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    ProductChanged(ProductChanged),
    ProductDeleted(ProductDeleted),
    CollectionRulesChanged(CollectionRulesChanged),
}

impl CatalogEvent {
    pub fn product_changed(product_id: ProductId, occurred_at: DateTime<Utc>) -> Self {
        Self::ProductChanged(ProductChanged { product_id, occurred_at })
    }

    pub fn product_deleted(product_id: ProductId, occurred_at: DateTime<Utc>) -> Self {
        Self::ProductDeleted(ProductDeleted { product_id, occurred_at })
    }

    pub fn rules_changed(collection_id: CollectionId, occurred_at: DateTime<Utc>) -> Self {
        Self::CollectionRulesChanged(CollectionRulesChanged { collection_id, occurred_at })
    }
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ProductChanged(_) => "catalog.product.changed",
            CatalogEvent::ProductDeleted(_) => "catalog.product.deleted",
            CatalogEvent::CollectionRulesChanged(_) => "catalog.collection.rules_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::ProductChanged(e) => e.occurred_at,
            CatalogEvent::ProductDeleted(e) => e.occurred_at,
            CatalogEvent::CollectionRulesChanged(e) => e.occurred_at,
        }
    }
}
