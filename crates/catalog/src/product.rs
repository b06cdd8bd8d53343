use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merchkit_core::{Decimal, ProductId};

/// Read-only product snapshot supplied by the catalog store.
///
/// Attributes are heterogeneous (string, exact decimal, integer,
/// set-of-string); the predicate evaluator coerces per column. Optional
/// attributes (`compare_at_price`, `weight`, `variant_title`) model columns
/// that are legitimately absent on some products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub product_type: String,
    pub vendor: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub inventory: i64,
    pub variant_title: Option<String>,
    pub tags: BTreeSet<String>,
    /// URL slug, unique within the catalog.
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Minimal snapshot with required attributes only.
    pub fn new(
        id: ProductId,
        title: impl Into<String>,
        vendor: impl Into<String>,
        price: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let handle = handle_from_title(&title);
        Self {
            id,
            title,
            product_type: String::new(),
            vendor: vendor.into(),
            price,
            compare_at_price: None,
            weight: None,
            inventory: 0,
            variant_title: None,
            tags: BTreeSet::new(),
            handle,
            created_at,
        }
    }

    pub fn with_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    pub fn with_inventory(mut self, inventory: i64) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_compare_at_price(mut self, price: Decimal) -> Self {
        self.compare_at_price = Some(price);
        self
    }

    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_variant_title(mut self, variant_title: impl Into<String>) -> Self {
        self.variant_title = Some(variant_title.into());
        self
    }
}

/// Derive a URL slug from a display title.
///
/// Lowercases, keeps alphanumerics, collapses everything else to single
/// hyphens.
pub fn handle_from_title(title: &str) -> String {
    let mut handle = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !handle.is_empty() {
                handle.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                handle.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    handle
}
