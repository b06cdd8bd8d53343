//! Presentation-layer queries over a collection's members.
//!
//! Pure reads over `members_of` intersected with an explicit filter
//! argument. Filtered views ("current tag/type/vendor on a collection
//! page") take the filter as a parameter; there is no ambient
//! request-scoped state here.

use std::collections::BTreeSet;

use merchkit_catalog::{CatalogReader, Product, SortOrder};
use merchkit_core::{CollectionId, ProductId};

use crate::index::MembershipIndex;

/// Cap on tag listings, matching the storefront contract.
pub const MAX_TAGS: usize = 1000;

/// Explicit view filter for a filtered collection page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub tag: Option<String>,
    pub product_type: Option<String>,
    pub vendor: Option<String>,
}

impl ViewFilter {
    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self { tag: Some(tag.into()), ..Self::default() }
    }

    pub fn by_type(product_type: impl Into<String>) -> Self {
        Self { product_type: Some(product_type.into()), ..Self::default() }
    }

    pub fn by_vendor(vendor: impl Into<String>) -> Self {
        Self { vendor: Some(vendor.into()), ..Self::default() }
    }

    fn matches(&self, product: &Product) -> bool {
        if let Some(tag) = &self.tag {
            if !product.tags.contains(tag) {
                return false;
            }
        }
        if let Some(product_type) = &self.product_type {
            if product.product_type != *product_type {
                return false;
            }
        }
        if let Some(vendor) = &self.vendor {
            if product.vendor != *vendor {
                return false;
            }
        }
        true
    }
}

/// Neighbouring members around a handle, for "next"/"previous" links on a
/// product page viewed within a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacent {
    pub previous: Option<ProductId>,
    pub next: Option<ProductId>,
}

fn member_products<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
) -> Vec<Product> {
    index
        .positions_for(collection_id)
        .into_iter()
        .filter_map(|id| catalog.product(id))
        .collect()
}

/// All tags across a collection's members, sorted, capped at [`MAX_TAGS`].
/// Unaffected by any page filter.
pub fn all_tags<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for product in member_products(collection_id, index, catalog) {
        tags.extend(product.tags);
    }
    tags.into_iter().take(MAX_TAGS).collect()
}

/// All distinct product types across a collection's members, sorted.
pub fn all_types<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
) -> Vec<String> {
    let types: BTreeSet<String> = member_products(collection_id, index, catalog)
        .into_iter()
        .map(|p| p.product_type)
        .filter(|t| !t.is_empty())
        .collect();
    types.into_iter().collect()
}

/// All distinct vendors across a collection's members, sorted.
pub fn all_vendors<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
) -> Vec<String> {
    let vendors: BTreeSet<String> = member_products(collection_id, index, catalog)
        .into_iter()
        .map(|p| p.vendor)
        .filter(|v| !v.is_empty())
        .collect();
    vendors.into_iter().collect()
}

/// Total member count, unaffected by any page filter.
pub fn all_products_count(collection_id: CollectionId, index: &MembershipIndex) -> usize {
    index.member_count(collection_id)
}

/// Members matching the current view's filter.
pub fn products_count<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
    filter: &ViewFilter,
) -> usize {
    member_products(collection_id, index, catalog)
        .iter()
        .filter(|p| filter.matches(p))
        .count()
}

/// Tags of members matching the current view's filter, sorted, capped.
pub fn tags<C: CatalogReader>(
    collection_id: CollectionId,
    index: &MembershipIndex,
    catalog: &C,
    filter: &ViewFilter,
) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for product in member_products(collection_id, index, catalog) {
        if filter.matches(&product) {
            tags.extend(product.tags);
        }
    }
    tags.into_iter().take(MAX_TAGS).collect()
}

/// Previous/next members around the product with the given handle, within
/// an already-resolved presentation order.
pub fn adjacent<C: CatalogReader>(ordered: &[ProductId], catalog: &C, handle: &str) -> Adjacent {
    let position = ordered.iter().position(|id| {
        catalog.product(*id).is_some_and(|p| p.handle == handle)
    });
    match position {
        Some(i) => Adjacent {
            previous: (i > 0).then(|| ordered[i - 1]),
            next: ordered.get(i + 1).copied(),
        },
        None => Adjacent::default(),
    }
}

/// Storefront sort key for a collection's configured sort order.
pub fn default_sort_by(sort_order: SortOrder) -> &'static str {
    match sort_order {
        SortOrder::Manual => "manual",
        SortOrder::BestSelling => "best-selling",
        SortOrder::AlphaAsc => "title-ascending",
        SortOrder::AlphaDesc => "title-descending",
        SortOrder::PriceAsc => "price-ascending",
        SortOrder::PriceDesc => "price-descending",
        SortOrder::Created => "created-ascending",
        SortOrder::CreatedDesc => "created-descending",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use merchkit_catalog::InMemoryCatalog;

    fn setup() -> (InMemoryCatalog, MembershipIndex, CollectionId, Vec<Product>) {
        let catalog = InMemoryCatalog::new();
        let index = MembershipIndex::new();
        let c = CollectionId::new();

        let specs: [(&str, &str, &str, &[&str]); 3] = [
            ("Auckland Print", "Print", "Acme", &["city", "sale"]),
            ("Berlin Print", "Print", "Studio B", &["city"]),
            ("Plain Mug", "Mug", "Acme", &[]),
        ];
        let mut products = Vec::new();
        for (title, product_type, vendor, tags) in specs {
            let p = Product::new(ProductId::new(), title, vendor, "10".parse().unwrap(), Utc::now())
                .with_type(product_type)
                .with_tags(tags.iter().copied());
            catalog.upsert(p.clone());
            index.append(c, p.id, 1, Utc::now()).unwrap();
            products.push(p);
        }
        (catalog, index, c, products)
    }

    #[test]
    fn all_views_are_unfiltered() {
        let (catalog, index, c, _) = setup();
        assert_eq!(all_tags(c, &index, &catalog), vec!["city", "sale"]);
        assert_eq!(all_types(c, &index, &catalog), vec!["Mug", "Print"]);
        assert_eq!(all_vendors(c, &index, &catalog), vec!["Acme", "Studio B"]);
        assert_eq!(all_products_count(c, &index), 3);
    }

    #[test]
    fn filtered_views_intersect_with_the_filter() {
        let (catalog, index, c, _) = setup();
        assert_eq!(products_count(c, &index, &catalog, &ViewFilter::by_tag("city")), 2);
        assert_eq!(products_count(c, &index, &catalog, &ViewFilter::by_type("Mug")), 1);
        assert_eq!(products_count(c, &index, &catalog, &ViewFilter::by_vendor("Acme")), 2);
        assert_eq!(products_count(c, &index, &catalog, &ViewFilter::default()), 3);

        assert_eq!(tags(c, &index, &catalog, &ViewFilter::by_vendor("Acme")), vec!["city", "sale"]);
        assert_eq!(tags(c, &index, &catalog, &ViewFilter::by_type("Mug")), Vec::<String>::new());
    }

    #[test]
    fn adjacent_walks_the_resolved_order() {
        let (catalog, index, c, products) = setup();
        let ordered = index.positions_for(c);

        let middle = adjacent(&ordered, &catalog, "berlin-print");
        assert_eq!(middle.previous, Some(products[0].id));
        assert_eq!(middle.next, Some(products[2].id));

        let first = adjacent(&ordered, &catalog, "auckland-print");
        assert_eq!(first.previous, None);
        assert_eq!(first.next, Some(products[1].id));

        let last = adjacent(&ordered, &catalog, "plain-mug");
        assert_eq!(last.next, None);

        let missing = adjacent(&ordered, &catalog, "nope");
        assert_eq!(missing, Adjacent::default());
    }

    #[test]
    fn default_sort_by_maps_to_storefront_keys() {
        assert_eq!(default_sort_by(SortOrder::AlphaAsc), "title-ascending");
        assert_eq!(default_sort_by(SortOrder::CreatedDesc), "created-descending");
        assert_eq!(default_sort_by(SortOrder::Manual), "manual");
    }
}
