//! Ordering resolver: read-time presentation order.
//!
//! A pure projection over the membership index and the catalog snapshot; it
//! never writes. Non-manual modes tie-break by stored position ascending, so
//! the result is a total order and pagination is deterministic. Products
//! missing from the catalog snapshot sort after those with a key, still
//! position-tie-broken.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;

use merchkit_catalog::{CatalogReader, Collection, SortOrder};
use merchkit_core::ProductId;

use crate::index::{Collect, MembershipIndex};

/// Read-time ordering inputs owned by collaborators, passed explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderingOptions<'a> {
    /// Manual mode only: lift featured members to the front (featured-first
    /// display), keeping stored order within each group.
    pub featured_first: bool,
    /// Sales ranks for best-selling mode (lower rank sorts first). When
    /// absent, best-selling falls back to stored manual order.
    pub sales_rank: Option<&'a HashMap<ProductId, u64>>,
}

/// Presentation order for a collection's members under its sort mode.
pub fn order<C: CatalogReader>(
    collection: &Collection,
    index: &MembershipIndex,
    catalog: &C,
    options: &OrderingOptions<'_>,
) -> Vec<ProductId> {
    let members = index.members_of(collection.id);
    match collection.sort_order {
        SortOrder::Manual => manual(members, options.featured_first),
        SortOrder::AlphaAsc => by_key(members, catalog, false, |p| p.title.clone()),
        SortOrder::AlphaDesc => by_key(members, catalog, true, |p| p.title.clone()),
        SortOrder::PriceAsc => by_key(members, catalog, false, |p| p.price),
        SortOrder::PriceDesc => by_key(members, catalog, true, |p| p.price),
        SortOrder::Created => by_key(members, catalog, false, |p| p.created_at),
        SortOrder::CreatedDesc => by_key(members, catalog, true, |p| p.created_at),
        SortOrder::BestSelling => match options.sales_rank {
            Some(ranks) => best_selling(members, ranks),
            None => manual(members, false),
        },
    }
}

fn manual(members: Vec<Collect>, featured_first: bool) -> Vec<ProductId> {
    let mut members = members;
    if featured_first {
        // Stable: stored position remains the secondary key.
        members.sort_by_key(|m| !m.featured);
    }
    members.into_iter().map(|m| m.product_id).collect()
}

fn by_key<C, K>(
    members: Vec<Collect>,
    catalog: &C,
    descending: bool,
    key: impl Fn(&merchkit_catalog::Product) -> K,
) -> Vec<ProductId>
where
    C: CatalogReader,
    K: Ord,
{
    let mut keyed: Vec<(Option<K>, u32, ProductId)> = members
        .into_iter()
        .map(|m| {
            let k = catalog.product(m.product_id).map(|p| key(&p));
            (k, m.position, m.product_id)
        })
        .collect();

    keyed.sort_by(|a, b| {
        compare_keys(&a.0, &b.0, descending).then_with(|| a.1.cmp(&b.1))
    });
    keyed.into_iter().map(|(_, _, id)| id).collect()
}

/// Present keys order by direction; absent keys sort last either way.
fn compare_keys<K: Ord>(a: &Option<K>, b: &Option<K>, descending: bool) -> CmpOrdering {
    match (a, b) {
        (Some(a), Some(b)) => {
            if descending {
                b.cmp(a)
            } else {
                a.cmp(b)
            }
        }
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    }
}

fn best_selling(members: Vec<Collect>, ranks: &HashMap<ProductId, u64>) -> Vec<ProductId> {
    let mut keyed: Vec<(Option<u64>, u32, ProductId)> = members
        .into_iter()
        .map(|m| (ranks.get(&m.product_id).copied(), m.position, m.product_id))
        .collect();
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, false).then_with(|| a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use merchkit_catalog::{InMemoryCatalog, Product};
    use merchkit_core::CollectionId;

    struct Fixture {
        catalog: InMemoryCatalog,
        index: MembershipIndex,
        collection: Collection,
        products: Vec<Product>,
    }

    fn fixture(sort_order: SortOrder) -> Fixture {
        let catalog = InMemoryCatalog::new();
        let index = MembershipIndex::new();
        let collection = Collection::manual(CollectionId::new(), "Fixture").with_sort_order(sort_order);
        let base = Utc::now();

        let specs: [(&str, &str, i64); 3] = [
            ("Banana Stand", "12.00", 0),
            ("Apple Crate", "30.00", 2),
            ("Cherry Box", "12.00", 1),
        ];
        let mut products = Vec::new();
        for (title, price, day) in specs {
            let p = Product::new(
                merchkit_core::ProductId::new(),
                title,
                "Acme",
                price.parse().unwrap(),
                base + Duration::days(day),
            );
            catalog.upsert(p.clone());
            index.append(collection.id, p.id, 1, Utc::now()).unwrap();
            products.push(p);
        }

        Fixture { catalog, index, collection, products }
    }

    #[test]
    fn manual_returns_stored_order() {
        let f = fixture(SortOrder::Manual);
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(got, f.products.iter().map(|p| p.id).collect::<Vec<_>>());
    }

    #[test]
    fn featured_first_lifts_featured_members() {
        let f = fixture(SortOrder::Manual);
        f.index.set_featured(f.collection.id, f.products[2].id, true, Utc::now());
        let options = OrderingOptions { featured_first: true, sales_rank: None };
        let got = order(&f.collection, &f.index, &f.catalog, &options);
        assert_eq!(got, vec![f.products[2].id, f.products[0].id, f.products[1].id]);
    }

    #[test]
    fn alpha_sorts_by_title() {
        let f = fixture(SortOrder::AlphaAsc);
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(got, vec![f.products[1].id, f.products[0].id, f.products[2].id]);
    }

    #[test]
    fn price_ties_break_by_stored_position() {
        let f = fixture(SortOrder::PriceAsc);
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        // Banana (12.00, position 0) before Cherry (12.00, position 2).
        assert_eq!(got, vec![f.products[0].id, f.products[2].id, f.products[1].id]);

        let f = fixture(SortOrder::PriceDesc);
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(got, vec![f.products[1].id, f.products[0].id, f.products[2].id]);
    }

    #[test]
    fn created_desc_is_newest_first() {
        let f = fixture(SortOrder::CreatedDesc);
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(got, vec![f.products[1].id, f.products[2].id, f.products[0].id]);
    }

    #[test]
    fn best_selling_uses_ranks_and_falls_back_to_stored_order() {
        let f = fixture(SortOrder::BestSelling);

        let no_ranks = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(no_ranks, f.products.iter().map(|p| p.id).collect::<Vec<_>>());

        let mut ranks = HashMap::new();
        ranks.insert(f.products[1].id, 1u64);
        ranks.insert(f.products[2].id, 2u64);
        // products[0] unranked: sorts last.
        let options = OrderingOptions { featured_first: false, sales_rank: Some(&ranks) };
        let got = order(&f.collection, &f.index, &f.catalog, &options);
        assert_eq!(got, vec![f.products[1].id, f.products[2].id, f.products[0].id]);
    }

    #[test]
    fn missing_catalog_snapshot_sorts_last() {
        let f = fixture(SortOrder::AlphaAsc);
        f.catalog.remove(f.products[1].id); // "Apple Crate" would sort first
        let got = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
        assert_eq!(got, vec![f.products[0].id, f.products[2].id, f.products[1].id]);
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        for sort_order in [
            SortOrder::AlphaAsc,
            SortOrder::AlphaDesc,
            SortOrder::PriceAsc,
            SortOrder::PriceDesc,
            SortOrder::Created,
            SortOrder::CreatedDesc,
        ] {
            let f = fixture(sort_order);
            let a = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
            let b = order(&f.collection, &f.index, &f.catalog, &OrderingOptions::default());
            assert_eq!(a, b);
        }
    }
}
