//! Membership index: the system of record for Collect rows.
//!
//! Durable mapping keyed by (collection, product). The coordinator writes
//! membership deltas here; the presentation layer reads. Positions are dense
//! per collection (a permutation of `0..n`), renumbered on removal so no
//! holes remain; `sort_value` is the width-10 zero-padded rendering of the
//! position, so lexicographic order on `sort_value` equals numeric order on
//! `position`.
//!
//! Every write carries a monotonic per-pair epoch issued by the coordinator.
//! A writer whose epoch is below the pair's recorded epoch lost the race to
//! a newer evaluation and is rejected with [`EngineError::StaleWrite`]. The
//! epoch registry survives removals, so a stale insert cannot resurrect a
//! pair that a newer evaluation already removed.
//!
//! All mutations happen under one write lock; readers observe only
//! before/after-complete states for a collection, never an interleaving.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use merchkit_core::{CollectionId, ProductId};

use crate::error::EngineError;

/// Width of the `sort_value` rendering.
pub const SORT_VALUE_WIDTH: usize = 10;

/// Fixed-width decimal rendering of a position.
///
/// Lexicographic order on the result agrees with numeric order on the input
/// up to 10 digits.
pub fn sort_value(position: u32) -> String {
    format!("{position:0width$}", width = SORT_VALUE_WIDTH)
}

/// One membership record, materialized for readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collect {
    pub collection_id: CollectionId,
    pub product_id: ProductId,
    pub position: u32,
    pub sort_value: String,
    /// Manual sort override flag; only meaningful for manual collections.
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CollectRow {
    position: u32,
    featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CollectionMembers {
    /// Vec index == position; the density invariant holds by construction.
    ordered: Vec<ProductId>,
    rows: HashMap<ProductId, CollectRow>,
}

impl CollectionMembers {
    fn renumber_from(&mut self, from: usize) {
        for i in from..self.ordered.len() {
            if let Some(row) = self.rows.get_mut(&self.ordered[i]) {
                row.position = i as u32;
            }
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    collections: HashMap<CollectionId, CollectionMembers>,
    by_product: HashMap<ProductId, HashSet<CollectionId>>,
    /// Monotonic per-pair write versions; kept across removals.
    epochs: HashMap<(CollectionId, ProductId), u64>,
}

impl IndexState {
    /// Reject writers older than the pair's recorded epoch, then advance it.
    fn admit(
        &mut self,
        collection_id: CollectionId,
        product_id: ProductId,
        epoch: u64,
    ) -> Result<(), EngineError> {
        let slot = self.epochs.entry((collection_id, product_id)).or_insert(0);
        if epoch < *slot {
            return Err(EngineError::StaleWrite {
                collection_id,
                product_id,
                last: *slot,
                found: epoch,
            });
        }
        *slot = epoch;
        Ok(())
    }

    fn link(&mut self, collection_id: CollectionId, product_id: ProductId) {
        self.by_product.entry(product_id).or_default().insert(collection_id);
    }

    fn unlink(&mut self, collection_id: CollectionId, product_id: ProductId) {
        if let Some(set) = self.by_product.get_mut(&product_id) {
            set.remove(&collection_id);
            if set.is_empty() {
                self.by_product.remove(&product_id);
            }
        }
    }
}

/// In-process membership index.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    inner: RwLock<IndexState>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or reposition a membership record. Idempotent: an existing
    /// record at the requested position is a no-op (`Ok(false)`).
    ///
    /// `position` is clamped into the collection's current range.
    pub fn upsert(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        position: u32,
        epoch: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut state = self.write();
        state.admit(collection_id, product_id, epoch)?;

        let members = state.collections.entry(collection_id).or_default();
        match members.rows.get(&product_id) {
            Some(row) => {
                let target = (position as usize).min(members.ordered.len() - 1);
                let current = row.position as usize;
                if current == target {
                    return Ok(false);
                }
                members.ordered.remove(current);
                members.ordered.insert(target, product_id);
                members.renumber_from(current.min(target));
                if let Some(row) = members.rows.get_mut(&product_id) {
                    row.updated_at = at;
                }
                Ok(true)
            }
            None => {
                let target = (position as usize).min(members.ordered.len());
                members.ordered.insert(target, product_id);
                members.rows.insert(
                    product_id,
                    CollectRow {
                        position: target as u32,
                        featured: false,
                        created_at: at,
                        updated_at: at,
                    },
                );
                members.renumber_from(target);
                state.link(collection_id, product_id);
                Ok(true)
            }
        }
    }

    /// Curation insert for manual collections: place the product at an
    /// explicit position (clamped), shifting later members down.
    pub fn insert_manual(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        position: u32,
        epoch: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        self.upsert(collection_id, product_id, position, epoch, at)
    }

    /// Insert at the tail if absent; never repositions an existing member.
    ///
    /// This is the product-changed path: a member that still matches keeps
    /// its position.
    pub fn append(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        epoch: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut state = self.write();
        state.admit(collection_id, product_id, epoch)?;

        let members = state.collections.entry(collection_id).or_default();
        if members.rows.contains_key(&product_id) {
            return Ok(false);
        }
        let position = members.ordered.len() as u32;
        members.ordered.push(product_id);
        members.rows.insert(
            product_id,
            CollectRow {
                position,
                featured: false,
                created_at: at,
                updated_at: at,
            },
        );
        state.link(collection_id, product_id);
        Ok(true)
    }

    /// Remove a membership record, closing the position gap. Idempotent:
    /// removing an absent pair is a no-op (`Ok(false)`) that still advances
    /// the pair epoch, so a stale insert cannot slip in afterwards.
    pub fn remove(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        epoch: u64,
    ) -> Result<bool, EngineError> {
        let mut state = self.write();
        state.admit(collection_id, product_id, epoch)?;

        let Some(members) = state.collections.get_mut(&collection_id) else {
            return Ok(false);
        };
        let Some(row) = members.rows.remove(&product_id) else {
            return Ok(false);
        };
        let gap = row.position as usize;
        members.ordered.remove(gap);
        members.renumber_from(gap);
        if members.ordered.is_empty() {
            state.collections.remove(&collection_id);
        }
        state.unlink(collection_id, product_id);
        Ok(true)
    }

    /// Atomically replace a collection's entire member list (full
    /// recomputation). Retained members keep their `featured` flag and
    /// `created_at`; positions follow the supplied order.
    pub fn replace_members(
        &self,
        collection_id: CollectionId,
        products: Vec<ProductId>,
        epoch: u64,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut state = self.write();

        let old = state.collections.remove(&collection_id).unwrap_or_default();
        let touched: HashSet<ProductId> =
            old.ordered.iter().copied().chain(products.iter().copied()).collect();
        for product_id in &touched {
            if let Err(err) = state.admit(collection_id, *product_id, epoch) {
                // Roll the old members back; the swap is all-or-nothing.
                state.collections.insert(collection_id, old);
                return Err(err);
            }
        }

        for product_id in old.rows.keys() {
            state.unlink(collection_id, *product_id);
        }

        let mut members = CollectionMembers::default();
        for (i, product_id) in products.iter().enumerate() {
            let previous = old.rows.get(product_id);
            members.rows.insert(
                *product_id,
                CollectRow {
                    position: i as u32,
                    featured: previous.map(|r| r.featured).unwrap_or(false),
                    created_at: previous.map(|r| r.created_at).unwrap_or(at),
                    updated_at: at,
                },
            );
        }
        members.ordered = products;
        for product_id in members.rows.keys() {
            state.by_product.entry(*product_id).or_default().insert(collection_id);
        }
        if !members.ordered.is_empty() {
            state.collections.insert(collection_id, members);
        }
        Ok(())
    }

    /// Drop every Collect row for a product, across all collections
    /// (manual ones included). Deletion is terminal and always wins, so no
    /// stale-write check applies; the pair epochs still advance.
    pub fn remove_product(&self, product_id: ProductId, epoch: u64) -> usize {
        let mut state = self.write();
        let Some(collection_ids) = state.by_product.remove(&product_id) else {
            return 0;
        };
        let mut removed = 0;
        for collection_id in collection_ids {
            let slot = state.epochs.entry((collection_id, product_id)).or_insert(0);
            *slot = (*slot).max(epoch);
            if let Some(members) = state.collections.get_mut(&collection_id) {
                if let Some(row) = members.rows.remove(&product_id) {
                    let gap = row.position as usize;
                    members.ordered.remove(gap);
                    members.renumber_from(gap);
                    removed += 1;
                }
                if members.ordered.is_empty() {
                    state.collections.remove(&collection_id);
                }
            }
        }
        removed
    }

    /// Flip the manual-sort override flag. Returns false if the pair is
    /// absent.
    pub fn set_featured(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        featured: bool,
        at: DateTime<Utc>,
    ) -> bool {
        let mut state = self.write();
        let Some(members) = state.collections.get_mut(&collection_id) else {
            return false;
        };
        match members.rows.get_mut(&product_id) {
            Some(row) => {
                if row.featured != featured {
                    row.featured = featured;
                    row.updated_at = at;
                }
                true
            }
            None => false,
        }
    }

    /// Member product ids ordered by position ascending (equivalently,
    /// lexicographic on `sort_value`).
    pub fn positions_for(&self, collection_id: CollectionId) -> Vec<ProductId> {
        let state = self.read();
        state
            .collections
            .get(&collection_id)
            .map(|m| m.ordered.clone())
            .unwrap_or_default()
    }

    /// Full Collect rows in stored order.
    pub fn members_of(&self, collection_id: CollectionId) -> Vec<Collect> {
        let state = self.read();
        let Some(members) = state.collections.get(&collection_id) else {
            return Vec::new();
        };
        members
            .ordered
            .iter()
            .map(|product_id| {
                let row = &members.rows[product_id];
                Collect {
                    collection_id,
                    product_id: *product_id,
                    position: row.position,
                    sort_value: sort_value(row.position),
                    featured: row.featured,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }
            })
            .collect()
    }

    /// Collections a product currently belongs to (sorted for determinism).
    pub fn collections_of(&self, product_id: ProductId) -> Vec<CollectionId> {
        let state = self.read();
        let mut ids: Vec<CollectionId> = state
            .by_product
            .get(&product_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn contains(&self, collection_id: CollectionId, product_id: ProductId) -> bool {
        let state = self.read();
        state
            .collections
            .get(&collection_id)
            .is_some_and(|m| m.rows.contains_key(&product_id))
    }

    pub fn get(&self, collection_id: CollectionId, product_id: ProductId) -> Option<Collect> {
        let state = self.read();
        let row = state.collections.get(&collection_id)?.rows.get(&product_id)?;
        Some(Collect {
            collection_id,
            product_id,
            position: row.position,
            sort_value: sort_value(row.position),
            featured: row.featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn member_count(&self, collection_id: CollectionId) -> usize {
        let state = self.read();
        state
            .collections
            .get(&collection_id)
            .map(|m| m.ordered.len())
            .unwrap_or(0)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ProductId> {
        (0..n).map(|_| ProductId::new()).collect()
    }

    fn assert_dense(index: &MembershipIndex, collection_id: CollectionId) {
        let members = index.members_of(collection_id);
        for (i, m) in members.iter().enumerate() {
            assert_eq!(m.position as usize, i, "gap at {i}");
            assert_eq!(m.sort_value, sort_value(i as u32));
        }
    }

    #[test]
    fn sort_value_is_fixed_width_and_lexicographic() {
        assert_eq!(sort_value(0), "0000000000");
        assert_eq!(sort_value(42), "0000000042");
        assert!(sort_value(9) < sort_value(10));
        assert!(sort_value(99) < sort_value(100));
    }

    #[test]
    fn append_assigns_tail_positions() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let ps = ids(3);
        let now = Utc::now();
        for p in &ps {
            assert!(index.append(c, *p, 1, now).unwrap());
        }
        assert_eq!(index.positions_for(c), ps);
        assert_dense(&index, c);
    }

    #[test]
    fn append_is_idempotent_for_existing_members() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let p = ProductId::new();
        let now = Utc::now();
        assert!(index.append(c, p, 1, now).unwrap());
        assert!(!index.append(c, p, 2, now).unwrap());
        assert_eq!(index.member_count(c), 1);
        assert_eq!(index.get(c, p).unwrap().position, 0);
    }

    #[test]
    fn remove_closes_the_gap() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let ps = ids(4);
        let now = Utc::now();
        for p in &ps {
            index.append(c, *p, 1, now).unwrap();
        }

        assert!(index.remove(c, ps[1], 2).unwrap());
        assert_eq!(index.positions_for(c), vec![ps[0], ps[2], ps[3]]);
        assert_dense(&index, c);

        // Removing again is a no-op.
        assert!(!index.remove(c, ps[1], 3).unwrap());
    }

    #[test]
    fn stale_writes_are_rejected() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let p = ProductId::new();
        let now = Utc::now();

        index.append(c, p, 5, now).unwrap();
        let err = index.remove(c, p, 4).unwrap_err();
        match err {
            EngineError::StaleWrite { last, found, .. } => {
                assert_eq!(last, 5);
                assert_eq!(found, 4);
            }
            other => panic!("expected StaleWrite, got {other:?}"),
        }

        // Same-epoch redelivery is allowed.
        assert!(!index.append(c, p, 5, now).unwrap());
    }

    #[test]
    fn stale_insert_cannot_resurrect_a_removed_pair() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let p = ProductId::new();
        let now = Utc::now();

        // A newer remove lands first.
        index.remove(c, p, 7).unwrap();
        assert!(index.append(c, p, 3, now).is_err());
        assert!(!index.contains(c, p));
    }

    #[test]
    fn upsert_repositions_and_renumbers() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let ps = ids(3);
        let now = Utc::now();
        for p in &ps {
            index.append(c, *p, 1, now).unwrap();
        }

        // Move the tail to the head.
        assert!(index.upsert(c, ps[2], 0, 2, now).unwrap());
        assert_eq!(index.positions_for(c), vec![ps[2], ps[0], ps[1]]);
        assert_dense(&index, c);

        // Same position again: no-op.
        assert!(!index.upsert(c, ps[2], 0, 3, now).unwrap());
    }

    #[test]
    fn replace_members_preserves_featured_and_created_at() {
        let index = MembershipIndex::new();
        let c = CollectionId::new();
        let ps = ids(3);
        let t0 = Utc::now();
        for p in &ps {
            index.append(c, *p, 1, t0).unwrap();
        }
        index.set_featured(c, ps[0], true, t0);

        let newcomer = ProductId::new();
        let t1 = Utc::now();
        index
            .replace_members(c, vec![ps[0], ps[2], newcomer], 2, t1)
            .unwrap();

        let members = index.members_of(c);
        assert_eq!(members.len(), 3);
        assert!(members[0].featured);
        assert_eq!(members[0].created_at, t0);
        assert_eq!(members[2].product_id, newcomer);
        assert_eq!(members[2].created_at, t1);
        assert_dense(&index, c);

        // The dropped member's reverse lookup is gone.
        assert!(index.collections_of(ps[1]).is_empty());
    }

    #[test]
    fn remove_product_spans_collections() {
        let index = MembershipIndex::new();
        let c1 = CollectionId::new();
        let c2 = CollectionId::new();
        let p = ProductId::new();
        let other = ProductId::new();
        let now = Utc::now();

        index.append(c1, p, 1, now).unwrap();
        index.append(c1, other, 1, now).unwrap();
        index.append(c2, p, 1, now).unwrap();

        assert_eq!(index.remove_product(p, 2), 2);
        assert!(!index.contains(c1, p));
        assert!(!index.contains(c2, p));
        assert_eq!(index.positions_for(c1), vec![other]);
        assert_dense(&index, c1);
        assert!(index.collections_of(p).is_empty());
    }

    #[test]
    fn reverse_lookup_tracks_membership() {
        let index = MembershipIndex::new();
        let c1 = CollectionId::new();
        let c2 = CollectionId::new();
        let p = ProductId::new();
        let now = Utc::now();

        index.append(c1, p, 1, now).unwrap();
        index.append(c2, p, 1, now).unwrap();
        let mut expected = vec![c1, c2];
        expected.sort();
        assert_eq!(index.collections_of(p), expected);

        index.remove(c1, p, 2).unwrap();
        assert_eq!(index.collections_of(p), vec![c2]);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Append(usize),
            Upsert(usize, u32),
            Remove(usize),
        }

        fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
            prop::collection::vec(
                prop_oneof![
                    (0usize..8).prop_map(Op::Append),
                    (0usize..8, 0u32..10).prop_map(|(p, pos)| Op::Upsert(p, pos)),
                    (0usize..8).prop_map(Op::Remove),
                ],
                0..40,
            )
        }

        proptest! {
            /// Property: positions stay a dense permutation of 0..n under
            /// any sequence of upserts and removes.
            #[test]
            fn density_invariant_holds(ops in arb_ops()) {
                let index = MembershipIndex::new();
                let c = CollectionId::new();
                let pool = ids(8);
                let now = Utc::now();

                for (epoch, op) in ops.into_iter().enumerate() {
                    let epoch = epoch as u64 + 1;
                    match op {
                        Op::Append(p) => {
                            index.append(c, pool[p], epoch, now).unwrap();
                        }
                        Op::Upsert(p, pos) => {
                            index.upsert(c, pool[p], pos, epoch, now).unwrap();
                        }
                        Op::Remove(p) => {
                            index.remove(c, pool[p], epoch).unwrap();
                        }
                    }

                    let members = index.members_of(c);
                    let mut positions: Vec<u32> = members.iter().map(|m| m.position).collect();
                    positions.sort_unstable();
                    let expected: Vec<u32> = (0..members.len() as u32).collect();
                    prop_assert_eq!(positions, expected);

                    // Stored order agrees with sort_value order.
                    let by_sort: Vec<&str> = members.iter().map(|m| m.sort_value.as_str()).collect();
                    let mut sorted = by_sort.clone();
                    sorted.sort_unstable();
                    prop_assert_eq!(by_sort, sorted);
                }
            }
        }
    }
}
