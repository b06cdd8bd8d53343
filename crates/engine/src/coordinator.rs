//! Recomputation coordinator.
//!
//! Reacts to catalog events, selects the minimal set of
//! (collection, product) pairs to re-evaluate, and applies membership deltas
//! to the index:
//!
//! - product changed — re-evaluate that product against every rule-driven
//!   collection (the cheap, common path)
//! - rules changed — full recompute of the one affected collection against
//!   the whole catalog (the expensive, rare path)
//! - product deleted — drop its Collect rows everywhere, manual collections
//!   included
//!
//! Handlers are idempotent: redelivering the same trigger with unchanged
//! inputs produces no index mutation, so at-least-once delivery is safe.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use merchkit_catalog::{CatalogReader, Collection, CollectionReader, Product};
use merchkit_core::{CollectionId, ProductId};
use merchkit_events::CatalogEvent;

use crate::error::EngineError;
use crate::gate::CollectionGates;
use crate::index::MembershipIndex;
use crate::predicate::MalformedCondition;
use crate::ruleset;

const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cooperative cancellation for a full recomputation pass.
///
/// A rule edit superseded by a newer edit cancels the in-flight pass;
/// partial progress is staged, never visible, and safe to discard.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What one trigger did to the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Verdicts computed.
    pub evaluated: usize,
    /// Memberships created.
    pub added: usize,
    /// Memberships destroyed.
    pub removed: usize,
    /// Pairs whose membership did not change.
    pub unchanged: usize,
    /// Malformed rule conditions encountered (each resolved to non-match).
    pub malformed: Vec<MalformedCondition>,
}

impl RecomputeReport {
    /// True when the trigger produced no index mutation.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Drives membership recomputation off catalog events.
#[derive(Debug)]
pub struct Coordinator<C, R> {
    catalog: C,
    collections: R,
    index: Arc<MembershipIndex>,
    gates: CollectionGates,
    epoch: AtomicU64,
    gate_timeout: Duration,
}

impl<C, R> Coordinator<C, R>
where
    C: CatalogReader,
    R: CollectionReader,
{
    pub fn new(catalog: C, collections: R, index: Arc<MembershipIndex>) -> Self {
        Self {
            catalog,
            collections,
            index,
            gates: CollectionGates::new(),
            epoch: AtomicU64::new(0),
            gate_timeout: DEFAULT_GATE_TIMEOUT,
        }
    }

    /// Bound on waiting for a collection's exclusive section.
    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn index(&self) -> &Arc<MembershipIndex> {
        &self.index
    }

    /// Dispatch one catalog event to its handler.
    pub fn handle(&self, event: &CatalogEvent) -> Result<RecomputeReport, EngineError> {
        match event {
            CatalogEvent::ProductChanged(e) => self.product_changed(e.product_id),
            CatalogEvent::ProductDeleted(e) => self.product_deleted(e.product_id),
            CatalogEvent::CollectionRulesChanged(e) => self.rules_changed(e.collection_id),
        }
    }

    /// Monotonic write version; the numerically newest evaluation wins at
    /// the index.
    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Re-evaluate one product against every rule-driven collection.
    ///
    /// Membership delta per collection: join at the tail, leave with
    /// renumbering, or no write at all when membership is unchanged (a
    /// member that still matches keeps its position; attribute-derived
    /// ordering is the Ordering Resolver's read-time concern).
    pub fn product_changed(&self, product_id: ProductId) -> Result<RecomputeReport, EngineError> {
        if self.catalog.product(product_id).is_none() {
            // Redelivered change events can trail a deletion.
            debug!(%product_id, "product missing from catalog; clearing membership");
            return self.product_deleted(product_id);
        }

        let mut report = RecomputeReport::default();

        for collection in self.collections.collections() {
            // Manual collections are curation-only; recomputation never
            // touches them.
            if collection.is_manual() {
                continue;
            }

            let _gate = self.gates.acquire(collection.id, self.gate_timeout)?;

            // Snapshot and epoch are taken inside the gated section, so for
            // any one collection epoch order agrees with snapshot age: a
            // delayed redelivery cannot pair an old snapshot with a newer
            // epoch and overwrite a fresher evaluation.
            let snapshot = self.catalog.product(product_id);
            let epoch = self.next_epoch();
            let now = Utc::now();

            let is_match = match &snapshot {
                Some(product) => {
                    let mut issues = Vec::new();
                    let verdict = ruleset::matches_reporting(product, &collection, &mut issues);
                    self.log_issues(collection.id, product_id, &issues);
                    report.malformed.extend(issues);
                    verdict
                }
                // Vanished mid-pass; membership cannot survive.
                None => false,
            };
            report.evaluated += 1;

            let was_member = self.index.contains(collection.id, product_id);
            let delta = match (was_member, is_match) {
                (false, true) => self.index.append(collection.id, product_id, epoch, now),
                (true, false) => self.index.remove(collection.id, product_id, epoch),
                _ => Ok(false),
            };

            match delta {
                Ok(true) if is_match => report.added += 1,
                Ok(true) => report.removed += 1,
                Ok(false) => report.unchanged += 1,
                Err(EngineError::StaleWrite { last, found, .. }) => {
                    // A newer evaluation of this pair already landed.
                    debug!(collection_id = %collection.id, %product_id, last, found, "stale write skipped");
                    report.unchanged += 1;
                }
                Err(other) => return Err(other),
            }
        }

        debug!(%product_id, added = report.added, removed = report.removed, "product change applied");
        Ok(report)
    }

    /// Full recompute of one collection (rule added/removed/edited or the
    /// disjunctive flag toggled).
    pub fn rules_changed(&self, collection_id: CollectionId) -> Result<RecomputeReport, EngineError> {
        self.rules_changed_with(collection_id, &CancellationToken::new())
    }

    /// Full recompute with cooperative cancellation.
    ///
    /// Retained members keep their relative order; removal-induced gaps are
    /// closed without reshuffling survivors. Newly matching products append
    /// after the survivors in catalog (created_at, id) order. The staged
    /// member list is swapped in atomically, so readers never observe a
    /// partially-recomputed collection.
    pub fn rules_changed_with(
        &self,
        collection_id: CollectionId,
        token: &CancellationToken,
    ) -> Result<RecomputeReport, EngineError> {
        let _gate = self.gates.acquire(collection_id, self.gate_timeout)?;

        // Definition, catalog scan, and epoch all live inside the gated
        // section: the epoch issued here is newer than any epoch an earlier
        // gate holder wrote with, so the staged swap cannot lose to a
        // concurrent product-changed delta.
        let Some(collection) = self.collections.collection(collection_id) else {
            debug!(%collection_id, "unknown collection; nothing to recompute");
            return Ok(RecomputeReport::default());
        };
        if collection.is_manual() {
            // Zero rules: membership is explicit curation, left untouched.
            return Ok(RecomputeReport::default());
        }

        let epoch = self.next_epoch();
        let now = Utc::now();

        let mut report = RecomputeReport::default();
        let current = self.index.positions_for(collection_id);
        let current_set: HashSet<ProductId> = current.iter().copied().collect();

        let mut staged: Vec<ProductId> = Vec::with_capacity(current.len());
        for product_id in &current {
            self.check_cancelled(collection_id, token)?;
            let keeps = match self.catalog.product(*product_id) {
                Some(product) => self.verdict(&product, &collection, &mut report),
                // Members whose product vanished from the snapshot drop out.
                None => false,
            };
            if keeps {
                staged.push(*product_id);
            } else {
                report.removed += 1;
            }
        }
        report.unchanged = staged.len();

        let mut newcomers: Vec<Product> = Vec::new();
        for product in self.catalog.products() {
            self.check_cancelled(collection_id, token)?;
            if current_set.contains(&product.id) {
                continue;
            }
            if self.verdict(&product, &collection, &mut report) {
                newcomers.push(product);
            }
        }
        newcomers.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        report.added = newcomers.len();
        staged.extend(newcomers.into_iter().map(|p| p.id));

        self.index.replace_members(collection_id, staged, epoch, now)?;
        debug!(%collection_id, added = report.added, removed = report.removed, "rules change applied");
        Ok(report)
    }

    /// Drop all of a product's Collect rows, across rule-driven and manual
    /// collections alike.
    ///
    /// Deletion is terminal: it bypasses the stale-write check (a delete can
    /// never lose to a change evaluation, whatever its epoch) and advances
    /// the pair epochs so a trailing change event cannot resurrect the rows.
    pub fn product_deleted(&self, product_id: ProductId) -> Result<RecomputeReport, EngineError> {
        // Hold every affected collection's gate so an in-flight recompute
        // finishes its staged swap before the rows disappear.
        // `collections_of` returns sorted ids, keeping acquisition order
        // consistent across deleters.
        let mut gates = Vec::new();
        for collection_id in self.index.collections_of(product_id) {
            gates.push(self.gates.acquire(collection_id, self.gate_timeout)?);
        }

        let epoch = self.next_epoch();
        let mut report = RecomputeReport::default();
        report.removed = self.index.remove_product(product_id, epoch);

        debug!(%product_id, removed = report.removed, "product deletion applied");
        Ok(report)
    }

    fn verdict(
        &self,
        product: &Product,
        collection: &Collection,
        report: &mut RecomputeReport,
    ) -> bool {
        let mut issues = Vec::new();
        let is_match = ruleset::matches_reporting(product, collection, &mut issues);
        self.log_issues(collection.id, product.id, &issues);
        report.malformed.extend(issues);
        report.evaluated += 1;
        is_match
    }

    fn check_cancelled(
        &self,
        collection_id: CollectionId,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        if token.is_cancelled() {
            debug!(%collection_id, "recompute pass superseded; discarding partial progress");
            return Err(EngineError::Cancelled { collection_id });
        }
        Ok(())
    }

    fn log_issues(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
        issues: &[MalformedCondition],
    ) {
        for issue in issues {
            warn!(%collection_id, %product_id, %issue, "malformed rule condition treated as non-match");
        }
    }
}
