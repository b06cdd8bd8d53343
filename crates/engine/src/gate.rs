//! Collection-scoped exclusive sections.
//!
//! Full recomputation of a collection must not interleave with other writes
//! to the same collection, while unrelated collections proceed in parallel.
//! Acquisition is bounded: a holder that is slow to release surfaces as a
//! retryable [`EngineError::RecomputationTimeout`] instead of a deadlock.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use merchkit_core::CollectionId;

use crate::error::EngineError;

/// Registry of per-collection exclusive sections.
#[derive(Debug, Default)]
pub struct CollectionGates {
    held: Mutex<HashSet<CollectionId>>,
    released: Condvar,
}

impl CollectionGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the section for one collection, waiting up to `timeout`.
    pub fn acquire(
        &self,
        collection_id: CollectionId,
        timeout: Duration,
    ) -> Result<GateGuard<'_>, EngineError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        while held.contains(&collection_id) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::RecomputationTimeout { collection_id });
            }
            let (guard, result) = self
                .released
                .wait_timeout(held, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            held = guard;
            if result.timed_out() && held.contains(&collection_id) {
                return Err(EngineError::RecomputationTimeout { collection_id });
            }
        }

        held.insert(collection_id);
        Ok(GateGuard {
            gates: self,
            collection_id,
        })
    }
}

/// Holds one collection's exclusive section; released on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gates: &'a CollectionGates,
    collection_id: CollectionId,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .gates
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.collection_id);
        drop(held);
        self.gates.released.notify_all();
    }
}
