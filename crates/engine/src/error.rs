//! Engine error model.

use thiserror::Error;

use merchkit_core::{CollectionId, ProductId};

/// Failures surfaced by the membership engine.
///
/// Malformed rule conditions are *not* here: they resolve to a non-match and
/// are recorded on the recompute report instead of aborting evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A membership write lost the race to a newer evaluation of the same
    /// (collection, product) pair.
    #[error("stale write for ({collection_id}, {product_id}): epoch {found} < {last}")]
    StaleWrite {
        collection_id: CollectionId,
        product_id: ProductId,
        last: u64,
        found: u64,
    },

    /// The collection-scoped exclusive section could not be acquired within
    /// budget. Retryable: the event source redelivers.
    #[error("timed out waiting for exclusive access to collection {collection_id}")]
    RecomputationTimeout { collection_id: CollectionId },

    /// A full recomputation pass was superseded and cancelled. Partial
    /// progress was discarded; the newer trigger redoes the pass.
    #[error("recomputation cancelled for collection {collection_id}")]
    Cancelled { collection_id: CollectionId },
}

impl EngineError {
    /// Whether the caller should back off and redeliver the trigger.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::RecomputationTimeout { .. })
    }
}
