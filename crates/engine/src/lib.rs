//! `merchkit-engine` — smart-collection membership engine.
//!
//! Evaluates per-product rules, maintains the membership index
//! incrementally as products and rules change, and projects presentation
//! order at read time.
//!
//! Data flow: catalog event → [`coordinator`] selects affected
//! (collection, product) pairs → [`ruleset`] (via [`predicate`]) computes
//! verdicts → [`index`] applies membership deltas → [`ordering`] resolves
//! presentation order on read.

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod index;
pub mod ordering;
pub mod predicate;
pub mod query;
pub mod ruleset;
pub mod worker;


pub use coordinator::{CancellationToken, Coordinator, RecomputeReport};
pub use error::EngineError;
pub use index::{Collect, MembershipIndex};
pub use ordering::{order, OrderingOptions};
pub use predicate::MalformedCondition;
pub use query::ViewFilter;
pub use worker::{EngineWorker, WorkerHandle};
