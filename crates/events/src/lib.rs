//! `merchkit-events` — catalog change notifications.
//!
//! Events tell the recomputation coordinator that a product or a rule set
//! changed; they carry identifiers, not payload snapshots (the coordinator
//! re-reads the catalog). Delivery is at-least-once: every handler downstream
//! must be idempotent.

pub mod bus;
pub mod catalog_event;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use catalog_event::{CatalogEvent, CollectionRulesChanged, ProductChanged, ProductDeleted};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
