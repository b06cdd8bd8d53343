//! Channel-backed bus for tests and single-process deployments.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

/// Failure to hand a message to subscribers.
#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// The subscriber registry was poisoned by a panicking publisher. The
    /// trigger is not lost if the caller redelivers; recomputation converges
    /// on replay.
    #[error("subscriber registry poisoned")]
    Poisoned,
}

/// Fan-out over std mpsc channels.
///
/// Each subscription owns a channel and receives its own clone of every
/// message published after it was created. Nothing is stored: a message
/// published with no live subscribers is gone. Duplicate delivery is
/// tolerated by contract, so the membership handlers downstream stay
/// idempotent.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    senders: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Live subscriptions. Dropped ones linger until the next publish
    /// prunes them.
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut senders = self.senders.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        // A send error means the subscription was dropped; prune as we go.
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        // On a poisoned registry the sender is dropped unregistered and the
        // subscription's recv reports disconnection.
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_messages_published_after_subscribing() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        bus.publish(1).unwrap();

        let sub = bus.subscribe();
        bus.publish(2).unwrap();
        bus.publish(3).unwrap();

        assert_eq!(sub.try_recv().unwrap(), 2);
        assert_eq!(sub.try_recv().unwrap(), 3);
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn fan_out_reaches_every_subscriber() {
        let bus: InMemoryEventBus<&'static str> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("hello").unwrap();

        assert_eq!(a.try_recv().unwrap(), "hello");
        assert_eq!(b.try_recv().unwrap(), "hello");
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(7).unwrap();
        assert_eq!(keep.try_recv().unwrap(), 7);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
