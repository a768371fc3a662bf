//! Fan-out of [`PlayerEvent`]s to registered subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

use crate::error::DeliveryError;

use super::events::PlayerEvent;

/// Receiver of playback events.
pub trait Subscriber: Send + Sync {
    fn deliver(&self, event: &PlayerEvent) -> Result<(), DeliveryError>;
}

/// Shared subscriber handle; registry identity is pointer identity.
pub type SubscriberHandle = Arc<dyn Subscriber>;

impl<F> Subscriber for F
where
    F: Fn(&PlayerEvent) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, event: &PlayerEvent) -> Result<(), DeliveryError> {
        self(event)
    }
}

/// Subscriber forwarding events into an mpsc channel.
///
/// Reports [`DeliveryError::Disconnected`] once the receiver is dropped.
pub struct ChannelSubscriber {
    tx: Mutex<Sender<PlayerEvent>>,
}

impl ChannelSubscriber {
    pub fn new(tx: Sender<PlayerEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, event: &PlayerEvent) -> Result<(), DeliveryError> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event.clone())
            .map_err(|_| DeliveryError::Disconnected)
    }
}

fn same_handle(a: &SubscriberHandle, b: &SubscriberHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Registry of subscribers.
///
/// Broadcasts deliver to a snapshot of the registry taken outside the lock,
/// so subscribers may register or unregister from inside a callback.
#[derive(Default)]
pub struct EventBroadcaster {
    subscribers: Mutex<Vec<SubscriberHandle>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if it was already registered.
    pub fn register(&self, handle: SubscriberHandle) -> bool {
        let mut subscribers = self.lock();
        if subscribers.iter().any(|existing| same_handle(existing, &handle)) {
            return false;
        }
        subscribers.push(handle);
        true
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&self, handle: &SubscriberHandle) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|existing| !same_handle(existing, handle));
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `event` to every registered subscriber.
    ///
    /// Errors and panics are contained per subscriber; disconnected
    /// subscribers are dropped from the registry. Returns the number of
    /// successful deliveries.
    pub fn broadcast(&self, event: &PlayerEvent) -> usize {
        let snapshot: Vec<SubscriberHandle> = self.lock().clone();
        let mut delivered = 0;
        let mut gone = Vec::new();

        for subscriber in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.deliver(event)));
            match outcome {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(DeliveryError::Disconnected)) => {
                    debug!("dropping disconnected subscriber");
                    gone.push(subscriber);
                }
                Ok(Err(err)) => warn!("subscriber failed: {}", err),
                Err(_) => warn!("subscriber panicked while handling {:?}", event),
            }
        }

        if !gone.is_empty() {
            let mut subscribers = self.lock();
            subscribers.retain(|existing| !gone.iter().any(|dead| same_handle(existing, dead)));
        }

        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SubscriberHandle>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
