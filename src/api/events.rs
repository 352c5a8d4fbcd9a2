//! Event fan-out to guidance consumers.
//!
//! Consumers either register a callback (removed again through its
//! [`CallbackHandle`]) or subscribe to a channel and drain it on their own
//! thread.

use crate::navigation::event::NavigationEvent;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Callback invoked for every published event. Callbacks run on the
/// publishing thread and must not call back into the bus.
pub type EventCallback = Box<dyn Fn(&NavigationEvent) + Send>;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

#[derive(Default)]
struct Registry {
    next_id: u32,
    callbacks: BTreeMap<CallbackHandle, EventCallback>,
    subscribers: Vec<Sender<NavigationEvent>>,
}

#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_callback(&self, callback: EventCallback) -> CallbackHandle {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let handle = CallbackHandle(registry.next_id);
        registry.callbacks.insert(handle, callback);
        handle
    }

    /// Returns false if the handle was not registered
    pub fn unregister_callback(&self, handle: CallbackHandle) -> bool {
        self.registry.lock().callbacks.remove(&handle).is_some()
    }

    /// Channel receiving every event published from now on. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<NavigationEvent> {
        let (tx, rx) = unbounded();
        self.registry.lock().subscribers.push(tx);
        rx
    }

    pub fn publish(&self, event: NavigationEvent) {
        let mut registry = self.registry.lock();
        trace!("[EventBus] {:?}", event);

        for callback in registry.callbacks.values() {
            callback(&event);
        }
        registry
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = NavigationEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn callback_count(&self) -> usize {
        self.registry.lock().callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}
