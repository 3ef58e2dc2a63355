//! Multi-subscriber event channels
//!
//! An [`EventChannel`] is an unbuffered observer list: subscribers only see
//! values emitted after they subscribed. Once a channel is completed it drops
//! all observers, ignores further emissions, and rejects new subscriptions.
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use strata_core::channel::EventChannel;
//!
//! let channel = EventChannel::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let s = Arc::clone(&seen);
//! let sub = channel.subscribe(move |v| { s.fetch_add(*v as usize, Ordering::SeqCst); }).unwrap();
//!
//! channel.next(&3);
//! sub.unsubscribe();
//! channel.next(&4);
//! assert_eq!(seen.load(Ordering::SeqCst), 3);
//! ```

use std::sync::{Arc, Mutex, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::error::{Result, StrataError};

new_key_type! {
    /// Identifier of a channel subscriber
    pub struct SubscriberId;
}

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ChannelState<T> {
    observers: SlotMap<SubscriberId, Observer<T>>,
    completed: bool,
}

/// Multi-subscriber publish stream
pub struct EventChannel<T> {
    state: Arc<Mutex<ChannelState<T>>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                observers: SlotMap::with_key(),
                completed: false,
            })),
        }
    }

    /// Register an observer
    ///
    /// Fails with [`StrataError::ChannelCompleted`] once the channel completed.
    pub fn subscribe<F>(&self, observer: F) -> Result<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if state.completed {
            return Err(StrataError::ChannelCompleted);
        }
        let id = state.observers.insert(Arc::new(observer));
        let weak: Weak<Mutex<ChannelState<T>>> = Arc::downgrade(&self.state);

        Ok(Subscription {
            id,
            remove: Some(Box::new(move |id| {
                if let Some(state) = weak.upgrade() {
                    state.lock().unwrap().observers.remove(id);
                }
            })),
        })
    }

    /// Emit a value to every current observer
    ///
    /// Returns the number of observers notified. Observers run without the
    /// channel lock held, so they may subscribe, unsubscribe or complete.
    pub fn next(&self, value: &T) -> usize {
        let observers: Vec<Observer<T>> = {
            let state = self.state.lock().unwrap();
            if state.completed {
                return 0;
            }
            state.observers.values().cloned().collect()
        };
        for observer in &observers {
            observer(value);
        }
        observers.len()
    }

    /// Complete the channel, dropping all observers
    pub fn complete(&self) {
        let mut state = self.state.lock().unwrap();
        state.completed = true;
        state.observers.clear();
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().unwrap().completed
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().unwrap().observers.len()
    }

    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("EventChannel")
            .field("observers", &state.observers.len())
            .field("completed", &state.completed)
            .finish()
    }
}

/// Handle to an active channel subscription
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: SubscriberId,
    remove: Option<Box<dyn FnOnce(SubscriberId) + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop receiving values
    pub fn unsubscribe(mut self) {
        self.close();
    }

    /// Stop receiving values without consuming the handle
    pub fn close(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove(self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.remove.is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
