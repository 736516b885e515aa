// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A synchronous observer list.
///
/// [`emit`](Signal::emit) calls every listener on the caller's thread before
/// returning. Listeners are invoked outside the internal lock, so a listener
/// may subscribe or drop subscriptions without deadlocking.
pub struct Signal<T: 'static> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no listeners.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Registers `listener`. It stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription immediately unregisters the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                    slots.listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Notifies every live listener, in subscription order.
    pub fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(value);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a [`Signal`] listener registered. Dropping it unregisters the listener.
///
/// A subscription may outlive its signal; dropping it is then a no-op.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_every_listener_synchronously() {
        let signal = Signal::<u32>::new();
        let sum = Arc::new(AtomicUsize::new(0));
        let a = {
            let sum = Arc::clone(&sum);
            signal.subscribe(move |v| {
                sum.fetch_add(*v as usize, Ordering::SeqCst);
            })
        };
        let b = {
            let sum = Arc::clone(&sum);
            signal.subscribe(move |v| {
                sum.fetch_add(*v as usize * 10, Ordering::SeqCst);
            })
        };

        signal.emit(&2);
        assert_eq!(sum.load(Ordering::SeqCst), 22);
        drop((a, b));
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let signal = Signal::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = {
            let hits = Arc::clone(&hits);
            signal.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(signal.listener_count(), 1);
        signal.emit(&());
        drop(sub);
        assert_eq!(signal.listener_count(), 0);
        signal.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_may_outlive_signal() {
        let signal = Signal::<i32>::new();
        let sub = signal.subscribe(|_| {});
        drop(signal);
        drop(sub);
    }
}
