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

/// A generic, thread-safe event channel.
///
/// The bus is generic over the event type `T` so `umbra-core` stays decoupled
/// from the event vocabularies defined by higher-level crates.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + Sync + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Creates a new bus with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Sends an event, logging an error if the receiver is disconnected.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sender end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a reference to the receiver end of the channel.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Takes every event currently queued, in publication order.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Resized { width: u32, height: u32 },
        Shutdown,
    }

    #[test]
    fn drain_returns_events_in_order() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Resized {
            width: 1,
            height: 2,
        });
        bus.publish(TestEvent::Shutdown);

        let events = bus.drain();
        assert_eq!(
            events,
            vec![
                TestEvent::Resized {
                    width: 1,
                    height: 2
                },
                TestEvent::Shutdown
            ]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn send_from_thread() {
        let bus = EventBus::<TestEvent>::new();
        let sender = bus.sender();
        let handle = thread::spawn(move || {
            sender.send(TestEvent::Shutdown).expect("send from thread");
        });
        handle.join().expect("thread panicked");
        assert_eq!(bus.receiver().try_recv(), Ok(TestEvent::Shutdown));
    }
}
