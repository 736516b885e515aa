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

//! Keyboard input as seen by the renderer.
//!
//! Device polling lives outside the engine; the camera only needs to ask
//! whether a key is held.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Move forward.
    W,
    /// Strafe left.
    A,
    /// Move backward.
    S,
    /// Strafe right.
    D,
    /// Move down.
    Q,
    /// Move up.
    E,
    /// Pitch up.
    Up,
    /// Pitch down.
    Down,
    /// Yaw left.
    Left,
    /// Yaw right.
    Right,
    /// Move faster.
    Shift,
}

/// A source of keyboard state, registered as a service.
pub trait KeyboardInput: Send + Sync {
    /// Whether `key` is currently held.
    fn is_key_down(&self, key: Key) -> bool;
}

/// Keyboard that never reports a key.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl KeyboardInput for NoInput {
    fn is_key_down(&self, _key: Key) -> bool {
        false
    }
}

/// Keyboard state set programmatically, e.g. by a replay script or a test.
#[derive(Debug, Default)]
pub struct PressedKeys {
    keys: Mutex<HashSet<Key>>,
}

impl PressedKeys {
    /// Creates a state with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as held or released.
    pub fn set(&self, key: Key, down: bool) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if down {
            keys.insert(key);
        } else {
            keys.remove(&key);
        }
    }
}

impl KeyboardInput for PressedKeys {
    fn is_key_down(&self, key: Key) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}
