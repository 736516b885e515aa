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

//! A type-safe service locator scoped to one engine core.
//!
//! The [`ServiceRegistry`] holds the few collaborators that subsystems look
//! up rather than receive by argument (the camera and the keyboard). Anything
//! else is passed explicitly.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::error::EngineError;

/// A generic service registry keyed by [`TypeId`].
///
/// # Example
///
/// ```rust
/// use umbra_core::service_registry::ServiceRegistry;
///
/// struct MyService { value: i32 }
///
/// let mut registry = ServiceRegistry::new();
/// registry.insert(MyService { value: 42 });
///
/// let svc = registry.require::<MyService>().unwrap();
/// assert_eq!(svc.value, 42);
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    /// Creates an empty service registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Inserts a service, replacing any previous service of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) {
        log::debug!("Registering service {}", type_name::<T>());
        self.services.insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Retrieves a previously registered service.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Retrieves a service that the caller cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingService`] naming `T` if it was never registered.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<&T, EngineError> {
        self.get::<T>()
            .ok_or(EngineError::MissingService(type_name::<T>()))
    }

    /// Removes and returns a service.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.services
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns `true` if a service of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCamera {
        name: String,
    }

    struct FakeKeyboard;

    #[test]
    fn test_insert_and_get() {
        let mut registry = ServiceRegistry::new();
        registry.insert(FakeCamera {
            name: "main".to_string(),
        });
        assert_eq!(registry.get::<FakeCamera>().unwrap().name, "main");
    }

    #[test]
    fn test_require_missing_names_the_type() {
        let registry = ServiceRegistry::new();
        match registry.require::<FakeKeyboard>() {
            Err(EngineError::MissingService(name)) => assert!(name.ends_with("FakeKeyboard")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_replace_and_remove() {
        let mut registry = ServiceRegistry::new();
        registry.insert(FakeCamera {
            name: "old".to_string(),
        });
        registry.insert(FakeCamera {
            name: "new".to_string(),
        });
        registry.insert(FakeKeyboard);
        assert_eq!(registry.len(), 2);

        let removed = registry.remove::<FakeCamera>().unwrap();
        assert_eq!(removed.name, "new");
        assert!(!registry.contains::<FakeCamera>());
        assert!(registry.contains::<FakeKeyboard>());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(ServiceRegistry::default().is_empty());
    }
}
