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

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use umbra_core::renderer::ResourceError;

/// Why a resource could not be loaded.
///
/// Load failures are recoverable: the cache keeps no entry and the caller
/// substitutes a fallback.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        /// The path that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but its content could not be decoded.
    #[error("failed to decode '{}': {message}", .path.display())]
    Decode {
        /// The path that was decoded.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// The GPU resource could not be created.
    #[error("failed to create GPU resource for '{}': {source}", .path.display())]
    Gpu {
        /// The path being loaded.
        path: PathBuf,
        /// The RHI error.
        #[source]
        source: ResourceError,
    },
}

/// Loads one kind of resource from a path.
pub trait ResourceLoader<R>: Send + Sync {
    /// Loads the resource at `path`.
    fn load(&self, path: &Path) -> Result<R, LoadError>;
}

/// Result of [`ResourceCache::get_or_load`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<R> {
    /// The resource, or `None` when the load failed.
    pub resource: Option<R>,
    /// `true` when this call did not perform the load itself.
    pub existed: bool,
}

#[derive(Debug)]
enum SlotState<R> {
    Loading,
    Ready(R),
    Failed,
}

#[derive(Debug)]
struct Slot<R> {
    state: Mutex<SlotState<R>>,
    settled: Condvar,
}

impl<R: Clone> Slot<R> {
    fn loading() -> Self {
        Self {
            state: Mutex::new(SlotState::Loading),
            settled: Condvar::new(),
        }
    }

    fn settle(&self, state: SlotState<R>) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.settled.notify_all();
    }

    fn wait(&self) -> Option<R> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*state {
                SlotState::Loading => {
                    state = self
                        .settled
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                SlotState::Ready(resource) => return Some(resource.clone()),
                SlotState::Failed => return None,
            }
        }
    }

    /// `None` while the load is in flight, otherwise the loaded resource if any.
    fn settled(&self) -> Option<Option<R>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Loading => None,
            SlotState::Ready(resource) => Some(Some(resource.clone())),
            SlotState::Failed => Some(None),
        }
    }

    fn ready(&self) -> Option<R> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Ready(resource) => Some(resource.clone()),
            _ => None,
        }
    }
}

/// A path-keyed cache with at most one load in flight per path.
///
/// The map lock only covers the lookup or insertion of a per-path slot. The
/// load itself runs outside it, so unrelated paths load in parallel while
/// concurrent requests for the same path block on that path's slot until the
/// first load settles. A failed load removes its slot, so a later request
/// retries.
///
/// There is no automatic eviction; entries leave through
/// [`remove`](ResourceCache::remove) or [`clear`](ResourceCache::clear).
/// Both leave in-flight entries in place, so a load that settles afterwards
/// is still owned by the cache and returned by a later `clear`.
pub struct ResourceCache<R: Clone + Send + Sync + 'static> {
    name: &'static str,
    slots: Mutex<HashMap<String, Arc<Slot<R>>>>,
    loads: AtomicU64,
}

/// Settles a slot as failed if the load never completes (e.g. the loader panicked).
struct PendingLoad<'a, R: Clone + Send + Sync + 'static> {
    cache: &'a ResourceCache<R>,
    path: &'a str,
    slot: Arc<Slot<R>>,
    done: bool,
}

impl<R: Clone + Send + Sync + 'static> PendingLoad<'_, R> {
    fn fail(&mut self) {
        self.done = true;
        self.slot.settle(SlotState::Failed);
        self.cache.remove_slot(self.path, &self.slot);
    }

    fn succeed(&mut self, resource: R) {
        self.done = true;
        self.slot.settle(SlotState::Ready(resource));
    }
}

impl<R: Clone + Send + Sync + 'static> Drop for PendingLoad<'_, R> {
    fn drop(&mut self) {
        if !self.done {
            log::error!(
                "{} cache: load of '{}' was abandoned",
                self.cache.name,
                self.path
            );
            self.fail();
        }
    }
}

impl<R: Clone + Send + Sync + 'static> ResourceCache<R> {
    /// Creates an empty cache. `name` is used in log messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(HashMap::new()),
            loads: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Slot<R>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_slot(&self, path: &str, slot: &Arc<Slot<R>>) {
        let mut slots = self.slots();
        if slots.get(path).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(path);
        }
    }

    /// Returns the resource for `path`, running `load` only if no other
    /// caller has loaded or is loading it.
    pub fn get_or_load<F>(&self, path: &str, load: F) -> CacheLookup<R>
    where
        F: FnOnce(&str) -> Result<R, LoadError>,
    {
        let (slot, owner) = {
            let mut slots = self.slots();
            match slots.get(path) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot::loading());
                    slots.insert(path.to_string(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !owner {
            let resource = slot.wait();
            let existed = resource.is_some();
            return CacheLookup { resource, existed };
        }

        let mut pending = PendingLoad {
            cache: self,
            path,
            slot,
            done: false,
        };
        self.loads.fetch_add(1, Ordering::Relaxed);
        log::debug!("{} cache: loading '{path}'", self.name);
        match load(path) {
            Ok(resource) => {
                pending.succeed(resource.clone());
                CacheLookup {
                    resource: Some(resource),
                    existed: false,
                }
            }
            Err(err) => {
                log::warn!("{} cache: {err}", self.name);
                pending.fail();
                CacheLookup {
                    resource: None,
                    existed: false,
                }
            }
        }
    }

    /// [`get_or_load`](Self::get_or_load) with a [`ResourceLoader`] reading
    /// from `root.join(path)`.
    pub fn get_or_load_with(
        &self,
        root: &Path,
        path: &str,
        loader: &dyn ResourceLoader<R>,
    ) -> CacheLookup<R> {
        self.get_or_load(path, |p| loader.load(&root.join(p)))
    }

    /// The resource for `path`, if it is loaded. Never waits.
    pub fn get(&self, path: &str) -> Option<R> {
        let slot = self.slots().get(path).cloned()?;
        slot.ready()
    }

    /// Whether `path` has a loaded or in-flight entry.
    pub fn is_in_cache(&self, path: &str) -> bool {
        self.slots().contains_key(path)
    }

    /// Removes one entry and returns its resource if it was loaded. An entry
    /// still loading is kept.
    pub fn remove(&self, path: &str) -> Option<R> {
        let mut slots = self.slots();
        let resource = slots.get(path)?.settled()?;
        slots.remove(path);
        resource
    }

    /// Removes every settled entry and returns the loaded resources, so the
    /// caller can release their GPU memory. Entries still loading are kept.
    pub fn clear(&self) -> Vec<R> {
        let mut released = Vec::new();
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| match slot.settled() {
            None => true,
            Some(resource) => {
                released.extend(resource);
                false
            }
        });
        log::debug!(
            "{} cache: cleared {} entries, {} still loading",
            self.name,
            before - slots.len(),
            slots.len()
        );
        released
    }

    /// Number of entries, in flight included.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Every cached path, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.slots().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of loads started since creation.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl<R: Clone + Send + Sync + 'static> std::fmt::Debug for ResourceCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn decode_error(path: &str) -> LoadError {
        LoadError::Decode {
            path: PathBuf::from(path),
            message: "bad".into(),
        }
    }

    #[test]
    fn second_lookup_hits_cache() {
        let cache = ResourceCache::<Arc<String>>::new("test");
        let first = cache.get_or_load("a.png", |p| Ok(Arc::new(p.to_string())));
        assert!(!first.existed);
        let second = cache.get_or_load("a.png", |_| panic!("must not reload"));
        assert!(second.existed);
        assert!(Arc::ptr_eq(&first.resource.unwrap(), &second.resource.unwrap()));
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn failed_load_leaves_no_entry() {
        let cache = ResourceCache::<u32>::new("test");
        let lookup = cache.get_or_load("broken.png", |p| Err(decode_error(p)));
        assert_eq!(lookup.resource, None);
        assert!(!cache.is_in_cache("broken.png"));

        let retry = cache.get_or_load("broken.png", |_| Ok(7));
        assert_eq!(retry.resource, Some(7));
    }

    #[test]
    fn concurrent_requests_load_once() {
        const THREADS: usize = 8;
        let cache = Arc::new(ResourceCache::<Arc<u64>>::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_load("shared.png", |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(Arc::new(42))
                        })
                        .resource
                        .expect("every caller gets the resource")
                })
            })
            .collect();

        let results: Vec<Arc<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn concurrent_requests_all_see_failure() {
        const THREADS: usize = 6;
        let cache = Arc::new(ResourceCache::<u8>::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_load("missing.png", |p| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            Err(decode_error(p))
                        })
                        .resource
                })
            })
            .collect();

        for h in handles {
            // Threads that arrive after the failed slot was removed start a
            // fresh load and fail too.
            assert_eq!(h.join().unwrap(), None);
        }
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn unrelated_paths_load_in_parallel() {
        let cache = Arc::new(ResourceCache::<u8>::new("test"));
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|path| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    cache.get_or_load(path, |_| {
                        // Both loads must be running at once to pass the barrier.
                        barrier.wait();
                        Ok(1)
                    })
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().resource, Some(1));
        }
        assert_eq!(cache.paths(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn panicking_loader_releases_waiters() {
        let cache = Arc::new(ResourceCache::<u8>::new("test"));
        let c = Arc::clone(&cache);
        let result = thread::spawn(move || {
            c.get_or_load("boom", |_| panic!("decoder crashed"));
        })
        .join();
        assert!(result.is_err());
        assert!(!cache.is_in_cache("boom"));
        assert_eq!(cache.get_or_load("boom", |_| Ok(3)).resource, Some(3));
    }

    #[test]
    fn clear_and_remove_return_resources() {
        let cache = ResourceCache::<u8>::new("test");
        cache.get_or_load("x", |_| Ok(1));
        cache.get_or_load("y", |_| Ok(2));
        assert_eq!(cache.remove("x"), Some(1));
        assert_eq!(cache.get("y"), Some(2));
        let mut cleared = cache.clear();
        cleared.sort();
        assert_eq!(cleared, vec![2]);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_keeps_loads_in_flight() {
        let cache = Arc::new(ResourceCache::<u8>::new("test"));
        cache.get_or_load("done", |_| Ok(1));
        let started = Arc::new(Barrier::new(2));
        let finish = Arc::new(Barrier::new(2));
        let loader = {
            let cache = Arc::clone(&cache);
            let started = Arc::clone(&started);
            let finish = Arc::clone(&finish);
            thread::spawn(move || {
                cache.get_or_load("slow", |_| {
                    started.wait();
                    finish.wait();
                    Ok(5)
                })
            })
        };

        started.wait();
        assert_eq!(cache.clear(), vec![1]);
        assert_eq!(cache.remove("slow"), None);
        assert!(cache.is_in_cache("slow"));
        finish.wait();
        assert_eq!(loader.join().unwrap().resource, Some(5));

        // the late resource is still owned by the cache
        assert_eq!(cache.get("slow"), Some(5));
        assert_eq!(cache.clear(), vec![5]);
        assert!(cache.is_empty());
    }

    struct CountingLoader(AtomicUsize);

    impl ResourceLoader<String> for CountingLoader {
        fn load(&self, path: &Path) -> Result<String, LoadError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(path.display().to_string())
        }
    }

    #[test]
    fn loader_receives_rooted_path() {
        let cache = ResourceCache::<String>::new("test");
        let loader = CountingLoader(AtomicUsize::new(0));
        let lookup = cache.get_or_load_with(Path::new("assets"), "tex/a.png", &loader);
        assert_eq!(lookup.resource.as_deref(), Some(Path::new("assets").join("tex/a.png").to_str().unwrap()));
        cache.get_or_load_with(Path::new("assets"), "tex/a.png", &loader);
        assert_eq!(loader.0.load(Ordering::SeqCst), 1);
    }
}
