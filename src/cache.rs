//! Identity cache.
//!
//! [`IdentityCache`] memoizes [`ResolutionStrategy::resolve`] per
//! [`EntityDescriptor`]. Concurrent `get` calls for the same descriptor share
//! a single in-flight resolution: the first caller runs the resolver, the
//! others block on its result. Entries expire a fixed time after they were
//! written (reads do not extend their life); an expiration of zero disables
//! time-based expiry.
//!
//! A failed resolution is handed to every caller that was waiting on it and
//! then forgotten, so the next `get` starts from scratch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::entity::{EntityDescriptor, EntityHandle};
use crate::error::ResolutionError;
use crate::resolution::ResolutionStrategy;
use crate::time::{Clock, SystemClock};

type LoadResult = Result<EntityHandle, ResolutionError>;

/// Settings for an [`IdentityCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSettings {
    /// Seconds after write at which an entry expires. Zero means never.
    pub expiration_seconds: u64,
    /// Passed through to the resolver on every load.
    pub create_if_missing: bool,
}

/// A point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a live entry or by joining an in-flight load.
    pub hits: u64,
    /// Lookups that started a load.
    pub misses: u64,
    /// Loads that returned a handle.
    pub load_successes: u64,
    /// Loads that failed or were abandoned.
    pub load_failures: u64,
    /// Entries dropped because they expired.
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    load_successes: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            load_successes: self.load_successes.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// One resolution in progress; waiters block until `result` is set.
#[derive(Debug, Default)]
struct InFlight {
    result: Mutex<Option<LoadResult>>,
    ready: Condvar,
}

impl InFlight {
    fn complete(&self, result: LoadResult) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> LoadResult {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug)]
enum Slot {
    Ready {
        handle: EntityHandle,
        written_at: Instant,
    },
    Loading(Arc<InFlight>),
}

enum Lookup {
    Hit(EntityHandle),
    Wait(Arc<InFlight>),
    Load(Arc<InFlight>),
}

/// Single-flight, expire-after-write cache from descriptor to handle.
pub struct IdentityCache {
    resolver: Arc<dyn ResolutionStrategy>,
    settings: CacheSettings,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<EntityDescriptor, Slot>>,
    counters: Counters,
}

impl IdentityCache {
    /// Create an empty cache backed by `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn ResolutionStrategy>, settings: CacheSettings) -> Self {
        let ttl = (settings.expiration_seconds > 0)
            .then(|| Duration::from_secs(settings.expiration_seconds));
        Self {
            resolver,
            settings,
            ttl,
            clock: Arc::new(SystemClock),
            entries: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Use `clock` to measure entry age.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings this cache was built with.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Return the handle for `descriptor`, resolving it on a miss.
    ///
    /// Blocks while the descriptor is being resolved, either by this call or
    /// by a concurrent one. Call it from an executor thread, never from a
    /// dispatch thread.
    pub fn get(&self, descriptor: &EntityDescriptor) -> Result<EntityHandle, ResolutionError> {
        match self.begin(descriptor) {
            Lookup::Hit(handle) => Ok(handle),
            Lookup::Wait(flight) => flight.wait(),
            Lookup::Load(flight) => self.load(descriptor, flight),
        }
    }

    /// Cached handle for `descriptor`, without resolving. Expired entries are
    /// reported as absent.
    #[must_use]
    pub fn peek(&self, descriptor: &EntityDescriptor) -> Option<EntityHandle> {
        let now = self.clock.now();
        match self.lock_entries().get(descriptor) {
            Some(Slot::Ready { handle, written_at }) if !self.is_expired(*written_at, now) => {
                Some(*handle)
            }
            _ => None,
        }
    }

    /// Drop the entry for `descriptor`. A resolution already in flight still
    /// completes for its waiters but is not stored.
    pub fn invalidate(&self, descriptor: &EntityDescriptor) {
        if self.lock_entries().remove(descriptor).is_some() {
            debug!(descriptor = %descriptor, "identity cache entry invalidated");
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock_entries();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "identity cache cleared");
    }

    /// Remove every expired entry now instead of on next access. Returns the
    /// number removed.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, slot| match slot {
            Slot::Ready { written_at, .. } => !self.is_expired(*written_at, now),
            Slot::Loading(_) => true,
        });
        let removed = before - entries.len();
        drop(entries);
        if removed > 0 {
            self.counters
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "purged expired identity cache entries");
        }
        removed
    }

    /// Number of resolved entries currently held (expired ones included
    /// until they are touched or purged).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// Returns true if no resolved entry is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<EntityDescriptor, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, written_at: Instant, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(written_at) >= ttl)
    }

    fn begin(&self, descriptor: &EntityDescriptor) -> Lookup {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        match entries.get(descriptor) {
            Some(Slot::Ready { handle, written_at }) if !self.is_expired(*written_at, now) => {
                Counters::bump(&self.counters.hits);
                return Lookup::Hit(*handle);
            }
            Some(Slot::Loading(flight)) => {
                Counters::bump(&self.counters.hits);
                return Lookup::Wait(Arc::clone(flight));
            }
            Some(Slot::Ready { .. }) => {
                Counters::bump(&self.counters.evictions);
                debug!(descriptor = %descriptor, "identity cache entry expired");
            }
            None => {}
        }
        Counters::bump(&self.counters.misses);
        let flight = Arc::new(InFlight::default());
        entries.insert(descriptor.clone(), Slot::Loading(Arc::clone(&flight)));
        Lookup::Load(flight)
    }

    fn load(&self, descriptor: &EntityDescriptor, flight: Arc<InFlight>) -> LoadResult {
        debug!(descriptor = %descriptor, "resolving identity");
        let mut guard = LoadGuard {
            cache: self,
            descriptor,
            flight,
            finished: false,
        };
        let result = self.resolver.resolve(descriptor, self.settings.create_if_missing);
        guard.finish(result.clone());
        result
    }

    fn store(&self, descriptor: &EntityDescriptor, flight: &Arc<InFlight>, result: &LoadResult) {
        let mut entries = self.lock_entries();
        let owned = matches!(
            entries.get(descriptor),
            Some(Slot::Loading(current)) if Arc::ptr_eq(current, flight)
        );
        if !owned {
            return;
        }
        match result {
            Ok(handle) => {
                entries.insert(
                    descriptor.clone(),
                    Slot::Ready {
                        handle: *handle,
                        written_at: self.clock.now(),
                    },
                );
            }
            Err(_) => {
                entries.remove(descriptor);
            }
        }
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("settings", &self.settings)
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

/// Publishes the load result even if the resolver panics, so waiters never
/// hang and the key is not left in the loading state.
struct LoadGuard<'a> {
    cache: &'a IdentityCache,
    descriptor: &'a EntityDescriptor,
    flight: Arc<InFlight>,
    finished: bool,
}

impl LoadGuard<'_> {
    fn finish(&mut self, result: LoadResult) {
        self.finished = true;
        match &result {
            Ok(_) => Counters::bump(&self.cache.counters.load_successes),
            Err(err) => {
                Counters::bump(&self.cache.counters.load_failures);
                warn!(descriptor = %self.descriptor, error = %err, "identity resolution failed");
            }
        }
        self.cache.store(self.descriptor, &self.flight, &result);
        self.flight.complete(result);
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Err(ResolutionError::Abandoned {
                kind: self.descriptor.kind,
                name: self.descriptor.name.clone(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    use crate::entity::{EntityId, EntityKind};
    use crate::error::StorageError;
    use crate::time::ManualClock;

    /// Resolver that counts calls and can be slowed down or made to fail.
    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl ResolutionStrategy for CountingResolver {
        fn resolve(
            &self,
            descriptor: &EntityDescriptor,
            _create_if_missing: bool,
        ) -> Result<EntityHandle, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if self.fail {
                return Err(ResolutionError::Storage {
                    kind: descriptor.kind,
                    name: descriptor.name.clone(),
                    source: StorageError::Unavailable("down".to_string()),
                });
            }
            Ok(EntityHandle::found(descriptor.kind, EntityId::new()))
        }
    }

    fn cache_with(resolver: &Arc<CountingResolver>, seconds: u64) -> (IdentityCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = IdentityCache::new(
            Arc::clone(resolver) as Arc<dyn ResolutionStrategy>,
            CacheSettings {
                expiration_seconds: seconds,
                create_if_missing: true,
            },
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        (cache, clock)
    }

    fn device(name: &str) -> EntityDescriptor {
        EntityDescriptor::new(EntityKind::Device, name)
    }

    #[test]
    fn test_concurrent_gets_share_one_resolution() {
        let resolver = Arc::new(CountingResolver {
            delay: Duration::from_millis(100),
            ..CountingResolver::default()
        });
        let (cache, _) = cache_with(&resolver, 0);
        let cache = Arc::new(cache);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&device("burst")).unwrap()
                })
            })
            .collect();
        let results: Vec<EntityHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|h| *h == results[0]));
        assert!(results[0].id.is_some());
    }

    #[test]
    fn test_expire_after_write() {
        let resolver = Arc::new(CountingResolver::default());
        let (cache, clock) = cache_with(&resolver, 10);

        let first = cache.get(&device("d")).unwrap();
        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get(&device("d")).unwrap(), first);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

        // Reads do not extend the entry's life.
        clock.advance(Duration::from_millis(1_001));
        let second = cache.get(&device("d")).unwrap();
        assert_ne!(second, first);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_expiration_never_expires() {
        let resolver = Arc::new(CountingResolver::default());
        let (cache, clock) = cache_with(&resolver, 0);

        let first = cache.get(&device("d")).unwrap();
        for _ in 0..10 {
            clock.advance(Duration::from_secs(86_400 * 365));
            assert_eq!(cache.get(&device("d")).unwrap(), first);
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let resolver = Arc::new(CountingResolver {
            fail: true,
            ..CountingResolver::default()
        });
        let (cache, _) = cache_with(&resolver, 60);

        assert!(cache.get(&device("d")).is_err());
        assert!(cache.get(&device("d")).is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().load_failures, 2);
    }

    #[test]
    fn test_concurrent_waiters_share_failure() {
        let resolver = Arc::new(CountingResolver {
            delay: Duration::from_millis(100),
            fail: true,
            ..CountingResolver::default()
        });
        let (cache, _) = cache_with(&resolver, 0);
        let cache = Arc::new(cache);
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&device("bad"))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_err());
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    struct PanicOnce {
        calls: AtomicUsize,
    }

    impl ResolutionStrategy for PanicOnce {
        fn resolve(
            &self,
            descriptor: &EntityDescriptor,
            _create_if_missing: bool,
        ) -> Result<EntityHandle, ResolutionError> {
            assert!(self.calls.fetch_add(1, Ordering::SeqCst) > 0, "first load panics");
            Ok(EntityHandle::found(descriptor.kind, EntityId::new()))
        }
    }

    #[test]
    fn test_panicking_resolver_does_not_poison_key() {
        let cache = Arc::new(IdentityCache::new(
            Arc::new(PanicOnce {
                calls: AtomicUsize::new(0),
            }),
            CacheSettings::default(),
        ));

        let worker = Arc::clone(&cache);
        assert!(thread::spawn(move || worker.get(&device("p"))).join().is_err());
        assert!(cache.get(&device("p")).unwrap().id.is_some());
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let resolver = Arc::new(CountingResolver::default());
        let (cache, _) = cache_with(&resolver, 0);

        cache.get(&device("a")).unwrap();
        cache.get(&device("b")).unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate(&device("a"));
        assert!(cache.peek(&device("a")).is_none());
        assert!(cache.peek(&device("b")).is_some());
        cache.get(&device("a")).unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let resolver = Arc::new(CountingResolver::default());
        let (cache, clock) = cache_with(&resolver, 5);

        cache.get(&device("old")).unwrap();
        clock.advance(Duration::from_secs(3));
        cache.get(&device("new")).unwrap();
        clock.advance(Duration::from_secs(3));

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.peek(&device("old")).is_none());
        assert!(cache.peek(&device("new")).is_some());
    }
}
