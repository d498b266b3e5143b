//! Memoization of raw fetches

use crate::error::Result;
use crate::source::{DataSource, DateRange};
use crate::table::RawTable;
use chrono::{Local, NaiveDate};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Identity of one fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub instrument: String,
    pub range: DateRange,
    /// Calendar day the request was made on
    pub as_of: NaiveDate,
}

impl CacheKey {
    pub fn new(instrument: impl Into<String>, range: DateRange, as_of: NaiveDate) -> Self {
        Self {
            instrument: instrument.into(),
            range,
            as_of,
        }
    }
}

#[derive(Debug)]
struct Entry {
    table: RawTable,
    fetched_at: Instant,
}

type Slot = Arc<Mutex<Option<Entry>>>;

/// Keyed cache with optional time-to-live.
///
/// Each key owns a slot lock held for the duration of its fetch, so a key is
/// fetched at most once while its entry is live. Failed fetches are not
/// stored.
#[derive(Debug, Default)]
pub struct FetchCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    ttl: Option<Duration>,
}

impl FetchCache {
    /// Create a cache; `None` keeps entries for the life of the cache
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Return the cached table for `key`, calling `fetch` if absent or expired
    pub fn get_or_fetch<F>(&self, key: CacheKey, fetch: F) -> Result<RawTable>
    where
        F: FnOnce() -> Result<RawTable>,
    {
        self.purge_expired();

        let slot = Arc::clone(lock(&self.slots).entry(key.clone()).or_default());
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref().filter(|e| !self.is_expired(e)) {
            debug!("Cache hit for {} as of {}", key.instrument, key.as_of);
            return Ok(cached.table.clone());
        }

        debug!("Cache miss for {} as of {}", key.instrument, key.as_of);
        match fetch() {
            Ok(table) => {
                *entry = Some(Entry {
                    table: table.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(table)
            }
            Err(e) => {
                *entry = None;
                self.release_if_idle(&key, &slot);
                Err(e)
            }
        }
    }

    /// Drop one key; returns whether it held an entry.
    ///
    /// Waits for an in-flight fetch of the key to finish first.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let Some(slot) = lock(&self.slots).get(key).cloned() else {
            return false;
        };
        let mut entry = lock(&slot);
        let had_entry = entry.take().is_some();
        self.release_if_idle(key, &slot);
        had_entry
    }

    /// Drop every key, waiting for in-flight fetches like [`invalidate`](Self::invalidate)
    pub fn clear(&self) {
        let keys: Vec<CacheKey> = lock(&self.slots).keys().cloned().collect();
        for key in &keys {
            self.invalidate(key);
        }
    }

    /// Remove `slot` from the map unless another caller is waiting on it.
    ///
    /// Slot handles are only cloned under the map lock, so the count seen
    /// here is exact: one for the map, one for `slot`.
    fn release_if_idle(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = lock(&self.slots);
        let idle = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if idle {
            slots.remove(key);
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|e| !self.is_expired(e)),
                Err(_) => false,
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl.is_some_and(|ttl| entry.fetched_at.elapsed() >= ttl)
    }

    /// Remove expired entries; slots busy with a fetch are left alone
    fn purge_expired(&self) {
        if self.ttl.is_none() {
            return;
        }
        lock(&self.slots).retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|e| !self.is_expired(e)),
            Err(_) => true,
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`DataSource`] with a [`FetchCache`] in front of it
#[derive(Debug)]
pub struct CachedDataSource<S> {
    inner: S,
    cache: FetchCache,
}

impl<S: DataSource> CachedDataSource<S> {
    pub fn new(inner: S, cache: FetchCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fetch through the cache with an explicit as-of day
    pub fn fetch_as_of(
        &self,
        instrument: &str,
        range: &DateRange,
        as_of: NaiveDate,
    ) -> Result<RawTable> {
        let key = CacheKey::new(instrument, *range, as_of);
        self.cache
            .get_or_fetch(key, || self.inner.fetch(instrument, range))
    }
}

impl<S: DataSource> DataSource for CachedDataSource<S> {
    fn fetch(&self, instrument: &str, range: &DateRange) -> Result<RawTable> {
        self.fetch_as_of(instrument, range, Local::now().date_naive())
    }
}
