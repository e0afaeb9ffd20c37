//! Engine implementations.
//!
//! - `vsmap`: ordered map, supports every operation
//! - `vcmap`: unordered map, range operations are not supported
//! - `blackhole`: accepts writes and stores nothing

use crate::config::MemConfig;
use crate::error::{MemkvError, MemkvResult};
use parking_lot::RwLock;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

/// A shared, immutable byte string stored by an engine.
pub type Bytes = Arc<[u8]>;

/// A snapshot of entries taken for one scan.
pub type Entries = Vec<(Bytes, Bytes)>;

thread_local! {
    static LIVE_DATABASES: Cell<isize> = const { Cell::new(0) };
}

/// Returns the number of engine instances opened on this thread that have
/// not been closed on this thread.
pub fn live_databases() -> isize {
    LIVE_DATABASES.with(Cell::get)
}

/// Key selection for counts and scans. All bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRange<'a> {
    /// Every key.
    All,
    /// Keys strictly greater than the bound.
    Above(&'a [u8]),
    /// Keys strictly less than the bound.
    Below(&'a [u8]),
    /// Keys strictly between the bounds.
    Between(&'a [u8], &'a [u8]),
}

impl KeyRange<'_> {
    /// Returns true if the key falls into this range.
    pub fn contains(&self, key: &[u8]) -> bool {
        match *self {
            KeyRange::All => true,
            KeyRange::Above(lo) => key > lo,
            KeyRange::Below(hi) => key < hi,
            KeyRange::Between(lo, hi) => key > lo && key < hi,
        }
    }

    /// Returns true if no key can fall into this range.
    fn is_empty(&self) -> bool {
        matches!(*self, KeyRange::Between(lo, hi) if lo >= hi)
    }

    fn bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        match *self {
            KeyRange::All => (Bound::Unbounded, Bound::Unbounded),
            KeyRange::Above(lo) => (Bound::Excluded(lo), Bound::Unbounded),
            KeyRange::Below(hi) => (Bound::Unbounded, Bound::Excluded(hi)),
            KeyRange::Between(lo, hi) => (Bound::Excluded(lo), Bound::Excluded(hi)),
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            KeyRange::All => "get_all",
            KeyRange::Above(_) => "get_above",
            KeyRange::Below(_) => "get_below",
            KeyRange::Between(..) => "get_between",
        }
    }
}

/// Storage engine behind an open database.
///
/// Engines are internally synchronized; every method takes `&self`.
pub trait Engine: Send + Sync {
    /// Returns the engine name.
    fn name(&self) -> &'static str;

    /// Inserts or replaces an entry.
    fn put(&self, key: &[u8], value: &[u8]) -> MemkvResult<()>;

    /// Returns the value stored under `key`.
    fn get(&self, key: &[u8]) -> MemkvResult<Bytes>;

    /// Returns `Ok(())` if `key` exists, `NotFound` otherwise.
    fn exists(&self, key: &[u8]) -> MemkvResult<()>;

    /// Removes an entry, `NotFound` if absent.
    fn remove(&self, key: &[u8]) -> MemkvResult<()>;

    /// Counts entries in `range`.
    fn count(&self, range: KeyRange<'_>) -> MemkvResult<usize>;

    /// Takes a snapshot of the entries in `range`, in the engine's order.
    ///
    /// The snapshot lets callbacks re-enter the engine without deadlocking.
    fn snapshot(&self, range: KeyRange<'_>) -> MemkvResult<Entries>;
}

/// Tracks used bytes against an optional capacity.
#[derive(Debug)]
struct Capacity {
    limit: Option<u64>,
    used: u64,
}

impl Capacity {
    fn new(limit: Option<u64>) -> Self {
        Self { limit, used: 0 }
    }

    fn replace(&mut self, old: Option<u64>, new: u64) -> MemkvResult<()> {
        let freed = old.unwrap_or(0);
        let next = self.used - freed + new;
        if let Some(limit) = self.limit {
            if next > limit {
                return Err(MemkvError::OutOfSpace {
                    needed: new,
                    available: limit.saturating_sub(self.used - freed),
                });
            }
        }
        self.used = next;
        Ok(())
    }

    fn release(&mut self, bytes: u64) {
        self.used -= bytes;
    }
}

fn entry_size(key: &[u8], value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64
}

#[derive(Debug)]
struct SortedInner {
    map: BTreeMap<Bytes, Bytes>,
    capacity: Capacity,
}

/// Ordered engine (`vsmap`).
#[derive(Debug)]
pub struct SortedEngine {
    inner: RwLock<SortedInner>,
}

impl SortedEngine {
    /// Creates an empty engine with an optional byte capacity.
    pub fn new(capacity: Option<u64>) -> Self {
        Self {
            inner: RwLock::new(SortedInner {
                map: BTreeMap::new(),
                capacity: Capacity::new(capacity),
            }),
        }
    }
}

impl Engine for SortedEngine {
    fn name(&self) -> &'static str {
        "vsmap"
    }

    fn put(&self, key: &[u8], value: &[u8]) -> MemkvResult<()> {
        let mut inner = self.inner.write();
        let old = inner.map.get(key).map(|v| entry_size(key, v));
        inner.capacity.replace(old, entry_size(key, value))?;
        inner.map.insert(Bytes::from(key), Bytes::from(value));
        Ok(())
    }

    fn get(&self, key: &[u8]) -> MemkvResult<Bytes> {
        self.inner
            .read()
            .map
            .get(key)
            .cloned()
            .ok_or(MemkvError::NotFound)
    }

    fn exists(&self, key: &[u8]) -> MemkvResult<()> {
        if self.inner.read().map.contains_key(key) {
            Ok(())
        } else {
            Err(MemkvError::NotFound)
        }
    }

    fn remove(&self, key: &[u8]) -> MemkvResult<()> {
        let mut inner = self.inner.write();
        let value = inner.map.remove(key).ok_or(MemkvError::NotFound)?;
        inner.capacity.release(entry_size(key, &value));
        Ok(())
    }

    fn count(&self, range: KeyRange<'_>) -> MemkvResult<usize> {
        if range.is_empty() {
            return Ok(0);
        }
        let inner = self.inner.read();
        Ok(inner.map.range::<[u8], _>(range.bounds()).count())
    }

    fn snapshot(&self, range: KeyRange<'_>) -> MemkvResult<Entries> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.inner.read();
        Ok(inner
            .map
            .range::<[u8], _>(range.bounds())
            .map(|(k, v)| (Arc::clone(k), Arc::clone(v)))
            .collect())
    }
}

#[derive(Debug)]
struct HashInner {
    map: HashMap<Bytes, Bytes>,
    capacity: Capacity,
}

/// Unordered engine (`vcmap`).
#[derive(Debug)]
pub struct HashEngine {
    inner: RwLock<HashInner>,
}

impl HashEngine {
    /// Creates an empty engine with an optional byte capacity.
    pub fn new(capacity: Option<u64>) -> Self {
        Self {
            inner: RwLock::new(HashInner {
                map: HashMap::new(),
                capacity: Capacity::new(capacity),
            }),
        }
    }

    fn unsupported(&self, range: KeyRange<'_>) -> MemkvResult<()> {
        match range {
            KeyRange::All => Ok(()),
            other => Err(MemkvError::NotSupported {
                engine: "vcmap",
                operation: other.operation(),
            }),
        }
    }
}

impl Engine for HashEngine {
    fn name(&self) -> &'static str {
        "vcmap"
    }

    fn put(&self, key: &[u8], value: &[u8]) -> MemkvResult<()> {
        let mut inner = self.inner.write();
        let old = inner.map.get(key).map(|v| entry_size(key, v));
        inner.capacity.replace(old, entry_size(key, value))?;
        inner.map.insert(Bytes::from(key), Bytes::from(value));
        Ok(())
    }

    fn get(&self, key: &[u8]) -> MemkvResult<Bytes> {
        self.inner
            .read()
            .map
            .get(key)
            .cloned()
            .ok_or(MemkvError::NotFound)
    }

    fn exists(&self, key: &[u8]) -> MemkvResult<()> {
        if self.inner.read().map.contains_key(key) {
            Ok(())
        } else {
            Err(MemkvError::NotFound)
        }
    }

    fn remove(&self, key: &[u8]) -> MemkvResult<()> {
        let mut inner = self.inner.write();
        let value = inner.map.remove(key).ok_or(MemkvError::NotFound)?;
        inner.capacity.release(entry_size(key, &value));
        Ok(())
    }

    fn count(&self, range: KeyRange<'_>) -> MemkvResult<usize> {
        self.unsupported(range)?;
        Ok(self.inner.read().map.len())
    }

    fn snapshot(&self, range: KeyRange<'_>) -> MemkvResult<Entries> {
        self.unsupported(range)?;
        Ok(self
            .inner
            .read()
            .map
            .iter()
            .map(|(k, v)| (Arc::clone(k), Arc::clone(v)))
            .collect())
    }
}

/// Engine that drops every write (`blackhole`).
#[derive(Debug, Default)]
pub struct BlackholeEngine;

impl Engine for BlackholeEngine {
    fn name(&self) -> &'static str {
        "blackhole"
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> MemkvResult<()> {
        Ok(())
    }

    fn get(&self, _key: &[u8]) -> MemkvResult<Bytes> {
        Err(MemkvError::NotFound)
    }

    fn exists(&self, _key: &[u8]) -> MemkvResult<()> {
        Err(MemkvError::NotFound)
    }

    fn remove(&self, _key: &[u8]) -> MemkvResult<()> {
        Err(MemkvError::NotFound)
    }

    fn count(&self, _range: KeyRange<'_>) -> MemkvResult<usize> {
        Ok(0)
    }

    fn snapshot(&self, _range: KeyRange<'_>) -> MemkvResult<Entries> {
        Ok(Vec::new())
    }
}

/// An open engine instance, as handed out through the C ABI.
pub struct MemDb {
    engine: Box<dyn Engine>,
}

impl MemDb {
    /// Opens the engine called `name` with `config`.
    ///
    /// Recognized items: `path` (string), `size` (unsigned capacity in
    /// bytes), `force_create` (bool).
    pub fn open(name: &str, config: &MemConfig) -> MemkvResult<Self> {
        // Validate the common items even for engines that ignore them.
        let path = config.get_string("path")?;
        let capacity = config.get_uint("size")?;
        config.get_bool("force_create")?;

        let engine: Box<dyn Engine> = match name {
            "vsmap" => Box::new(SortedEngine::new(capacity)),
            "vcmap" => Box::new(HashEngine::new(capacity)),
            "blackhole" => Box::new(BlackholeEngine),
            other => return Err(MemkvError::WrongEngineName(other.to_owned())),
        };

        tracing::debug!(engine = name, path, capacity, "opened in-process engine");
        LIVE_DATABASES.with(|c| c.set(c.get() + 1));
        Ok(Self { engine })
    }

    /// Returns the engine.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }
}

impl Drop for MemDb {
    fn drop(&mut self) {
        tracing::debug!(engine = self.engine.name(), "closed in-process engine");
        LIVE_DATABASES.with(|c| c.set(c.get() - 1));
    }
}
