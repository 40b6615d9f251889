use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::fingerprint::Fingerprint;
use crate::foundation::core::FrameIndex;
use crate::foundation::diagnostic::Diagnostic;
use crate::foundation::frame::Frame;

const SHARDS: usize = 16;

/// Identity of a processed frame: source content, frame index and the configuration that
/// produced it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct CacheKey {
    /// Fingerprint of the source the frame was decoded from.
    pub source: Fingerprint,
    /// Source frame index.
    pub frame: FrameIndex,
    /// Fingerprint of the effect stack.
    pub stack: Fingerprint,
    /// Fingerprint of the stabilization parameters (or of "disabled").
    pub stabilization: Fingerprint,
}

/// Counters describing cache behavior since creation (or the last [`FrameCache::clear`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    /// Lookups that returned a frame.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Successful `put` calls.
    pub insertions: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Entries refused because they exceed the whole budget.
    pub rejected: u64,
    /// Bytes currently resident.
    pub resident_bytes: usize,
    /// Entries currently resident.
    pub entries: usize,
}

struct Entry {
    frame: Frame,
    diagnostics: Vec<Diagnostic>,
    size_bytes: usize,
    last_access: AtomicU64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    rejected: AtomicU64,
}

type Shard = RwLock<HashMap<CacheKey, Arc<Entry>>>;

/// Byte-budgeted, thread-safe memo of processed frames with strict LRU eviction.
///
/// Lookups only take a shard read lock and stamp the entry with a global access sequence number.
/// Insertion, eviction and size accounting are serialized behind one mutex, so resident bytes
/// never exceed the budget, even transiently.
pub struct FrameCache {
    budget_bytes: usize,
    shards: Box<[Shard]>,
    /// Resident byte count; the lock also serializes every mutation.
    ledger: Mutex<usize>,
    clock: AtomicU64,
    counters: Counters,
}

impl FrameCache {
    /// Empty cache that holds at most `budget_bytes` of pixel data.
    pub fn new(budget_bytes: usize) -> Self {
        let shards = (0..SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            budget_bytes,
            shards,
            ledger: Mutex::new(0),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Configured budget in bytes.
    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    fn shard(&self, key: &CacheKey) -> &Shard {
        let h = key.frame.0
            ^ key.source.lo.rotate_left(29)
            ^ key.stack.lo
            ^ key.stabilization.lo.rotate_left(17);
        &self.shards[(h % SHARDS as u64) as usize]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, usize> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached frame for `key`, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Frame> {
        self.get_with_diagnostics(key).map(|(frame, _)| frame)
    }

    /// Cached frame for `key` together with the diagnostics recorded when it was produced.
    pub fn get_with_diagnostics(&self, key: &CacheKey) -> Option<(Frame, Vec<Diagnostic>)> {
        let shard = self.shard(key).read().unwrap_or_else(|e| e.into_inner());
        match shard.get(key) {
            // An entry stored under the wrong index is never served.
            Some(entry) if entry.frame.index() == key.frame => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some((entry.frame.clone(), entry.diagnostics.clone()))
            }
            _ => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace the frame for `key`, evicting least recently used entries until it fits.
    ///
    /// Returns `false` (and caches nothing) when the frame alone exceeds the budget.
    pub fn put(&self, key: CacheKey, frame: Frame) -> bool {
        self.put_with_diagnostics(key, frame, Vec::new())
    }

    /// [`FrameCache::put`] that also stores the diagnostics produced with the frame. Only pixel
    /// bytes count against the budget.
    pub fn put_with_diagnostics(
        &self,
        key: CacheKey,
        frame: Frame,
        diagnostics: Vec<Diagnostic>,
    ) -> bool {
        let size_bytes = frame.byte_len();
        if size_bytes > self.budget_bytes {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                frame = key.frame.0,
                size_bytes,
                budget = self.budget_bytes,
                "frame larger than cache budget, not cached"
            );
            return false;
        }

        let mut resident = self.ledger();
        let old = self
            .shard(&key)
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        if let Some(old) = old {
            *resident -= old.size_bytes;
        }
        while *resident + size_bytes > self.budget_bytes {
            let Some(freed) = self.evict_lru() else {
                break;
            };
            *resident -= freed;
        }

        let entry = Arc::new(Entry {
            frame,
            diagnostics,
            size_bytes,
            last_access: AtomicU64::new(self.tick()),
        });
        self.shard(&key)
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
        *resident += size_bytes;
        self.counters.insertions.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove the least recently used entry, returning its size. Caller holds the ledger.
    fn evict_lru(&self) -> Option<usize> {
        let mut victim: Option<(usize, CacheKey, u64)> = None;
        for (si, shard) in self.shards.iter().enumerate() {
            let map = shard.read().unwrap_or_else(|e| e.into_inner());
            for (k, e) in map.iter() {
                let seq = e.last_access.load(Ordering::Relaxed);
                if victim.is_none_or(|(_, _, best)| seq < best) {
                    victim = Some((si, *k, seq));
                }
            }
        }
        let (si, key, _) = victim?;
        let removed = self.shards[si]
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key)?;
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        Some(removed.size_bytes)
    }

    /// Remove every entry whose key matches `pred`; returns how many were removed.
    pub fn invalidate(&self, pred: impl Fn(&CacheKey) -> bool) -> usize {
        let mut resident = self.ledger();
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut map = shard.write().unwrap_or_else(|e| e.into_inner());
            map.retain(|k, e| {
                if pred(k) {
                    *resident -= e.size_bytes;
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Drop every entry and reset counters.
    pub fn clear(&self) {
        let mut resident = self.ledger();
        for shard in self.shards.iter() {
            shard.write().unwrap_or_else(|e| e.into_inner()).clear();
        }
        *resident = 0;
        for c in [
            &self.counters.hits,
            &self.counters.misses,
            &self.counters.insertions,
            &self.counters.evictions,
            &self.counters.rejected,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Bytes currently resident.
    pub fn resident_bytes(&self) -> usize {
        *self.ledger()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            resident_bytes: self.resident_bytes(),
            entries: self.len(),
        }
    }
}

impl std::fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCache")
            .field("budget_bytes", &self.budget_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
