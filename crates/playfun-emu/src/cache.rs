//! Speculative state cache.
//!
//! Maps `(input byte, pre-state)` to the post-state one emulator step
//! produces, so re-exploring the same input from the same state costs a
//! lookup instead of a frame of emulation. Entries carry a monotonic
//! sequence number refreshed on every hit; when the table overshoots
//! `limit + slop` entries, everything below the sequence threshold that
//! keeps the `limit` newest is evicted in one pass.

use cityhasher::CityHasher;
use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use tracing::{debug, info};

#[derive(PartialEq, Eq)]
struct CacheKey {
    input: u8,
    state: Box<[u8]>,
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        // The input byte acts as the seed of the CityHash64 over the state.
        hasher.write_u8(self.input);
        hasher.write(&self.state);
    }
}

struct CacheEntry {
    seq: u64,
    post: Box<[u8]>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub count: u64,
    pub limit: u64,
    pub next_seq: u64,
    pub hits: u64,
    pub misses: u64,
}

pub struct StateCache {
    table: HashMap<CacheKey, CacheEntry, BuildHasherDefault<CityHasher>>,
    limit: u64,
    slop: u64,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    /// An empty cache that evicts aggressively until [`reset`](Self::reset)
    /// sets a real limit.
    pub fn new() -> Self {
        Self {
            table: HashMap::default(),
            limit: 0,
            slop: 10_000,
            next_seq: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Clears all entries and counters and installs a new eviction policy:
    /// GC runs once more than `limit + slop` entries are resident and keeps
    /// the `limit` most recently touched.
    pub fn reset(&mut self, limit: u64, slop: u64) {
        self.table.clear();
        self.limit = limit;
        self.slop = slop;
        self.next_seq = 0;
        self.hits = 0;
        self.misses = 0;
    }

    /// Records that stepping `input` from `pre` yields `post`.
    pub fn remember(&mut self, input: u8, pre: Vec<u8>, post: Vec<u8>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.table.insert(
            CacheKey {
                input,
                state: pre.into_boxed_slice(),
            },
            CacheEntry {
                seq,
                post: post.into_boxed_slice(),
            },
        );
        self.maybe_gc();
    }

    /// Looks up the post-state for `(input, pre)`. A hit refreshes the
    /// entry's sequence number; a miss bumps the miss counter.
    pub fn get_known(&mut self, input: u8, pre: &[u8]) -> Option<&[u8]> {
        let key = CacheKey {
            input,
            state: pre.into(),
        };
        match self.table.get_mut(&key) {
            Some(entry) => {
                self.hits += 1;
                entry.seq = self.next_seq;
                self.next_seq += 1;
                Some(&entry.post)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn maybe_gc(&mut self) {
        let count = self.table.len() as u64;
        if count <= self.limit + self.slop {
            return;
        }

        let mut seqs: Vec<u64> = self.table.values().map(|entry| entry.seq).collect();
        let num_remove = (count - self.limit) as usize;
        // Sequence numbers are distinct, so the element at `num_remove` in
        // sorted order is the smallest sequence that survives.
        let (_, &mut threshold, _) = seqs.select_nth_unstable(num_remove);
        self.table.retain(|_, entry| entry.seq >= threshold);
        debug!(
            evicted = count as usize - self.table.len(),
            retained = self.table.len(),
            "cache GC"
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.table.len() as u64,
            limit: self.limit,
            next_seq: self.next_seq,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Dumps occupancy and hit counters to the log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            "cache: {}/{}, seq {}, {} hits, {} misses",
            stats.count, stats.limit, stats.next_seq, stats.hits, stats.misses
        );
    }
}
