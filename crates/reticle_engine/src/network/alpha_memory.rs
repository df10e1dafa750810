//! The shared alpha memory table.
//!
//! All patterns share one table keyed by `(pattern, slot)` where the slot is
//! the pattern identity offset by the entry's hash, reduced modulo the table
//! size. A pattern's buckets are additionally chained together so its whole
//! memory can be walked.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;

use super::arena::{Arena, ArenaKey, arena_key};
use super::memory::{Chain, Matches, chain_from};
use super::partial::MatchId;
use super::pattern::PatternId;

/// Default number of alpha memory table slots.
pub const ALPHA_MEMORY_HASH_SIZE: usize = 63559;

arena_key!(
    /// Handle to one alpha memory bucket.
    AlphaBucketId,
    "ab"
);

#[derive(Debug)]
struct AlphaBucket {
    chain: Chain,
    key: (PatternId, u64),
    prev: Option<AlphaBucketId>,
    next: Option<AlphaBucketId>,
}

/// First and last bucket of one pattern's memory.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BucketList {
    first: Option<AlphaBucketId>,
    last: Option<AlphaBucketId>,
}

impl BucketList {
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// The alpha memory table.
#[derive(Debug)]
pub(crate) struct AlphaMemory {
    buckets: Arena<AlphaBucketId, AlphaBucket>,
    index: HashMap<(PatternId, u64), AlphaBucketId>,
    table_size: u64,
    count: usize,
}

impl AlphaMemory {
    pub(crate) fn new(table_size: usize) -> Self {
        Self {
            buckets: Arena::new(),
            index: HashMap::new(),
            table_size: table_size.max(1) as u64,
            count: 0,
        }
    }

    fn slot(&self, pattern: PatternId, hash: u64) -> u64 {
        u64::from(pattern.index()).wrapping_add(hash) % self.table_size
    }

    /// Total number of alpha matches stored.
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// First entry of the bucket an entry with this hash lands in.
    pub(crate) fn bucket_head(&self, pattern: PatternId, hash: u64) -> Option<MatchId> {
        self.index
            .get(&(pattern, self.slot(pattern, hash)))
            .and_then(|b| self.buckets[*b].chain.head)
    }

    /// Appends an alpha match to its bucket.
    pub(crate) fn insert(
        &mut self,
        matches: &mut Matches,
        list: &mut BucketList,
        pattern: PatternId,
        id: MatchId,
    ) {
        let key = (pattern, self.slot(pattern, matches[id].hash_value));
        let bucket = match self.index.get(&key) {
            Some(b) => *b,
            None => {
                let b = self.buckets.insert(AlphaBucket {
                    chain: Chain::default(),
                    key,
                    prev: list.last,
                    next: None,
                });
                match list.last {
                    Some(last) => self.buckets[last].next = Some(b),
                    None => list.first = Some(b),
                }
                list.last = Some(b);
                self.index.insert(key, b);
                b
            }
        };
        self.buckets[bucket].chain.push_back(matches, id);
        self.count += 1;
    }

    /// Unlinks an alpha match, dropping its bucket once empty.
    pub(crate) fn remove(
        &mut self,
        matches: &mut Matches,
        list: &mut BucketList,
        pattern: PatternId,
        id: MatchId,
    ) {
        let key = (pattern, self.slot(pattern, matches[id].hash_value));
        let Some(&bucket) = self.index.get(&key) else {
            return;
        };
        self.buckets[bucket].chain.unlink(matches, id);
        self.count = self.count.saturating_sub(1);
        if self.buckets[bucket].chain.is_empty() {
            let (prev, next) = (self.buckets[bucket].prev, self.buckets[bucket].next);
            match prev {
                Some(p) => self.buckets[p].next = next,
                None => list.first = next,
            }
            match next {
                Some(n) => self.buckets[n].prev = prev,
                None => list.last = prev,
            }
            if let Some(removed) = self.buckets.remove(bucket) {
                self.index.remove(&removed.key);
            }
        }
    }

    /// Every entry of a pattern, bucket by bucket in creation order.
    pub(crate) fn entries(&self, matches: &Matches, list: &BucketList) -> Vec<MatchId> {
        let mut out = Vec::new();
        let mut cursor = list.first;
        while let Some(b) = cursor {
            out.extend(chain_from(matches, self.buckets[b].chain.head));
            cursor = self.buckets[b].next;
        }
        out
    }
}
