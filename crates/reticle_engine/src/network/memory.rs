//! Hashed beta memories and the intrusive chains they are built from.
//!
//! Every memory entry is linked through `prev_in_memory`/`next_in_memory`
//! of its [`PartialMatch`]. A bucket keeps both ends of its chain so that
//! right memories can append while left memories push at the head.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use super::arena::Arena;
use super::partial::{MatchId, PartialMatch};

/// Bucket count of a freshly hashed beta memory.
pub const INITIAL_BETA_HASH_SIZE: usize = 17;

/// Factor applied when a memory grows, and the load that triggers it.
pub const BETA_GROWTH_FACTOR: usize = 11;

pub(crate) type Matches = Arena<MatchId, PartialMatch>;

// =============================================================================
// Chains
// =============================================================================

/// Head and tail of one doubly linked bucket chain.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Chain {
    pub(crate) head: Option<MatchId>,
    pub(crate) tail: Option<MatchId>,
}

impl Chain {
    pub(crate) fn push_front(&mut self, matches: &mut Matches, id: MatchId) {
        matches[id].prev_in_memory = None;
        matches[id].next_in_memory = self.head;
        match self.head {
            Some(old) => matches[old].prev_in_memory = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    pub(crate) fn push_back(&mut self, matches: &mut Matches, id: MatchId) {
        matches[id].next_in_memory = None;
        matches[id].prev_in_memory = self.tail;
        match self.tail {
            Some(old) => matches[old].next_in_memory = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    pub(crate) fn unlink(&mut self, matches: &mut Matches, id: MatchId) {
        let (prev, next) = {
            let pm = &matches[id];
            (pm.prev_in_memory, pm.next_in_memory)
        };
        match prev {
            Some(p) => matches[p].next_in_memory = next,
            None => self.head = next,
        }
        match next {
            Some(n) => matches[n].prev_in_memory = prev,
            None => self.tail = prev,
        }
        let pm = &mut matches[id];
        pm.prev_in_memory = None;
        pm.next_in_memory = None;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Collects a chain's members from `start` onward.
pub(crate) fn chain_from(matches: &Matches, start: Option<MatchId>) -> Vec<MatchId> {
    let mut out = Vec::new();
    let mut cursor = start;
    while let Some(id) = cursor {
        out.push(id);
        cursor = matches[id].next_in_memory;
    }
    out
}

// =============================================================================
// Beta Memory
// =============================================================================

/// A hashed memory of partial matches on one side of a join.
#[derive(Clone, Debug)]
pub(crate) struct BetaMemory {
    buckets: Vec<Chain>,
    initial_size: usize,
    count: usize,
}

impl BetaMemory {
    /// Creates a memory. Unhashed memories use a single bucket and never grow.
    pub(crate) fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            buckets: vec![Chain::default(); size],
            initial_size: size,
            count: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn slot(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// First entry of the bucket a hash value selects.
    pub(crate) fn bucket_head(&self, hash: u64) -> Option<MatchId> {
        self.buckets[self.slot(hash)].head
    }

    /// Every entry, bucket by bucket.
    pub(crate) fn entries(&self, matches: &Matches) -> Vec<MatchId> {
        self.buckets
            .iter()
            .flat_map(|c| chain_from(matches, c.head))
            .collect()
    }

    /// Links an entry at the head (left memories) or tail (right memories)
    /// of its bucket, growing the table when the load factor is exceeded.
    pub(crate) fn insert(&mut self, matches: &mut Matches, id: MatchId, at_tail: bool) {
        let slot = self.slot(matches[id].hash_value);
        if at_tail {
            self.buckets[slot].push_back(matches, id);
        } else {
            self.buckets[slot].push_front(matches, id);
        }
        self.count += 1;
        let size = self.buckets.len();
        if size > 1 && self.count > size * BETA_GROWTH_FACTOR {
            self.resize(matches, size * BETA_GROWTH_FACTOR);
        }
    }

    /// Unlinks an entry. An emptied memory returns to its initial size.
    pub(crate) fn remove(&mut self, matches: &mut Matches, id: MatchId) {
        let slot = self.slot(matches[id].hash_value);
        self.buckets[slot].unlink(matches, id);
        self.count = self.count.saturating_sub(1);
        if self.count == 0 && self.buckets.len() != self.initial_size {
            self.buckets = vec![Chain::default(); self.initial_size];
        }
    }

    /// Rehashes into `new_size` buckets, preserving order within each bucket.
    fn resize(&mut self, matches: &mut Matches, new_size: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![Chain::default(); new_size]);
        for chain in old {
            let mut cursor = chain.head;
            while let Some(id) = cursor {
                cursor = matches[id].next_in_memory;
                let slot = self.slot(matches[id].hash_value);
                self.buckets[slot].push_back(matches, id);
            }
        }
        tracing::trace!(new_size, count = self.count, "beta memory resized");
    }
}
