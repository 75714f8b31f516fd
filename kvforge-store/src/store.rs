//! The unified store: point values and sorted sets sharing one LRU order
//! and one capacity bound.

use crate::lru::{EntryKind, LruId, LruList};
use crate::sorted_set::SortedSet;
use kvforge_core::Token;
use std::collections::HashMap;

struct ValueSlot {
    data: Token,
    lru_id: LruId,
}

struct SortedSetSlot {
    set: SortedSet,
    lru_id: LruId,
}

/// Combines a point-value map, a sorted-set map, and one LRU arena under a
/// single capacity `C`. Invariant: `values.len() + sorted_sets.len() <=
/// capacity` after every completed operation. The two maps are
/// independent — a value entry and a sorted set may share a key.
pub struct UnifiedStore {
    capacity: usize,
    values: HashMap<Token, ValueSlot>,
    sorted_sets: HashMap<Token, SortedSetSlot>,
    lru: LruList,
}

impl UnifiedStore {
    /// # Panics
    ///
    /// Never — callers are expected to validate `capacity >= 1` at
    /// configuration time; a zero-capacity store simply evicts everything
    /// it is given.
    pub fn new(capacity: usize) -> Self {
        UnifiedStore {
            capacity,
            values: HashMap::new(),
            sorted_sets: HashMap::new(),
            lru: LruList::new(),
        }
    }

    /// Total number of live entries across both maps, bounded by `capacity`.
    pub fn live_entry_count(&self) -> usize {
        self.values.len() + self.sorted_sets.len()
    }

    fn evict_if_full(&mut self) {
        if self.live_entry_count() < self.capacity {
            return;
        }
        if let Some((_, key, kind)) = self.lru.pop_tail() {
            match kind {
                EntryKind::Value => {
                    self.values.remove(&key);
                }
                EntryKind::SortedSet => {
                    self.sorted_sets.remove(&key);
                }
            }
            log::debug!("evicted key (lru capacity reached)");
        }
    }

    pub fn set(&mut self, key: Token, value: Token) {
        if let Some(slot) = self.values.get_mut(&key) {
            slot.data = value;
            self.lru.touch(slot.lru_id);
            log::debug!("SET updated existing key");
            return;
        }
        self.evict_if_full();
        let lru_id = self.lru.insert_front(key.clone(), EntryKind::Value);
        self.values.insert(key, ValueSlot { data: value, lru_id });
        log::debug!("SET inserted new key");
    }

    pub fn get(&mut self, key: &Token) -> Option<Token> {
        let slot = self.values.get(key)?;
        let lru_id = slot.lru_id;
        let data = slot.data.clone();
        self.lru.touch(lru_id);
        Some(data)
    }

    pub fn delete(&mut self, key: &Token) -> bool {
        match self.values.remove(key) {
            Some(slot) => {
                self.lru.remove(slot.lru_id);
                log::debug!("DEL removed key");
                true
            }
            None => false,
        }
    }

    pub fn zadd(&mut self, key: Token, score: f64, member: &str) {
        if let Some(slot) = self.sorted_sets.get_mut(&key) {
            slot.set.zadd(score, member);
            self.lru.touch(slot.lru_id);
            log::debug!("ZADD updated existing sorted set");
            return;
        }
        self.evict_if_full();
        let lru_id = self.lru.insert_front(key.clone(), EntryKind::SortedSet);
        let mut set = SortedSet::new();
        set.zadd(score, member);
        self.sorted_sets.insert(key, SortedSetSlot { set, lru_id });
        log::debug!("ZADD created new sorted set");
    }

    pub fn zrange(&mut self, key: &Token, lo: f64, hi: f64) -> Vec<(f64, String)> {
        let Some(slot) = self.sorted_sets.get(key) else {
            return Vec::new();
        };
        let lru_id = slot.lru_id;
        let result = slot.set.zrange(lo, hi);
        self.lru.touch(lru_id);
        result
    }

    pub fn zrank(&mut self, key: &Token, member: &str) -> Option<usize> {
        let slot = self.sorted_sets.get(key)?;
        let lru_id = slot.lru_id;
        let rank = slot.set.zrank(member);
        self.lru.touch(lru_id);
        rank
    }

    /// Removes `member` from the sorted set at `key`. The sorted set is
    /// unlinked from the LRU (and dropped entirely) only when the removal
    /// empties it; otherwise the access still counts as a touch, the same
    /// way every other read/write in this store does.
    pub fn zrem(&mut self, key: &Token, member: &str) -> bool {
        let Some(slot) = self.sorted_sets.get_mut(key) else {
            return false;
        };
        let removed = slot.set.zrem(member);
        if !removed {
            return false;
        }
        if slot.set.is_empty() {
            let lru_id = slot.lru_id;
            self.sorted_sets.remove(key);
            self.lru.remove(lru_id);
            log::debug!("ZREM emptied sorted set, dropped from store");
        } else {
            let lru_id = slot.lru_id;
            self.lru.touch(lru_id);
            log::debug!("ZREM removed member");
        }
        true
    }
}
