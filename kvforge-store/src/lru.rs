//! A safe, arena-backed intrusive LRU list shared by value entries and
//! sorted-set entries.
//!
//! Rather than the classic sentinel-node doubly linked list with raw
//! pointers, nodes live in a `Vec<Option<Slot>>` indexed by `usize`
//! handles; freed slots are threaded onto a free list for reuse. Head and
//! tail are plain `Option<usize>` fields on `LruList` itself, so there are
//! no heap sentinel nodes to allocate or special-case.

use kvforge_core::Token;

/// Which map in the unified store a cache-participant entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Value,
    SortedSet,
}

struct Slot {
    key: Token,
    kind: EntryKind,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A handle into the LRU arena. Stable for the lifetime of the entry it
/// names; reused only after that entry has been removed.
pub type LruId = usize;

/// Intrusive doubly linked list of cache entries, ordered "most recently
/// touched first." Invariant: each live `LruId` appears in the list exactly
/// once, and `head`/`tail` bound all live nodes.
#[derive(Default)]
pub struct LruList {
    slots: Vec<Option<Slot>>,
    free: Vec<LruId>,
    head: Option<LruId>,
    tail: Option<LruId>,
    len: usize,
}

impl LruList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a new entry at the front (most recently used position).
    pub fn insert_front(&mut self, key: Token, kind: EntryKind) -> LruId {
        let slot = Slot {
            key,
            kind,
            prev: None,
            next: self.head,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        if let Some(old_head) = self.head {
            self.slots[old_head].as_mut().unwrap().prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
        self.len += 1;
        id
    }

    /// Unlinks `id` from its current position without freeing its slot.
    fn unlink(&mut self, id: LruId) {
        let (prev, next) = {
            let slot = self.slots[id].as_ref().unwrap();
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    /// Moves an existing entry to the front. This is the "move_to_front"
    /// access pattern every read/write path in the unified store performs
    /// on a hit.
    pub fn touch(&mut self, id: LruId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        let slot = self.slots[id].as_mut().unwrap();
        slot.prev = None;
        slot.next = self.head;
        if let Some(old_head) = self.head {
            self.slots[old_head].as_mut().unwrap().prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    /// Removes `id` entirely, returning its key and kind so the caller can
    /// drop the corresponding entry from the value/sorted-set map.
    pub fn remove(&mut self, id: LruId) -> (Token, EntryKind) {
        self.unlink(id);
        let slot = self.slots[id].take().unwrap();
        self.free.push(id);
        self.len -= 1;
        (slot.key, slot.kind)
    }

    /// Removes and returns the least-recently-used entry, if any.
    pub fn pop_tail(&mut self) -> Option<(LruId, Token, EntryKind)> {
        let id = self.tail?;
        let (key, kind) = self.remove(id);
        Some((id, key, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_pop_tail_is_fifo_when_untouched() {
        let mut lru = LruList::new();
        let a = lru.insert_front(Token::new("a"), EntryKind::Value);
        let _b = lru.insert_front(Token::new("b"), EntryKind::Value);
        let _c = lru.insert_front(Token::new("c"), EntryKind::Value);
        let (id, key, _) = lru.pop_tail().unwrap();
        assert_eq!(id, a);
        assert_eq!(key, Token::new("a"));
    }

    #[test]
    fn touch_moves_entry_to_front_and_protects_it() {
        let mut lru = LruList::new();
        let a = lru.insert_front(Token::new("a"), EntryKind::Value);
        let _b = lru.insert_front(Token::new("b"), EntryKind::Value);
        lru.touch(a);
        let (_, key, _) = lru.pop_tail().unwrap();
        assert_eq!(key, Token::new("b"));
    }

    #[test]
    fn remove_drops_arbitrary_middle_entry() {
        let mut lru = LruList::new();
        let a = lru.insert_front(Token::new("a"), EntryKind::Value);
        let b = lru.insert_front(Token::new("b"), EntryKind::Value);
        let c = lru.insert_front(Token::new("c"), EntryKind::Value);
        let (key, kind) = lru.remove(b);
        assert_eq!(key, Token::new("b"));
        assert_eq!(kind, EntryKind::Value);
        assert_eq!(lru.len(), 2);
        // remaining order front-to-back is c, a
        let (_, k1, _) = lru.pop_tail().unwrap();
        assert_eq!(k1, Token::new("a"));
        let (_, k2, _) = lru.pop_tail().unwrap();
        assert_eq!(k2, Token::new("c"));
        let _ = a;
        let _ = c;
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut lru = LruList::new();
        let a = lru.insert_front(Token::new("a"), EntryKind::Value);
        lru.remove(a);
        let b = lru.insert_front(Token::new("b"), EntryKind::Value);
        assert_eq!(b, a);
    }

    #[test]
    fn pop_tail_on_empty_list_is_none() {
        let mut lru = LruList::new();
        assert!(lru.pop_tail().is_none());
    }

    #[test]
    fn bound_respects_capacity_under_repeated_inserts() {
        // Simulate a capacity-3 store evicting on every insert past
        // capacity and check the live set never exceeds it.
        let mut lru = LruList::new();
        let capacity = 3;
        for i in 0..10 {
            if lru.len() >= capacity {
                lru.pop_tail();
            }
            lru.insert_front(Token::new(format!("k{i}")), EntryKind::Value);
            assert!(lru.len() <= capacity);
        }
    }
}
