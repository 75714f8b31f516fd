//! Named sorted sets: a skip list for ordering plus a member→score map for
//! O(1) membership checks and idempotent re-scoring.

use crate::skiplist::SkipList;
use std::collections::HashMap;

/// A sorted set: `member -> score`, with a skip list maintaining (score,
/// member) order. Invariant: for every `(member, score)` in `members`,
/// exactly one skip-list node `(score, member)` exists, and no other
/// skip-list node carries that member.
#[derive(Default)]
pub struct SortedSet {
    skiplist: SkipList,
    members: HashMap<String, f64>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds or reprices `member` at `score`. Idempotent when `score` is
    /// unchanged; replaces the existing node when the score changes.
    pub fn zadd(&mut self, score: f64, member: &str) {
        if let Some(&old_score) = self.members.get(member) {
            if old_score == score {
                return;
            }
            self.skiplist.remove(old_score, member);
        }
        self.skiplist.insert(score, member);
        self.members.insert(member.to_string(), score);
    }

    pub fn zrange(&self, lo: f64, hi: f64) -> Vec<(f64, String)> {
        self.skiplist.range_query(lo, hi)
    }

    pub fn zrank(&self, member: &str) -> Option<usize> {
        let score = *self.members.get(member)?;
        self.skiplist.get_rank(score, member)
    }

    /// Removes `member`. Returns `true` if it existed. Callers that need to
    /// decide whether to drop the whole sorted set from its LRU tracking
    /// (only appropriate once the set is empty) should check
    /// [`SortedSet::is_empty`] afterwards.
    pub fn zrem(&mut self, member: &str) -> bool {
        match self.members.remove(member) {
            Some(score) => {
                self.skiplist.remove(score, member);
                true
            }
            None => false,
        }
    }
}
