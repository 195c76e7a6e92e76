//! Per-initial-exemplar tracking of the highest-scoring cluster member.
//!
//! A cluster-leader record keeps `key` (immutable, the initial exemplar's ID, used for
//! lookup) separate from `best_read_id` (mutable, the current leader's ID). The two
//! must never collapse into one field: a lookup table keyed on the mutable field would
//! silently lose entries the moment the leader changes.

use crate::arena::{Addr, Arena};

fn djb2(bytes: &[u8]) -> u64 {
    let mut h: u64 = 5381;
    for &b in bytes {
        h = h.wrapping_mul(33).wrapping_add(b as u64);
    }
    h
}

struct Record {
    key_addr: Addr,
    key_len: usize,
    best_read_id_addr: Addr,
    best_read_id_len: usize,
    best_score: f64,
    count: u64,
    next: Option<usize>,
}

/// A snapshot of a cluster-leader record's reportable fields, returned from
/// [`ClusterLeaderTable::upsert`] and [`ClusterLeaderTable::leader_of`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderInfo {
    /// The current highest-scoring member's identifier.
    pub best_read_id: Vec<u8>,
    /// That member's score.
    pub best_score: f64,
    /// Number of reads recorded against this cluster so far.
    pub count: u64,
}

/// An open-hash table, external chaining, keyed by initial-exemplar identifier.
pub struct ClusterLeaderTable {
    table_size: usize,
    buckets: Vec<Option<usize>>,
    records: Vec<Record>,
}

impl ClusterLeaderTable {
    /// Creates an empty table with `table_size` buckets.
    pub fn new(table_size: usize) -> Self {
        ClusterLeaderTable { table_size, buckets: vec![None; table_size], records: Vec::new() }
    }

    fn bucket_of(&self, key: &[u8]) -> usize { (djb2(key) as usize) % self.table_size }

    fn find(&self, arena: &Arena, key: &[u8]) -> Option<usize> {
        let bucket = self.bucket_of(key);
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            let rec = &self.records[idx];
            if arena.slice(rec.key_addr, rec.key_len) == key {
                return Some(idx);
            }
            cursor = rec.next;
        }
        None
    }

    /// Records one more observation of `candidate_read_id` (scoring `candidate_score`)
    /// against the cluster keyed by `initial_exemplar_id`.
    ///
    /// If the cluster doesn't exist yet, it is created with the exemplar itself as the
    /// initial (and, until a better score arrives, permanent) leader. `count` is always
    /// incremented; `best_read_id`/`best_score` are replaced only on a strict
    /// improvement, so ties keep the incumbent leader.
    ///
    /// Returns `None` only if an arena allocation failed while creating a brand-new
    /// record or updating an existing leader's identifier; the caller should treat a
    /// dropped update as lossy-but-non-fatal, per the engine's soft-fail contract.
    pub fn upsert(&mut self, arena: &mut Arena, initial_exemplar_id: &[u8], candidate_read_id: &[u8], candidate_score: f64) -> Option<LeaderInfo> {
        let existing = self.find(arena, initial_exemplar_id);
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let key_addr = arena.dup_bytes(initial_exemplar_id);
                if key_addr.is_null() {
                    return None;
                }
                // best_read_id starts out as the exemplar's own identifier; allocate a
                // second, independent copy so the mutable field never aliases `key`.
                let best_read_id_addr = arena.dup_bytes(initial_exemplar_id);
                if best_read_id_addr.is_null() {
                    return None;
                }
                let idx = self.records.len();
                self.records.push(Record {
                    key_addr, key_len: initial_exemplar_id.len(),
                    best_read_id_addr, best_read_id_len: initial_exemplar_id.len(),
                    best_score: -1.0,
                    count: 0,
                    next: self.buckets[self.bucket_of(initial_exemplar_id)],
                });
                self.buckets[self.bucket_of(initial_exemplar_id)] = Some(idx);
                idx
            }
        };

        self.records[idx].count += 1;
        if candidate_score > self.records[idx].best_score {
            let addr = arena.dup_bytes(candidate_read_id);
            if addr.is_null() {
                // leave the previous leader in place; the count increment above still stands
                return Some(self.snapshot(arena, idx));
            }
            self.records[idx].best_read_id_addr = addr;
            self.records[idx].best_read_id_len = candidate_read_id.len();
            self.records[idx].best_score = candidate_score;
        }
        Some(self.snapshot(arena, idx))
    }

    fn snapshot(&self, arena: &Arena, idx: usize) -> LeaderInfo {
        let rec = &self.records[idx];
        LeaderInfo {
            best_read_id: arena.slice(rec.best_read_id_addr, rec.best_read_id_len).to_vec(),
            best_score: rec.best_score,
            count: rec.count,
        }
    }

    /// Looks up the current leader of the cluster keyed by `initial_exemplar_id`.
    /// Lookups compare against the immutable `key`, never against `best_read_id`.
    pub fn leader_of(&self, arena: &Arena, initial_exemplar_id: &[u8]) -> Option<LeaderInfo> {
        self.find(arena, initial_exemplar_id).map(|idx| self.snapshot(arena, idx))
    }

    /// Number of distinct cluster-leader records currently tracked.
    pub fn len(&self) -> usize { self.records.len() }
}
