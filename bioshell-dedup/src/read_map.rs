//! Records the initial exemplar assigned to each read ID during Pass 1.
//!
//! Backed by the result arena so it survives `finalize`; Pass 2 dereferences a read ID
//! to its initial exemplar here before handing that off to the
//! [`ClusterLeaderTable`](crate::leaders::ClusterLeaderTable).

use crate::arena::{Addr, Arena};

/// DJB2 hash over a byte string: `h = 5381; h = h*33 + byte`.
fn djb2(bytes: &[u8]) -> u64 {
    let mut h: u64 = 5381;
    for &b in bytes {
        h = h.wrapping_mul(33).wrapping_add(b as u64);
    }
    h
}

struct Entry {
    read_id_addr: Addr,
    read_id_len: usize,
    exemplar_addr: Addr,
    exemplar_len: usize,
    next: Option<usize>,
}

/// An open-hash table, external chaining, mapping read ID -> initial exemplar ID.
///
/// `put` never deduplicates: under correct driver use each read ID is processed at
/// most once, so chains hold each key at most once in practice, but the table itself
/// does not enforce it.
pub struct ReadExemplarMap {
    table_size: usize,
    buckets: Vec<Option<usize>>,
    entries: Vec<Entry>,
}

impl ReadExemplarMap {
    /// Creates an empty map with `table_size` buckets.
    pub fn new(table_size: usize) -> Self {
        ReadExemplarMap { table_size, buckets: vec![None; table_size], entries: Vec::new() }
    }

    fn bucket_of(&self, read_id: &[u8]) -> usize { (djb2(read_id) as usize) % self.table_size }

    /// Unconditionally prepends `(read_id, exemplar_id)` into the table. Both strings
    /// are copied into the result arena as standalone null-terminated regions; if
    /// either allocation fails the entry is dropped silently (the arena degrades
    /// gracefully rather than aborting).
    pub fn put(&mut self, arena: &mut Arena, read_id: &[u8], exemplar_id: &[u8]) {
        let read_id_addr = arena.dup_bytes(read_id);
        let exemplar_addr = arena.dup_bytes(exemplar_id);
        if read_id_addr.is_null() || exemplar_addr.is_null() {
            return;
        }

        let bucket = self.bucket_of(read_id);
        let entry_index = self.entries.len();
        self.entries.push(Entry {
            read_id_addr, read_id_len: read_id.len(),
            exemplar_addr, exemplar_len: exemplar_id.len(),
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = Some(entry_index);
    }

    /// Looks up the initial exemplar ID recorded for `read_id`, if any. Equality is
    /// byte-exact; the first matching entry in the bucket's chain wins.
    pub fn get(&self, arena: &Arena, read_id: &[u8]) -> Option<Vec<u8>> {
        let bucket = self.bucket_of(read_id);
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            let entry = &self.entries[idx];
            if arena.slice(entry.read_id_addr, entry.read_id_len) == read_id {
                return Some(arena.slice(entry.exemplar_addr, entry.exemplar_len).to_vec());
            }
            cursor = entry.next;
        }
        None
    }
}
