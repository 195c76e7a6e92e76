//! Parameter validation, two-phase state, statistics, and the public `process_read` /
//! `finalize` / `get_final_exemplar` lifecycle.

use log::debug;

use crate::arena::Arena;
use crate::errors::DedupError;
use crate::index::ExemplarIndex;
use crate::leaders::ClusterLeaderTable;
use crate::minimizer::extract_pair_minimizers;
use crate::read_map::ReadExemplarMap;

/// The fixed table-size ladder spec.md mandates: `table_size` is the smallest prime
/// from this ladder that is >= `1.2 * expected_reads`. The index never rehashes; if
/// `expected_reads` would demand a prime beyond the top rung, the top rung is used and
/// chains simply run longer than the target load factor.
const TABLE_SIZE_LADDER: [usize; 6] = [1009, 10007, 100003, 1000003, 10000019, 16777259];

fn choose_table_size(expected_reads: usize) -> usize {
    let target = (expected_reads as f64 * 1.2).ceil() as usize;
    TABLE_SIZE_LADDER.iter().copied().find(|&p| p >= target).unwrap_or(*TABLE_SIZE_LADDER.last().unwrap())
}

/// Configuration accepted by [`DedupEngine::create`]. Mirrors spec.md's `create(params)`
/// validation rules exactly.
#[derive(Debug, Clone, Copy)]
pub struct DedupParams {
    /// K-mer length for minimizer hashing. Must be `> 0`.
    pub kmer_len: usize,
    /// Window length for minimizer extraction. Must be `> 0`.
    pub window_len: usize,
    /// Number of windows to process per mate. Must be `> 0`.
    pub num_windows: usize,
    /// Maximum alignment shift, in bases. Must be `>= 0`.
    pub max_offset: i64,
    /// Maximum mismatch fraction of the overlap. Must be in `[0, 1]`.
    pub max_error_frac: f64,
    /// Expected number of reads, used only to size the three hash tables.
    pub expected_reads: usize,
}

impl DedupParams {
    fn validate(&self) -> Result<(), DedupError> {
        if self.kmer_len == 0 {
            return Err(DedupError::InvalidParams { reason: "kmer_len must be > 0".into() });
        }
        if self.window_len == 0 {
            return Err(DedupError::InvalidParams { reason: "window_len must be > 0".into() });
        }
        if self.num_windows == 0 {
            return Err(DedupError::InvalidParams { reason: "num_windows must be > 0".into() });
        }
        if self.expected_reads == 0 {
            return Err(DedupError::InvalidParams { reason: "expected_reads must be > 0".into() });
        }
        if self.max_offset < 0 {
            return Err(DedupError::InvalidParams { reason: "max_offset must be >= 0".into() });
        }
        if !(0.0..=1.0).contains(&self.max_error_frac) {
            return Err(DedupError::InvalidParams { reason: "max_error_frac must be in [0, 1]".into() });
        }
        Ok(())
    }
}

/// Point-in-time statistics about an engine's progress. `scratch_arena_used` reads as
/// zero once the engine has been [`finalize`](DedupEngine::finalize)d, since the
/// scratch arena is destroyed at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupStats {
    /// Total number of reads observed via `process_read`.
    pub total_reads: u64,
    /// Number of distinct cluster-leader records (i.e. distinct initial exemplars).
    pub unique_clusters: u64,
    /// Bytes used in the scratch arena; zero once destroyed at `finalize`.
    pub scratch_arena_used: usize,
    /// Bytes used in the result arena.
    pub result_arena_used: usize,
}

/// Computes a read pair's score: `fwd_len + rev_len + mean_quality`, where
/// `mean_quality` is `0.0` if either quality string is missing or empty, and otherwise
/// `(mean(fwd_qual) + mean(rev_qual)) / 2` over `byte - 33` (Phred+33) values.
fn score_of(fwd_len: usize, rev_len: usize, fwd_qual: Option<&[u8]>, rev_qual: Option<&[u8]>) -> f64 {
    let mean_quality = match (fwd_qual, rev_qual) {
        (Some(fq), Some(rq)) if !fq.is_empty() && !rq.is_empty() => {
            let mean = |q: &[u8]| q.iter().map(|&b| (b as f64) - 33.0).sum::<f64>() / q.len() as f64;
            (mean(fq) + mean(rq)) / 2.0
        }
        _ => 0.0,
    };
    fwd_len as f64 + rev_len as f64 + mean_quality
}

enum State {
    Open { scratch_arena: Arena, index: ExemplarIndex },
    Finalized,
}

/// The two-pass similarity engine: indexes reads in Pass 1 via minimizer hashing and a
/// shift-tolerant match predicate, then answers per-read exemplar queries in Pass 2
/// after [`finalize`](Self::finalize) releases the index.
pub struct DedupEngine {
    params: DedupParams,
    table_size: usize,
    state: State,
    result_arena: Arena,
    read_map: ReadExemplarMap,
    leaders: ClusterLeaderTable,
    total_reads: u64,
    /// Scratch buffer for the two pass-through return paths (`process_read` called
    /// after `finalize`, and `get_final_exemplar` on an unrecognized ID) that hand back
    /// the caller's own input rather than anything allocated in an arena. Using this
    /// buffer, instead of allocating a fresh `Vec` per call, keeps the borrowed-return
    /// API uniform across every path without touching engine state that matters
    /// (counters, arenas, tables) on what spec.md calls a "no side effects" call.
    passthrough_buf: Vec<u8>,
}

impl DedupEngine {
    /// Validates `params`, allocates both arenas and all three tables, and returns a
    /// ready-to-use engine in the `open` state.
    pub fn create(params: DedupParams) -> Result<Self, DedupError> {
        params.validate()?;
        let table_size = choose_table_size(params.expected_reads);

        // Heuristic capacity, scaled off spec.md's "~2 GiB scratch / ~512 MiB result
        // typical" figures for tens-of-millions-of-reads runs: roughly 200 bytes of
        // scratch and 64 bytes of result per expected read, with a floor so small runs
        // (and tests) don't pay for a table-size-driven minimum they don't need.
        let scratch_capacity = params.expected_reads.saturating_mul(200).max(1 << 16);
        let result_capacity = params.expected_reads.saturating_mul(64).max(1 << 16);

        let scratch_arena = Arena::try_new(scratch_capacity)
            .map_err(|_| DedupError::OutOfMemory { requested: scratch_capacity })?;
        let result_arena = Arena::try_new(result_capacity)
            .map_err(|_| DedupError::OutOfMemory { requested: result_capacity })?;

        Ok(DedupEngine {
            params,
            table_size,
            state: State::Open { scratch_arena, index: ExemplarIndex::new(table_size) },
            result_arena,
            read_map: ReadExemplarMap::new(table_size),
            leaders: ClusterLeaderTable::new(table_size),
            total_reads: 0,
            passthrough_buf: Vec::new(),
        })
    }

    /// Processes one read pair.
    ///
    /// In the `open` state: extracts minimizer hashes, probes the exemplar index, and
    /// either records a match against the hit exemplar or admits this read as a new
    /// exemplar. Always returns the resulting initial-exemplar identifier.
    ///
    /// Once [`finalize`](Self::finalize) has been called, this is a no-op that echoes
    /// `id` back; spec.md is explicit that Pass-2-state calls perform no side effects.
    pub fn process_read(&mut self, id: &[u8], fwd: &[u8], rev: &[u8], fwd_qual: Option<&[u8]>, rev_qual: Option<&[u8]>) -> &[u8] {
        let (scratch_arena, index) = match &mut self.state {
            State::Open { scratch_arena, index } => (scratch_arena, index),
            State::Finalized => {
                self.passthrough_buf.clear();
                self.passthrough_buf.extend_from_slice(id);
                return &self.passthrough_buf;
            }
        };

        self.total_reads += 1;
        let score = score_of(fwd.len(), rev.len(), fwd_qual, rev_qual);
        let hashes = extract_pair_minimizers(fwd, rev, self.params.kmer_len, self.params.window_len, self.params.num_windows);

        let matched = if hashes.is_empty() {
            None
        } else {
            index.probe(scratch_arena, &hashes, fwd, rev, self.params.max_offset, self.params.max_error_frac)
        };

        match matched {
            Some(exemplar_id) => {
                self.read_map.put(&mut self.result_arena, id, &exemplar_id);
                self.leaders.upsert(&mut self.result_arena, &exemplar_id, id, score);
            }
            None => {
                self.read_map.put(&mut self.result_arena, id, id);
                self.leaders.upsert(&mut self.result_arena, id, id, score);
                if !hashes.is_empty() {
                    index.insert(scratch_arena, &hashes, id, fwd, rev);
                }
            }
        }

        self.read_map.get(&self.result_arena, id).map(|v| {
            self.passthrough_buf.clear();
            self.passthrough_buf.extend_from_slice(&v);
        });
        &self.passthrough_buf
    }

    /// Destroys the scratch arena and exemplar index, and transitions the engine to
    /// the `finalized` state. Idempotent; calling it again is a no-op.
    pub fn finalize(&mut self) {
        if matches!(self.state, State::Finalized) {
            return;
        }
        debug!("finalizing: {} reads observed, {} clusters", self.total_reads, self.leaders.len());
        self.state = State::Finalized;
    }

    /// Resolves `id` to its final exemplar: the leader of the cluster that `id`'s
    /// initial exemplar belongs to.
    ///
    /// Only meaningful once [`finalize`](Self::finalize) has been called; spec.md
    /// tolerates calling this before `finalize` too, in which case it simply echoes
    /// `id` back and sets no error.
    pub fn get_final_exemplar(&mut self, id: &[u8]) -> &[u8] {
        if !matches!(self.state, State::Finalized) {
            self.passthrough_buf.clear();
            self.passthrough_buf.extend_from_slice(id);
            return &self.passthrough_buf;
        }

        let initial = match self.read_map.get(&self.result_arena, id) {
            Some(initial) => initial,
            None => {
                self.passthrough_buf.clear();
                self.passthrough_buf.extend_from_slice(id);
                return &self.passthrough_buf;
            }
        };

        let leader = self.leaders.leader_of(&self.result_arena, &initial);
        self.passthrough_buf.clear();
        match leader {
            Some(info) => self.passthrough_buf.extend_from_slice(&info.best_read_id),
            None => self.passthrough_buf.extend_from_slice(&initial),
        }
        &self.passthrough_buf
    }

    /// A point-in-time snapshot of engine statistics.
    pub fn stats(&self) -> DedupStats {
        let scratch_arena_used = match &self.state {
            State::Open { scratch_arena, .. } => scratch_arena.bytes_used(),
            State::Finalized => 0,
        };
        DedupStats {
            total_reads: self.total_reads,
            unique_clusters: self.leaders.len() as u64,
            scratch_arena_used,
            result_arena_used: self.result_arena.bytes_used(),
        }
    }

    /// The hash-table size shared by the exemplar index, read map, and leader table.
    pub fn table_size(&self) -> usize { self.table_size }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params(expected_reads: usize) -> DedupParams {
        DedupParams { kmer_len: 4, window_len: 6, num_windows: 2, max_offset: 1, max_error_frac: 0.02, expected_reads }
    }

    #[test]
    fn create_rejects_invalid_params() {
        let mut params = default_params(10);
        params.kmer_len = 0;
        assert!(matches!(DedupEngine::create(params), Err(DedupError::InvalidParams { .. })));

        let mut params = default_params(10);
        params.max_error_frac = 1.5;
        assert!(matches!(DedupEngine::create(params), Err(DedupError::InvalidParams { .. })));

        let mut params = default_params(10);
        params.expected_reads = 0;
        assert!(matches!(DedupEngine::create(params), Err(DedupError::InvalidParams { .. })));
    }

    #[test]
    fn table_size_follows_the_prime_ladder() {
        assert_eq!(choose_table_size(1), 1009);
        // 1.2 * 1000 = 1200, which overshoots the first rung (1009)
        assert_eq!(choose_table_size(1000), 10007);
        assert_eq!(choose_table_size(100_000_000), 16777259);
    }

    #[test]
    fn self_match_property() {
        let mut engine = DedupEngine::create(default_params(8)).unwrap();
        let id = engine.process_read(b"r1", b"ACGTACGTACGT", b"TTTTAAAACCCC", None, None).to_vec();
        assert_eq!(id, b"r1");
        engine.finalize();
        assert_eq!(engine.get_final_exemplar(b"r1"), b"r1");
    }

    #[test]
    fn unknown_id_passthrough() {
        let mut engine = DedupEngine::create(default_params(8)).unwrap();
        engine.process_read(b"r1", b"ACGTACGTACGT", b"TTTTAAAACCCC", None, None);
        engine.finalize();
        assert_eq!(engine.get_final_exemplar(b"r99"), b"r99");
    }

    #[test]
    fn process_read_after_finalize_is_a_pure_echo() {
        let mut engine = DedupEngine::create(default_params(8)).unwrap();
        engine.process_read(b"r1", b"ACGTACGTACGT", b"TTTTAAAACCCC", None, None);
        engine.finalize();
        let stats_before = engine.stats();
        let echoed = engine.process_read(b"r2", b"ACGTACGTACGT", b"TTTTAAAACCCC", None, None).to_vec();
        assert_eq!(echoed, b"r2");
        assert_eq!(engine.stats(), stats_before);
    }

    #[test]
    fn no_valid_kmers_becomes_a_singleton() {
        let mut engine = DedupEngine::create(default_params(8)).unwrap();
        engine.process_read(b"r1", b"NNNNNNNNNN", b"NNNNNNNNNN", None, None);
        engine.finalize();
        let stats = engine.stats();
        assert_eq!(stats.unique_clusters, 1);
        assert_eq!(engine.get_final_exemplar(b"r1"), b"r1");
    }
}
