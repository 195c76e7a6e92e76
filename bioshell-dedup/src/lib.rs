//! Approximate-similarity deduplication of paired-end sequencing reads.
//!
//! Two reads are considered duplicates when their minimizer hash sets collide and a
//! shift-tolerant comparison of the raw bases confirms they overlap closely enough
//! (see the [`predicate`] module). The engine runs in two passes: [`engine::DedupEngine`]
//! assigns every read to a provisional ("initial") exemplar during Pass 1, elects a
//! per-cluster leader by read quality as reads stream past, and after
//! [`DedupEngine::finalize`](engine::DedupEngine::finalize) resolves any read ID to its
//! cluster's final leader during Pass 2.
//!
//! All per-read bookkeeping lives in one of two bump-allocated [`arena::Arena`]s: a
//! scratch arena that backs the Pass-1-only exemplar index, and a result arena that
//! backs the read -> exemplar map and the cluster leader table, both of which must
//! survive into Pass 2.

pub mod arena;
pub mod engine;
pub mod errors;
pub mod index;
pub mod leaders;
pub mod minimizer;
pub mod predicate;
pub mod read_map;

pub use engine::{DedupEngine, DedupParams, DedupStats};
pub use errors::DedupError;
