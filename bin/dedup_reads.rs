//! Driver binary: TSV/gzip I/O, column discovery and two-pass orchestration around
//! [`bioshell_dedup::DedupEngine`]. None of the similarity logic lives here; this is
//! exactly the "driver" collaborator spec.md scopes the core engine away from.

use std::env;
use std::io::{BufRead, Write};
use std::time::Instant;

use clap::Parser;
use displaydoc::Display;
use log::{debug, info, warn};
use thiserror::Error;

use bioshell_dedup::{DedupEngine, DedupError, DedupParams};
use bioshell_io::{open_file, out_writer};

#[derive(Parser, Debug)]
#[clap(name = "dedup_reads", version, author)]
#[clap(about = "Mark approximate duplicate paired-end reads in a TSV stream", long_about = None)]
struct Args {
    /// input TSV file, optionally gzip-compressed (.gz); pass "-" to read stdin is not supported, use a file
    infile: String,
    /// output TSV file; "stdout"/"stderr" write to the matching stream
    #[clap(long, default_value = "stdout")]
    outfile: String,
    /// column holding each row's own read ID
    #[clap(long, default_value = "read_id")]
    col_read_id: String,
    /// column holding the forward mate's sequence
    #[clap(long, default_value = "seq_fwd")]
    col_seq_fwd: String,
    /// column holding the reverse mate's sequence
    #[clap(long, default_value = "seq_rev")]
    col_seq_rev: String,
    /// column holding the forward mate's Phred+33 quality string, if present
    #[clap(long, default_value = "qual_fwd")]
    col_qual_fwd: String,
    /// column holding the reverse mate's Phred+33 quality string, if present
    #[clap(long, default_value = "qual_rev")]
    col_qual_rev: String,
    /// column holding the upstream alignment-duplicate ID used by the fast-path check
    #[clap(long, default_value = "seq_id")]
    col_seq_id: String,
    /// k-mer length for minimizer hashing
    #[clap(long, default_value = "4")]
    kmer_len: usize,
    /// window length for minimizer extraction
    #[clap(long, default_value = "6")]
    window_len: usize,
    /// number of windows sampled per mate
    #[clap(long, default_value = "2")]
    num_windows: usize,
    /// maximum alignment shift tolerated by the match predicate, in bases
    #[clap(long, default_value = "1")]
    max_offset: i64,
    /// maximum mismatch fraction of the overlap tolerated by the match predicate
    #[clap(long, default_value = "0.02")]
    max_error_frac: f64,
    /// expected number of reads, used only to size the engine's hash tables
    #[clap(long)]
    expected_reads: usize,
    /// log progress every N processed rows
    #[clap(long, default_value = "1000000")]
    progress_every: u64,
    /// be more verbose and log program actions on the screen
    #[clap(short, long)]
    verbose: bool,
}

/// Errors raised by the driver itself; the core engine's own failure mode
/// ([`DedupError`]) is wrapped in here rather than duplicated.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
enum DriverError {
    /// I/O error while reading or writing a TSV stream
    Io(#[from] std::io::Error),
    /// input TSV has no header row
    EmptyInput,
    /// required column '{column}' was not found in the input header
    MissingColumn {
        /// the column name the driver looked for
        column: String,
    },
    /// failed to create the deduplication engine: {0}
    Engine(#[from] DedupError),
}

/// Byte offsets of the columns the driver cares about, resolved once from the header.
struct ColumnLayout {
    read_id: usize,
    seq_fwd: usize,
    seq_rev: usize,
    qual_fwd: Option<usize>,
    qual_rev: Option<usize>,
    seq_id: Option<usize>,
}

impl ColumnLayout {
    fn resolve(header: &[&str], args: &Args) -> Result<Self, DriverError> {
        let find = |name: &str| header.iter().position(|&h| h == name);
        let require = |name: &str| -> Result<usize, DriverError> {
            find(name).ok_or_else(|| DriverError::MissingColumn { column: name.to_string() })
        };
        Ok(ColumnLayout {
            read_id: require(&args.col_read_id)?,
            seq_fwd: require(&args.col_seq_fwd)?,
            seq_rev: require(&args.col_seq_rev)?,
            qual_fwd: find(&args.col_qual_fwd),
            qual_rev: find(&args.col_qual_rev),
            seq_id: find(&args.col_seq_id),
        })
    }
}

/// One buffered input row: the original fields (for pass-through output) plus whether
/// the fast-path check (see spec.md sec. 9's Open Question, preserved verbatim below)
/// routes this row through the similarity engine at all.
struct Row {
    fields: Vec<String>,
    needs_engine: bool,
}

/// Per spec.md sec. 9: the driver's fast path queries the engine only when the row's
/// alignment-duplicate column (`seq_id`) *differs* from its own `read_id` -- the
/// inverse of the natural reading, preserved verbatim rather than "fixed" since no
/// pipeline schema is available here to verify the intended direction against.
fn needs_engine(fields: &[String], layout: &ColumnLayout) -> bool {
    match layout.seq_id {
        Some(idx) => fields[idx] != fields[layout.read_id],
        None => true,
    }
}

fn non_empty(s: &str) -> Option<&[u8]> {
    if s.is_empty() { None } else { Some(s.as_bytes()) }
}

fn run(args: Args) -> Result<(), DriverError> {
    let reader = open_file(&args.infile)?;
    let mut lines = reader.lines();

    let header_line = lines.next().ok_or(DriverError::EmptyInput)??;
    let header: Vec<&str> = header_line.split('\t').collect();
    let layout = ColumnLayout::resolve(&header, &args)?;
    info!(
        "resolved columns: read_id={} seq_fwd={} seq_rev={} qual_fwd={:?} qual_rev={:?} seq_id={:?}",
        layout.read_id, layout.seq_fwd, layout.seq_rev, layout.qual_fwd, layout.qual_rev, layout.seq_id
    );

    let params = DedupParams {
        kmer_len: args.kmer_len,
        window_len: args.window_len,
        num_windows: args.num_windows,
        max_offset: args.max_offset,
        max_error_frac: args.max_error_frac,
        expected_reads: args.expected_reads,
    };
    let mut engine = DedupEngine::create(params)?;

    // Pass 1: stream rows, applying the fast-path check, buffering just enough of each
    // row to drive Pass 2 without a second disk read (a driver-level decision recorded
    // in DESIGN.md -- spec.md does not mandate a specific re-read strategy).
    let start = Instant::now();
    let mut rows: Vec<Row> = Vec::new();
    let mut processed: u64 = 0;
    for line in lines {
        let line = line?;
        let fields: Vec<String> = line.split('\t').map(|s| s.to_string()).collect();
        let route_to_engine = needs_engine(&fields, &layout);

        if route_to_engine {
            let fwd_qual = layout.qual_fwd.and_then(|i| fields.get(i)).and_then(|s| non_empty(s));
            let rev_qual = layout.qual_rev.and_then(|i| fields.get(i)).and_then(|s| non_empty(s));
            engine.process_read(
                fields[layout.read_id].as_bytes(),
                fields[layout.seq_fwd].as_bytes(),
                fields[layout.seq_rev].as_bytes(),
                fwd_qual,
                rev_qual,
            );
        }

        processed += 1;
        if processed % args.progress_every == 0 {
            info!("pass 1: {} rows in {:?}", processed, start.elapsed());
        }
        rows.push(Row { fields, needs_engine: route_to_engine });
    }
    info!("pass 1 complete: {} rows in {:?}", processed, start.elapsed());

    engine.finalize();
    let stats = engine.stats();
    info!(
        "finalized: {} reads, {} clusters, scratch={}B result={}B",
        stats.total_reads, stats.unique_clusters, stats.scratch_arena_used, stats.result_arena_used
    );
    if stats.unique_clusters == 0 && stats.total_reads > 0 {
        warn!("no clusters recorded despite {} reads processed; check column mapping", stats.total_reads);
    }

    // Pass 2: resolve each buffered row to its final exemplar and write the augmented TSV.
    let mut out = out_writer(&args.outfile, false);
    writeln!(out, "{}\tfinal_exemplar", header_line)?;
    for row in rows {
        let final_exemplar = if row.needs_engine {
            String::from_utf8_lossy(engine.get_final_exemplar(row.fields[layout.read_id].as_bytes())).into_owned()
        } else {
            row.fields[layout.read_id].clone()
        };
        writeln!(out, "{}\t{}", row.fields.join("\t"), final_exemplar)?;
    }
    out.flush()?;
    debug!("pass 2 complete");

    Ok(())
}

fn main() {
    let args = Args::parse();
    unsafe {
        if env::var("RUST_LOG").is_err() { env::set_var("RUST_LOG", "info") }
        if args.verbose { env::set_var("RUST_LOG", "debug"); }
    }
    env_logger::init();

    if let Err(err) = run(args) {
        eprintln!("dedup_reads: {}", err);
        std::process::exit(1);
    }
}
