//! End-to-end exercise of the `dedup_reads` driver binary: write a small TSV, run the
//! binary against it, and check the augmented output it produces.

use std::fs;
use std::io::Write;
use std::process::Command;

fn run_dedup_reads(input_tsv: &str, extra_args: &[&str]) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let infile = dir.path().join("in.tsv");
    let outfile = dir.path().join("out.tsv");
    fs::File::create(&infile).unwrap().write_all(input_tsv.as_bytes()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_dedup_reads"))
        .arg(infile.to_str().unwrap())
        .arg("--outfile")
        .arg(outfile.to_str().unwrap())
        .arg("--expected-reads")
        .arg("8")
        .args(extra_args)
        .status()
        .expect("failed to run dedup_reads");
    assert!(status.success());

    fs::read_to_string(&outfile).unwrap()
}

#[test]
fn exact_duplicate_rows_resolve_to_the_first_reads_id() {
    let input = "\
read_id\tseq_fwd\tseq_rev\tqual_fwd\tqual_rev\tseq_id
r1\tACGTACGTACGT\tTTTTAAAACCCC\t\t\tr1
r2\tACGTACGTACGT\tTTTTAAAACCCC\t\t\tr2
";
    // Every row's seq_id differs from its own read_id? No -- both are equal here, so
    // under the preserved (inverted) fast path neither row is routed to the engine,
    // and both resolve to themselves. This exercises the "equal seq_id skips the
    // engine" half of the fast path.
    let output = run_dedup_reads(input, &[]);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "read_id\tseq_fwd\tseq_rev\tqual_fwd\tqual_rev\tseq_id\tfinal_exemplar");
    assert!(lines[1].ends_with("\tr1"));
    assert!(lines[2].ends_with("\tr2"));
}

#[test]
fn rows_with_differing_seq_id_are_routed_through_the_engine() {
    let input = "\
read_id\tseq_fwd\tseq_rev\tqual_fwd\tqual_rev\tseq_id
r1\tACGTACGTACGT\tTTTTAAAACCCC\t\t\tupstream_a
r2\tACGTACGTACGT\tTTTTAAAACCCC\t\t\tupstream_b
";
    // Here seq_id differs from read_id for both rows, so the preserved fast path
    // inversion routes both through the engine; r2 matches r1's exemplar.
    let output = run_dedup_reads(input, &[]);
    let lines: Vec<&str> = output.lines().collect();
    assert!(lines[1].ends_with("\tr1"));
    assert!(lines[2].ends_with("\tr1"));
}

#[test]
fn missing_required_column_is_reported_and_the_binary_exits_nonzero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let infile = dir.path().join("in.tsv");
    let outfile = dir.path().join("out.tsv");
    fs::File::create(&infile).unwrap().write_all(b"read_id\tseq_rev\nr1\tACGT\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_dedup_reads"))
        .arg(infile.to_str().unwrap())
        .arg("--outfile")
        .arg(outfile.to_str().unwrap())
        .arg("--expected-reads")
        .arg("8")
        .output()
        .expect("failed to run dedup_reads");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("seq_fwd"));
}
