//! Window-minimum k-mer hashing.
//!
//! A minimizer is the smallest hash among all k-mers in a window; it acts as a compact
//! sketch of a sequence that is stable under small edits, which is what lets the
//! [`ExemplarIndex`](crate::index::ExemplarIndex) shortlist candidates without a true
//! nearest-neighbor search.

/// Maps a nucleotide byte to its 2-bit code. Any byte that is not `A/C/G/T` (upper or
/// lower case) is not a valid base; the caller is told via the `bool` return so it can
/// invalidate the k-mer being accumulated.
#[inline]
fn base_code(b: u8) -> Option<u64> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Computes the 2-bit-packed hash of `seq[start..start + kmer_len)`.
///
/// Returns `None` if the k-mer contains any byte outside `{A,C,G,T,a,c,g,t}`. A hash
/// that would naturally come out to zero is promoted to `1`, since `0` is reserved to
/// mean "no valid k-mer" throughout the index.
fn kmer_hash(seq: &[u8], start: usize, kmer_len: usize) -> Option<u64> {
    let mut h: u64 = 0;
    for &b in &seq[start..start + kmer_len] {
        let code = base_code(b)?;
        h = (h << 2) | code;
    }
    Some(if h == 0 { 1 } else { h })
}

/// Extracts up to `num_windows` minimizer hashes from `seq`.
///
/// Window `w` covers `seq[w * window_len .. ]`; within it, every k-mer starting at an
/// offset up to `min(start + window_len - kmer_len, seq.len() - kmer_len)` is hashed,
/// and the smallest non-zero hash observed becomes that window's minimizer. A window
/// that cannot fit a whole k-mer, or in which every k-mer is invalid, contributes
/// nothing to the output.
pub fn extract_minimizers(seq: &[u8], kmer_len: usize, window_len: usize, num_windows: usize) -> Vec<u64> {
    let seq_len = seq.len();
    let mut hashes = Vec::with_capacity(num_windows);

    for w in 0..num_windows {
        let start = w * window_len;
        if start + kmer_len > seq_len {
            continue;
        }
        let limit = std::cmp::min(start + window_len - kmer_len, seq_len - kmer_len);

        let mut best: Option<u64> = None;
        for i in start..=limit {
            if let Some(h) = kmer_hash(seq, i, kmer_len) {
                best = Some(match best {
                    Some(b) => b.min(h),
                    None => h,
                });
            }
        }
        if let Some(h) = best {
            hashes.push(h);
        }
    }
    hashes
}

/// Extracts minimizers for both mates of a read pair and concatenates them: forward
/// window 0, forward window 1, ..., reverse window 0, reverse window 1, ...
///
/// Duplicate hashes are not removed; a window whose minimizer collides with another
/// window's just means that exemplar bucket is probed/inserted twice.
pub fn extract_pair_minimizers(fwd: &[u8], rev: &[u8], kmer_len: usize, window_len: usize, num_windows: usize) -> Vec<u64> {
    let mut hashes = extract_minimizers(fwd, kmer_len, window_len, num_windows);
    hashes.extend(extract_minimizers(rev, kmer_len, window_len, num_windows));
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_promoted_to_one() {
        // an all-A 4-mer hashes to 0 under 2-bit packing; it must come back as 1
        let hashes = extract_minimizers(b"AAAA", 4, 4, 1);
        assert_eq!(hashes, vec![1]);
    }

    #[test]
    fn invalid_bases_yield_no_hash_for_that_window() {
        let hashes = extract_minimizers(b"NNNNNNNNNN", 4, 6, 2);
        assert!(hashes.is_empty());
    }

    #[test]
    fn short_sequence_skips_windows_that_cannot_fit_a_kmer() {
        // kmer_len=4, window_len=6, num_windows=2, seq len 5: window 1 starts at 6, can't fit
        let hashes = extract_minimizers(b"ACGTA", 4, 6, 2);
        assert_eq!(hashes.len(), 1);
    }

    #[test]
    fn pair_minimizers_concatenate_forward_then_reverse() {
        let fwd = b"ACGTACGTACGT";
        let rev = b"TTTTAAAACCCC";
        let fwd_only = extract_minimizers(fwd, 4, 6, 2);
        let rev_only = extract_minimizers(rev, 4, 6, 2);
        let both = extract_pair_minimizers(fwd, rev, 4, 6, 2);
        assert_eq!(both.len(), fwd_only.len() + rev_only.len());
        assert_eq!(&both[..fwd_only.len()], &fwd_only[..]);
    }

    #[test]
    fn identical_sequences_share_minimizers() {
        let a = extract_minimizers(b"ACGTACGTACGT", 4, 6, 2);
        let b = extract_minimizers(b"ACGTACGTACGT", 4, 6, 2);
        assert_eq!(a, b);
    }
}
