//! Windowed approximate matching of allele profiles (Hamming distance, no indels).
//!
//! Every window of the profile's length is compared position by position; the
//! inner loop stops as soon as the mismatch budget is exceeded, so stringent
//! budgets cost close to one comparison per sequence base.
//!
//! The optional [`Anchor`] is an exact-match prefilter on a prefix of the
//! forward primer, searched with `aho-corasick`. A binding site whose first
//! `K` bases differ from the primer is missed when the anchor is enabled; that
//! is the price of skipping sequences cheaply.
//!
//! # Examples
//! ```
//! use ampliscan::matcher::find_matches;
//! use ampliscan::primer::build_profile;
//! let hits = find_matches(b"TTACGTTT", &build_profile("ACGT"), 0);
//! assert_eq!(hits.len(), 1);
//! assert_eq!((hits[0].start, hits[0].end, hits[0].mismatches), (2, 6, 0));
//! ```
use aho_corasick::AhoCorasick;

use crate::primer::{AlleleProfile, SEQ_BASE};

/// One window of a sequence that matched a profile within budget.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct MatchHit {
    /// Start index (0-based, inclusive).
    pub start: usize,
    /// End index (0-based, exclusive).
    pub end: usize,
    pub mismatches: usize,
}

/// All windows of `seq` matching `profile` with at most `max_mismatches`,
/// ordered by increasing start.
pub fn find_matches(seq: &[u8], profile: &AlleleProfile, max_mismatches: usize) -> Vec<MatchHit> {
    let l = profile.len();
    if l == 0 || seq.len() < l {
        return Vec::new();
    }
    let masks = profile.masks();
    let mut hits = Vec::new();
    for start in 0..=seq.len() - l {
        let window = &seq[start..start + l];
        let mut mm = 0usize;
        for (b, m) in window.iter().zip(masks) {
            if SEQ_BASE[*b as usize] & m == 0 {
                mm += 1;
                if mm > max_mismatches { break; }
            }
        }
        if mm <= max_mismatches {
            hits.push(MatchHit { start, end: start + l, mismatches: mm });
        }
    }
    hits
}

/// Exact-match prefilter on the first `K` bases of the forward primer.
pub struct Anchor {
    motif: String,
    ac: AhoCorasick,
}

impl Anchor {
    /// Build an anchor from `primer`. Returns `Ok(None)` when `len == 0` or the
    /// primer is empty. A `len` beyond the primer uses the whole primer.
    pub fn from_primer(primer: &str, len: usize) -> anyhow::Result<Option<Self>> {
        if len == 0 || primer.is_empty() {
            return Ok(None);
        }
        let motif: String = primer.chars().take(len).collect::<String>().to_ascii_uppercase();
        let ac = AhoCorasick::new([motif.as_bytes()])?;
        Ok(Some(Self { motif, ac }))
    }

    pub fn motif(&self) -> &str { &self.motif }

    /// `true` if the anchor occurs verbatim in `seq`.
    pub fn occurs_in(&self, seq: &[u8]) -> bool { self.ac.is_match(seq) }
}
