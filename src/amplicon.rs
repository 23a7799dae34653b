//! Pairing forward and reverse primer hits into **amplicons**.
//!
//! The reverse primer is searched as its reverse complement on the plus strand,
//! so an amplicon spans from the forward hit's start to the reverse hit's end.
//! Every `(forward, reverse)` combination is considered; hit counts per
//! sequence are small, so the quadratic pairing stays cheap.
use crate::matcher::MatchHit;

/// A forward/reverse hit combination that passed the length bounds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AmpliconCandidate {
    pub forward: MatchHit,
    pub reverse: MatchHit,
    pub length: usize,
    pub sequence: Vec<u8>,
}

/// Inclusive amplicon length bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LengthRange {
    pub min: usize,
    pub max: usize,
}

impl LengthRange {
    #[inline]
    pub fn contains(&self, len: usize) -> bool { len >= self.min && len <= self.max }
}

/// Combine hit lists found in `seq`. Forward hits drive the outer loop, so
/// candidates come out in discovery order.
pub fn extract_amplicons(seq: &[u8], fwd: &[MatchHit], rev: &[MatchHit], range: LengthRange) -> Vec<AmpliconCandidate> {
    let mut out = Vec::new();
    for f in fwd {
        for r in rev {
            if f.start > r.start { continue; }
            let length = r.end - f.start;
            if !range.contains(length) { continue; }
            out.push(AmpliconCandidate {
                forward: *f,
                reverse: *r,
                length,
                sequence: seq[f.start..r.end].to_vec(),
            });
        }
    }
    out
}

/// One simulated PCR product, as reported downstream.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AmpliconRecord {
    pub pair_id: String,
    pub sample_name: String,
    /// File name the sequence came from (e.g. `genome.fasta`).
    pub source_file: String,
    pub seq_id: String,
    /// 1-based hit number within this pair and sample, in discovery order.
    pub hit_index: usize,
    pub forward: MatchHit,
    pub reverse: MatchHit,
    pub length: usize,
    pub sequence: Vec<u8>,
    pub forward_primer: String,
    pub reverse_primer: String,
}

impl AmpliconRecord {
    /// FASTA header: `<pair>_<sample>_hit<N>|len=<len>|fwd=<fwd>|rev=<rev>`.
    pub fn fasta_header(&self) -> String {
        format!(
            "{}_{}_hit{}|len={}|fwd={}|rev={}",
            self.pair_id, self.sample_name, self.hit_index, self.length, self.forward_primer, self.reverse_primer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::find_matches;
    use crate::primer::{build_profile, reverse_complement};

    fn hit(start: usize, end: usize) -> MatchHit { MatchHit { start, end, mismatches: 0 } }

    #[test]
    fn pairs_forward_before_reverse_only() {
        let seq = vec![b'A'; 100];
        let fwd = [hit(10, 15), hit(60, 65)];
        let rev = [hit(40, 45)];
        let c = extract_amplicons(&seq, &fwd, &rev, LengthRange { min: 1, max: 1000 });
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].forward.start, 10);
        assert_eq!(c[0].length, 35);
    }

    #[test]
    fn equal_starts_are_accepted() {
        let seq = vec![b'A'; 20];
        let c = extract_amplicons(&seq, &[hit(3, 8)], &[hit(3, 8)], LengthRange { min: 5, max: 5 });
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].sequence.len(), 5);
    }

    #[test]
    fn length_bounds_are_inclusive_and_enforced() {
        let seq = vec![b'C'; 200];
        let fwd = [hit(0, 10)];
        let rev = [hit(20, 30), hit(40, 50), hit(90, 100)];
        let c = extract_amplicons(&seq, &fwd, &rev, LengthRange { min: 30, max: 50 });
        let lens: Vec<usize> = c.iter().map(|a| a.length).collect();
        assert_eq!(lens, vec![30, 50]);
        for a in &c {
            assert_eq!(a.length, a.reverse.end - a.forward.start);
            assert!(a.forward.start <= a.reverse.start);
        }
    }

    #[test]
    fn end_to_end_on_small_template() {
        let fwd = "ACGTTGCA";
        let rev = "GGATCCTA";
        let template = format!("TTTT{}CCCCCCCCCCCCCCCC{}TTTT", fwd, reverse_complement(rev));
        let seq = template.as_bytes();
        let f = find_matches(seq, &build_profile(fwd), 0);
        let r = find_matches(seq, &build_profile(&reverse_complement(rev)), 0);
        let c = extract_amplicons(seq, &f, &r, LengthRange { min: 10, max: 100 });
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].length, 8 + 16 + 8);
        assert_eq!(&c[0].sequence[..8], fwd.as_bytes());
    }

    #[test]
    fn header_format() {
        let r = AmpliconRecord {
            pair_id: "16S".into(),
            sample_name: "ecoli".into(),
            source_file: "ecoli.fa".into(),
            seq_id: "chr".into(),
            hit_index: 2,
            forward: hit(0, 4),
            reverse: hit(10, 14),
            length: 14,
            sequence: b"ACGTACGTACGTAC".to_vec(),
            forward_primer: "ACGT".into(),
            reverse_primer: "GTAC".into(),
        };
        assert_eq!(r.fasta_header(), "16S_ecoli_hit2|len=14|fwd=ACGT|rev=GTAC");
    }
}
