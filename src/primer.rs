//! Primer model: **IUPAC allele profiles** and **reverse complements**.
//!
//! A primer string is turned into an [`AlleleProfile`], one allowed-base set per
//! primer position. Sets are stored as 4-bit masks (`A=1, C=2, G=4, T=8`) so a
//! window comparison is a single table lookup and `&` per position.
//!
//! # Degenerate codes
//! | code | bases    | code | bases  |
//! |------|----------|------|--------|
//! | A    | A        | K    | G/T    |
//! | C    | C        | M    | A/C    |
//! | G    | G        | B    | C/G/T  |
//! | T, U | T        | D    | A/G/T  |
//! | R    | A/G      | H    | A/C/T  |
//! | Y    | C/T      | V    | A/C/G  |
//! | S    | G/C      | N    | A/C/G/T|
//! | W    | A/T      |      |        |
//!
//! Any other character is a full wildcard. This is a lenient policy, not an
//! error path: a typo in a primer widens the match instead of aborting a run.
//!
//! # Examples
//! ```
//! use ampliscan::primer::{build_profile, reverse_complement};
//! let p = build_profile("ACN");
//! assert_eq!(p.len(), 3);
//! assert_eq!(p.allowed_bases(2), b"ACGT".to_vec());
//! assert_eq!(reverse_complement("AAGG"), "CCTT");
//! ```
use core::fmt;

pub const BASE_A: u8 = 0b0001;
pub const BASE_C: u8 = 0b0010;
pub const BASE_G: u8 = 0b0100;
pub const BASE_T: u8 = 0b1000;
pub const ANY_BASE: u8 = BASE_A | BASE_C | BASE_G | BASE_T;

const fn iupac_table() -> [u8; 256] {
    let mut t = [ANY_BASE; 256];
    let codes: [(u8, u8); 16] = [
        (b'A', BASE_A),
        (b'C', BASE_C),
        (b'G', BASE_G),
        (b'T', BASE_T),
        (b'U', BASE_T),
        (b'R', BASE_A | BASE_G),
        (b'Y', BASE_C | BASE_T),
        (b'S', BASE_G | BASE_C),
        (b'W', BASE_A | BASE_T),
        (b'K', BASE_G | BASE_T),
        (b'M', BASE_A | BASE_C),
        (b'B', BASE_C | BASE_G | BASE_T),
        (b'D', BASE_A | BASE_G | BASE_T),
        (b'H', BASE_A | BASE_C | BASE_T),
        (b'V', BASE_A | BASE_C | BASE_G),
        (b'N', ANY_BASE),
    ];
    let mut i = 0;
    while i < codes.len() {
        let (upper, mask) = codes[i];
        t[upper as usize] = mask;
        t[upper.to_ascii_lowercase() as usize] = mask;
        i += 1;
    }
    t
}

const fn base_table() -> [u8; 256] {
    let mut t = [0u8; 256];
    t[b'A' as usize] = BASE_A;
    t[b'C' as usize] = BASE_C;
    t[b'G' as usize] = BASE_G;
    t[b'T' as usize] = BASE_T;
    t[b'a' as usize] = BASE_A;
    t[b'c' as usize] = BASE_C;
    t[b'g' as usize] = BASE_G;
    t[b't' as usize] = BASE_T;
    t
}

/// Primer symbol -> allowed-base mask. Unknown symbols map to [`ANY_BASE`].
pub static IUPAC: [u8; 256] = iupac_table();

/// Sequence base -> single-bit mask. Anything but A/C/G/T maps to `0` and can
/// therefore never satisfy a profile position.
pub static SEQ_BASE: [u8; 256] = base_table();

/// Position-indexed allowed-nucleotide sets for one primer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlleleProfile {
    masks: Vec<u8>,
}

impl AlleleProfile {
    pub fn len(&self) -> usize { self.masks.len() }

    pub fn is_empty(&self) -> bool { self.masks.is_empty() }

    /// Raw 4-bit masks, one per primer position.
    pub fn masks(&self) -> &[u8] { &self.masks }

    /// `true` if sequence base `b` is allowed at position `pos`.
    #[inline]
    pub fn allows(&self, pos: usize, b: u8) -> bool {
        self.masks[pos] & SEQ_BASE[b as usize] != 0
    }

    /// The allowed bases at `pos`, in `ACGT` order.
    pub fn allowed_bases(&self, pos: usize) -> Vec<u8> {
        let m = self.masks[pos];
        [(BASE_A, b'A'), (BASE_C, b'C'), (BASE_G, b'G'), (BASE_T, b'T')]
            .iter()
            .filter(|(bit, _)| m & bit != 0)
            .map(|(_, b)| *b)
            .collect()
    }
}

impl fmt::Display for AlleleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            if i > 0 { f.write_str(" ")?; }
            let bases = self.allowed_bases(i);
            if bases.len() == 1 {
                write!(f, "{}", bases[0] as char)?;
            } else {
                write!(f, "[{}]", String::from_utf8_lossy(&bases))?;
            }
        }
        Ok(())
    }
}

/// Build the allele profile for `primer` (case-insensitive). Each character is
/// one position; non-ASCII characters are wildcards.
pub fn build_profile(primer: &str) -> AlleleProfile {
    let masks = primer
        .chars()
        .map(|c| if c.is_ascii() { IUPAC[c as usize] } else { ANY_BASE })
        .collect();
    AlleleProfile { masks }
}

/// Reverse complement of `seq`: uppercase, `U` read as `T`, `A<->T`, `C<->G`,
/// and IUPAC codes to their complementary set (`R<->Y`, `K<->M`, `B<->V`,
/// `D<->H`; `S`, `W`, `N` are self-complementary). Other characters are
/// carried through unchanged.
pub fn reverse_complement(seq: &str) -> String {
    fn comp(c: char) -> char {
        match c.to_ascii_uppercase() {
            'A' => 'T',
            'T' | 'U' => 'A',
            'C' => 'G',
            'G' => 'C',
            'R' => 'Y',
            'Y' => 'R',
            'K' => 'M',
            'M' => 'K',
            'B' => 'V',
            'V' => 'B',
            'D' => 'H',
            'H' => 'D',
            other => other,
        }
    }
    seq.chars().rev().map(comp).collect()
}

/// A named forward/reverse primer pair, uppercased at construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrimerPair {
    pub id: String,
    pub forward: String,
    pub reverse: String,
}

impl PrimerPair {
    pub fn new(id: impl Into<String>, forward: &str, reverse: &str) -> Self {
        Self {
            id: id.into(),
            forward: forward.trim().to_ascii_uppercase(),
            reverse: reverse.trim().to_ascii_uppercase(),
        }
    }

    /// Reverse primer as it binds on the plus strand.
    pub fn reverse_rc(&self) -> String { reverse_complement(&self.reverse) }
}

/// Profiles derived from a [`PrimerPair`], built once per task.
#[derive(Clone, Debug)]
pub struct PairProfiles {
    pub forward: AlleleProfile,
    pub reverse_rc: AlleleProfile,
}

impl PairProfiles {
    pub fn for_pair(pair: &PrimerPair) -> Self {
        Self {
            forward: build_profile(&pair.forward),
            reverse_rc: build_profile(&pair.reverse_rc()),
        }
    }
}
