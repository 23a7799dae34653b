//! Run parameters shared by the CLI and the library entry points.
use std::path::PathBuf;

use crate::amplicon::LengthRange;
use crate::error::PcrError;

/// Matching parameters applied to every primer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchParams {
    /// Maximum mismatches per primer.
    pub max_mismatches: usize,
    pub lengths: LengthRange,
    /// Exact-anchor prefilter length on the forward primer; `0` disables it.
    pub anchor_len: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self { max_mismatches: 2, lengths: LengthRange { min: 20, max: 20_000 }, anchor_len: 0 }
    }
}

impl MatchParams {
    pub fn validate(&self) -> Result<(), PcrError> {
        if self.lengths.min > self.lengths.max {
            return Err(PcrError::InvalidLengthRange { min: self.lengths.min, max: self.lengths.max });
        }
        Ok(())
    }
}

/// Options for a full run over a FASTA directory.
#[derive(Debug, Clone)]
pub struct PcrOpts {
    pub fasta_dir: PathBuf,
    pub primers: PathBuf,
    pub out_dir: PathBuf,
    pub params: MatchParams,
    /// Concurrent pair tasks (`None`/`0` = all logical cores).
    pub workers: Option<usize>,
}

impl PcrOpts {
    pub fn validate(&self) -> Result<(), PcrError> { self.params.validate() }

    pub fn effective_workers(&self) -> usize { effective_workers(self.workers) }
}

/// Resolve a worker request; `None` and `Some(0)` mean "all cores".
pub fn effective_workers(requested: Option<usize>) -> usize {
    match requested {
        Some(n) if n > 0 => n,
        _ => num_cpus::get().max(1),
    }
}
