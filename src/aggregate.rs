//! Task artifacts and their deterministic merge.
//!
//! A [`TaskArtifact`] is only ever built from a task that ran to completion, so
//! the aggregator never sees a partial amplicon set. On disk the per-pair FASTA
//! and the summary CSV are written to a temporary file in the output directory
//! and renamed into place once complete.
//!
//! Merge order is the lexical order of pair id, then task submission order for
//! duplicate ids. It does not depend on which task finished first.
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::{info, warn};
use polars::prelude::*;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::amplicon::AmpliconRecord;
use crate::primer::PrimerPair;

/// FASTA line width for amplicon sequences.
pub const FASTA_WIDTH: usize = 80;

/// Summary file name inside the output directory.
pub const SUMMARY_FILE: &str = "amplicons_summary.csv";

/// Column order of the combined summary table.
pub const SUMMARY_COLUMNS: [&str; 13] = [
    "pair_id",
    "fasta_file",
    "sample_name",
    "seq_id",
    "fwd_start_1based",
    "fwd_end_1based",
    "rev_start_1based",
    "rev_end_1based",
    "fwd_mismatches",
    "rev_mismatches",
    "amplicon_length",
    "fwd_primer",
    "rev_primer",
];

/// The complete output of one finished pair task.
#[derive(Debug, Clone)]
pub struct TaskArtifact {
    pub pair: PrimerPair,
    pub amplicons: Vec<AmpliconRecord>,
    /// Published FASTA file, when the task wrote one.
    pub fasta: Option<PathBuf>,
}

/// Ordered collection of published task artifacts.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    artifacts: Vec<(usize, TaskArtifact)>,
}

impl ResultAggregator {
    pub fn new() -> Self { Self::default() }

    /// Accept a finished artifact; `order` is the task's submission index.
    pub fn publish(&mut self, order: usize, artifact: TaskArtifact) {
        let key = (artifact.pair.id.clone(), order);
        let pos = self
            .artifacts
            .partition_point(|(o, a)| (a.pair.id.as_str(), *o) <= (key.0.as_str(), key.1));
        self.artifacts.insert(pos, (order, artifact));
    }

    /// Artifacts in merge order.
    pub fn artifacts(&self) -> impl Iterator<Item = &TaskArtifact> {
        self.artifacts.iter().map(|(_, a)| a)
    }

    /// Pair ids in merge order (one entry per published artifact).
    pub fn pair_ids(&self) -> Vec<&str> {
        self.artifacts().map(|a| a.pair.id.as_str()).collect()
    }

    /// All amplicons of `pair_id`, in discovery order.
    pub fn amplicons_for(&self, pair_id: &str) -> Vec<&AmpliconRecord> {
        self.artifacts()
            .filter(|a| a.pair.id == pair_id)
            .flat_map(|a| a.amplicons.iter())
            .collect()
    }

    /// Every amplicon, concatenated in merge order.
    pub fn records(&self) -> impl Iterator<Item = &AmpliconRecord> {
        self.artifacts().flat_map(|a| a.amplicons.iter())
    }

    pub fn total(&self) -> usize { self.artifacts().map(|a| a.amplicons.len()).sum() }

    /// Combined summary table; see [`SUMMARY_COLUMNS`].
    ///
    /// Starts are reported as 0-based start + 1, ends as the 0-based exclusive
    /// end unchanged. This mixed convention is kept as-is for compatibility
    /// with existing summaries and is not normalized here.
    pub fn summary_frame(&self) -> PolarsResult<DataFrame> {
        let recs: Vec<&AmpliconRecord> = self.records().collect();
        let text = |f: fn(&AmpliconRecord) -> &str| recs.iter().map(|r| f(r).to_string()).collect::<Vec<_>>();
        let num = |f: fn(&AmpliconRecord) -> usize| recs.iter().map(|r| f(r) as u64).collect::<Vec<_>>();
        df!(
            SUMMARY_COLUMNS[0]  => text(|r| r.pair_id.as_str()),
            SUMMARY_COLUMNS[1]  => text(|r| r.source_file.as_str()),
            SUMMARY_COLUMNS[2]  => text(|r| r.sample_name.as_str()),
            SUMMARY_COLUMNS[3]  => text(|r| r.seq_id.as_str()),
            SUMMARY_COLUMNS[4]  => num(|r| r.forward.start + 1),
            SUMMARY_COLUMNS[5]  => num(|r| r.forward.end),
            SUMMARY_COLUMNS[6]  => num(|r| r.reverse.start + 1),
            SUMMARY_COLUMNS[7]  => num(|r| r.reverse.end),
            SUMMARY_COLUMNS[8]  => num(|r| r.forward.mismatches),
            SUMMARY_COLUMNS[9]  => num(|r| r.reverse.mismatches),
            SUMMARY_COLUMNS[10] => num(|r| r.length),
            SUMMARY_COLUMNS[11] => text(|r| r.forward_primer.as_str()),
            SUMMARY_COLUMNS[12] => text(|r| r.reverse_primer.as_str()),
        )
    }

    /// Per-pair amplicon and sample counts, in merge order.
    pub fn counts_frame(&self) -> PolarsResult<DataFrame> {
        let ids: Vec<String> = self.artifacts().map(|a| a.pair.id.clone()).collect();
        let amplicons: Vec<u64> = self.artifacts().map(|a| a.amplicons.len() as u64).collect();
        let samples: Vec<u64> = self
            .artifacts()
            .map(|a| {
                let mut s: Vec<&str> = a.amplicons.iter().map(|r| r.sample_name.as_str()).collect();
                s.sort_unstable();
                s.dedup();
                s.len() as u64
            })
            .collect();
        df!(
            "pair_id" => ids,
            "amplicons" => amplicons,
            "samples" => samples,
        )
    }

    /// Write the summary CSV into `out_dir`, replacing any previous one atomically.
    pub fn write_summary_csv(&self, out_dir: &Path) -> Result<PathBuf> {
        let mut df = self.summary_frame()?;
        let dest = out_dir.join(SUMMARY_FILE);
        let mut tmp = NamedTempFile::new_in(out_dir).with_context(|| format!("creating temporary file in {}", out_dir.display()))?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            CsvWriter::new(&mut w).include_header(true).finish(&mut df)?;
            w.flush()?;
        }
        tmp.persist(&dest).with_context(|| format!("publishing {}", dest.display()))?;
        info!("wrote summary ({} amplicons) -> {}", df.height(), dest.display());
        Ok(dest)
    }
}

static UNSAFE_RUN: OnceLock<Regex> = OnceLock::new();

/// Replace every run of characters outside `[A-Za-z0-9_.-]` with `_`.
pub fn safe_name(s: &str) -> String {
    let re = UNSAFE_RUN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("literal pattern compiles"));
    re.replace_all(s, "_").into_owned()
}

/// File name of a pair's FASTA artifact.
pub fn fasta_file_name(pair_id: &str) -> String { format!("{}_amplicons.fasta", safe_name(pair_id)) }

/// Remove a pair's FASTA artifact left over from an earlier run. Returns
/// whether a file was removed.
pub fn remove_stale_artifact(dir: &Path, pair_id: &str) -> Result<bool> {
    let path = dir.join(fasta_file_name(pair_id));
    match std::fs::remove_file(&path) {
        Ok(()) => {
            warn!("removed stale artifact {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing stale artifact {}", path.display())),
    }
}

/// Render amplicons as multi-FASTA, sequences wrapped at [`FASTA_WIDTH`].
pub fn render_fasta<W: Write>(w: &mut W, records: &[AmpliconRecord]) -> std::io::Result<()> {
    for r in records {
        writeln!(w, ">{}", r.fasta_header())?;
        for line in r.sequence.chunks(FASTA_WIDTH) {
            w.write_all(line)?;
            w.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Write a pair's FASTA artifact into `dir`; the file appears only once complete.
pub fn write_fasta_artifact(dir: &Path, pair_id: &str, records: &[AmpliconRecord]) -> Result<PathBuf> {
    let dest = dir.join(fasta_file_name(pair_id));
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("creating temporary file in {}", dir.display()))?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        render_fasta(&mut w, records)?;
        w.flush()?;
    }
    tmp.persist(&dest).with_context(|| format!("publishing {}", dest.display()))?;
    info!("wrote {} amplicons -> {}", records.len(), dest.display());
    Ok(dest)
}
