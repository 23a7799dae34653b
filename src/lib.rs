#![forbid(unsafe_code)]
//! # ampliscan
//!
//! Parallel **in-silico PCR** over multi-FASTA genome collections. Primer pairs
//! (with IUPAC degenerate codes) are matched with a fixed mismatch budget, and
//! every forward/reverse combination within the amplicon length bounds is
//! reported as an amplicon.
//!
//! ## Highlights
//! - 🧬 **Degeneracy-aware**: primers are compiled to per-position allowed-base masks.
//! - ⚡ **Early exit**: window scans stop as soon as the mismatch budget is exceeded.
//! - 🧵 **One task per primer pair** on a bounded Rayon pool; results merge in
//!   lexical pair-id order, independent of the worker count.
//! - 💾 **Streaming input**: genomes are read one record at a time with `needletail`.
//!
//! ## Outputs
//! - `<pair>_amplicons.fasta` per primer pair (published only when complete).
//! - `amplicons_summary.csv` with one row per amplicon. Start columns are the
//!   0-based start plus one; end columns are the 0-based exclusive end.
//!
//! ## Examples
//! ```rust
//! use ampliscan::{matcher::find_matches, primer::build_profile};
//! let hits = find_matches(b"GGACGTNN", &build_profile("ACGN"), 0);
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].start, 2);
//! ```
//!
//! ```no_run
//! use ampliscan::config::{MatchParams, PcrOpts};
//! let opts = PcrOpts {
//!     fasta_dir: "genomes".into(),
//!     primers: "primers.csv".into(),
//!     out_dir: "out".into(),
//!     params: MatchParams::default(),
//!     workers: None,
//! };
//! let summary = ampliscan::run_pcr(&opts).unwrap();
//! println!("{} amplicons", summary.aggregator.total());
//! ```

pub mod aggregate;
pub mod amplicon;
pub mod config;
pub mod error;
pub mod matcher;
pub mod orchestrate;
pub mod primer;
pub mod seqio;
pub mod table;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::PcrOpts;
use crate::orchestrate::{RunSummary, TaskOrchestrator};
use crate::seqio::FastaDir;

pub use crate::error::PcrError;

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a complete in-silico PCR: load primers, discover genomes, scan every
/// pair, publish FASTA artifacts and the summary CSV into `opts.out_dir`.
///
/// All input checks happen before the output directory is touched, so a bad
/// primer table or an empty genome directory leaves no partial output behind.
/// Failed pair tasks are reported in [`RunSummary::reports`] and contribute no
/// rows.
pub fn run_pcr(opts: &PcrOpts) -> Result<RunSummary> {
    opts.validate()?;
    let pairs = table::load_primer_table(&opts.primers)?;
    let supply = FastaDir::discover(&opts.fasta_dir)?;
    supply.ensure_readable()?;
    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("creating output directory {}", opts.out_dir.display()))?;

    let workers = opts.effective_workers();
    info!(
        "{} primer pair(s) x {} FASTA file(s) | max_mismatch={} | len={}..={} | anchor={} | workers={}",
        pairs.len(),
        supply.files().len(),
        opts.params.max_mismatches,
        opts.params.lengths.min,
        opts.params.lengths.max,
        opts.params.anchor_len,
        workers
    );

    let summary = TaskOrchestrator::new(&supply, opts.params, workers)
        .with_artifact_dir(&opts.out_dir)
        .run(&pairs)?;
    summary.aggregator.write_summary_csv(&opts.out_dir)?;

    let failed = summary.failed().count();
    if failed > 0 {
        warn!("{failed} of {} pair task(s) failed and contributed no amplicons", pairs.len());
    }
    Ok(summary)
}

/// Return `(position, symbol, allowed_bases)` rows describing a primer's
/// allele profile (1-based positions), for CLI/UX.
///
/// # Examples
/// ```
/// let rows = ampliscan::primer_profile_rows("AY");
/// assert_eq!(rows[1], (2, 'Y', "CT".to_string()));
/// ```
pub fn primer_profile_rows(primer: &str) -> Vec<(usize, char, String)> {
    let p = primer::build_profile(primer);
    primer
        .chars()
        .enumerate()
        .map(|(i, c)| (i + 1, c.to_ascii_uppercase(), String::from_utf8_lossy(&p.allowed_bases(i)).into_owned()))
        .collect()
}

#[cfg(test)]
mod profile_rows_tests {
    use super::*;
    #[test]
    fn wildcard_rows() {
        let rows = primer_profile_rows("n?");
        assert_eq!(rows, vec![(1, 'N', "ACGT".to_string()), (2, '?', "ACGT".to_string())]);
        assert_eq!(primer_profile_rows("aé").len(), 2);
    }
}

#[cfg(test)]
mod run_tests {
    use super::*;
    use crate::aggregate::SUMMARY_FILE;
    use crate::config::MatchParams;
    use crate::amplicon::LengthRange;
    use crate::primer::reverse_complement;
    use std::path::Path;

    const FWD: &str = "AGAGTTTGATCCTGGCTCAG";
    const REV: &str = "TACGGTTACCTTGTTACGAC";

    fn setup(root: &Path) -> PcrOpts {
        let genomes = root.join("genomes");
        std::fs::create_dir_all(&genomes).unwrap();
        let insert = "ACGT".repeat(15);
        let amplicon = format!("{FWD}{insert}{}", reverse_complement(REV));
        let wrapped: Vec<String> = format!("TTTTT{amplicon}TTTTT")
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        std::fs::write(genomes.join("strainA.fasta"), format!(">chrA desc\n{}\n", wrapped.join("\n"))).unwrap();
        std::fs::write(genomes.join("strainB.fa"), format!(">chrB\n{}\n>plasmid\nGGGGGGGGGG\n", amplicon.to_lowercase())).unwrap();
        std::fs::write(genomes.join("notes.txt"), "ignored").unwrap();
        std::fs::write(root.join("primers.csv"), format!("pair_id,forward,reverse\n16S/27F,{FWD},{REV}\nnone,CCCCCCCCCCCCCCCCCCCC,AAAAAAAAAAAAAAAAAAAT\n")).unwrap();
        PcrOpts {
            fasta_dir: genomes,
            primers: root.join("primers.csv"),
            out_dir: root.join("out"),
            params: MatchParams { max_mismatches: 2, lengths: LengthRange { min: 50, max: 500 }, anchor_len: 0 },
            workers: Some(2),
        }
    }

    #[test]
    fn end_to_end_run_publishes_artifacts() {
        let td = tempfile::tempdir().unwrap();
        let opts = setup(td.path());
        let summary = run_pcr(&opts).unwrap();
        assert_eq!(summary.failed().count(), 0);
        let amps = summary.aggregator.amplicons_for("16S/27F");
        assert_eq!(amps.len(), 2);
        assert_eq!(amps[0].sample_name, "strainA");
        assert_eq!(amps[0].seq_id, "chrA");
        assert_eq!(amps[0].forward.start, 5);
        assert_eq!(amps[0].length, 20 + 60 + 20);
        assert_eq!(amps[1].source_file, "strainB.fa");
        assert!(summary.aggregator.amplicons_for("none").is_empty());

        let out = &opts.out_dir;
        let fasta = std::fs::read_to_string(out.join("16S_27F_amplicons.fasta")).unwrap();
        assert!(fasta.starts_with(">16S/27F_strainA_hit1|len=100|fwd=AGAGTTTGATCCTGGCTCAG|rev=TACGGTTACCTTGTTACGAC\n"));
        assert!(fasta.contains(">16S/27F_strainB_hit1|len=100|"));
        assert_eq!(std::fs::read_to_string(out.join("none_amplicons.fasta")).unwrap(), "");

        let csv = std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], format!("16S/27F,strainA.fasta,strainA,chrA,6,25,86,105,0,0,100,{FWD},{REV}"));
    }

    #[test]
    fn summary_is_identical_across_worker_counts() {
        let td = tempfile::tempdir().unwrap();
        let mut opts = setup(td.path());
        opts.workers = Some(1);
        run_pcr(&opts).unwrap();
        let one = std::fs::read_to_string(opts.out_dir.join(SUMMARY_FILE)).unwrap();
        opts.workers = Some(8);
        run_pcr(&opts).unwrap();
        let many = std::fs::read_to_string(opts.out_dir.join(SUMMARY_FILE)).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn fatal_inputs_leave_no_output() {
        let td = tempfile::tempdir().unwrap();
        let opts = setup(td.path());
        std::fs::write(&opts.primers, "pair_id,forward,reverse\n").unwrap();
        let err = run_pcr(&opts).unwrap_err();
        assert!(matches!(err.downcast_ref::<PcrError>(), Some(PcrError::EmptyPrimerTable(_))));
        assert!(!opts.out_dir.exists());

        let opts = PcrOpts { fasta_dir: td.path().join("missing"), ..setup(td.path()) };
        assert!(run_pcr(&opts).is_err());
        assert!(!opts.out_dir.exists());

        let mut opts = setup(td.path());
        opts.params.lengths = LengthRange { min: 10, max: 1 };
        assert!(run_pcr(&opts).is_err());
    }
}
