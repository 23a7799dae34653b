use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use polars::prelude::*;

use ampliscan::amplicon::LengthRange;
use ampliscan::config::{MatchParams, PcrOpts};

/// ampliscan CLI
#[derive(Parser)]
#[command(name = "ampliscan")]
#[command(version)]
#[command(about = "Parallel in-silico PCR over FASTA collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every FASTA file in a directory with every primer pair of a CSV
    Run {
        /// Directory with FASTA files (.fa/.fasta/.fna/.ffn, optionally .gz)
        #[arg(long)]
        fasta_dir: PathBuf,
        /// CSV with primer pairs (columns like forward, reverse, optional id)
        #[arg(long)]
        primers: PathBuf,
        /// Directory for per-pair multi-FASTA files and the summary CSV
        #[arg(long)]
        out_dir: PathBuf,
        /// Maximum mismatches allowed per primer
        #[arg(long, default_value_t = 2)]
        max_mismatch: usize,
        /// Minimum amplicon length (inclusive)
        #[arg(long, default_value_t = 20)]
        min_len: usize,
        /// Maximum amplicon length (inclusive)
        #[arg(long, default_value_t = 20000)]
        max_len: usize,
        /// Concurrent primer-pair tasks (0/None = all cores)
        #[arg(long)]
        workers: Option<usize>,
        /// Require this many leading forward-primer bases verbatim (0 = off).
        /// Sites with a mismatch inside the anchor are missed.
        #[arg(long, default_value_t = 0)]
        anchor_len: usize,
    },

    /// Show the allele profile and reverse complement of a primer
    Describe {
        /// Primer sequence (IUPAC codes allowed)
        primer: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { fasta_dir, primers, out_dir, max_mismatch, min_len, max_len, workers, anchor_len } => {
            let opts = PcrOpts {
                fasta_dir,
                primers,
                out_dir,
                params: MatchParams {
                    max_mismatches: max_mismatch,
                    lengths: LengthRange { min: min_len, max: max_len },
                    anchor_len,
                },
                workers,
            };
            cmd_run(&opts)?;
        }

        Commands::Describe { primer } => {
            cmd_describe(&primer)?;
        }
    }

    Ok(())
}

fn set_polars_display() {
    // Read by Polars' pretty-printer: show every row and column untruncated.
    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
    std::env::set_var("POLARS_TABLE_WIDTH", "65535");
}

fn cmd_run(opts: &PcrOpts) -> Result<()> {
    let summary = ampliscan::run_pcr(opts)?;
    let df = summary.aggregator.counts_frame()?;

    set_polars_display();
    println!("{}", df);

    let failed: Vec<String> = summary.failed().map(|r| r.pair_id.clone()).collect();
    if !failed.is_empty() {
        eprintln!("failed pairs (no output): {}", failed.join(", "));
    }
    Ok(())
}

fn cmd_describe(primer: &str) -> Result<()> {
    let rows = ampliscan::primer_profile_rows(primer);
    let df = df!(
        "position" => rows.iter().map(|r| r.0 as u64).collect::<Vec<_>>(),
        "symbol"   => rows.iter().map(|r| r.1.to_string()).collect::<Vec<_>>(),
        "allowed"  => rows.iter().map(|r| r.2.clone()).collect::<Vec<_>>(),
    )?;

    println!("primer: {}", primer.to_ascii_uppercase());
    println!("reverse complement: {}", ampliscan::primer::reverse_complement(primer));
    set_polars_display();
    println!("{}", df);
    Ok(())
}
