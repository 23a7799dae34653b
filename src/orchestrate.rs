//! One task per primer pair, at most `W` running at a time.
//!
//! ### Design
//! - A dedicated Rayon pool of `W` threads bounds concurrency; queued jobs are
//!   the *pending* tasks.
//! - Every task owns a clone of the completion channel's sender and reports
//!   `Started`/`Finished` events. The orchestrator drops its own sender after
//!   dispatch, so `recv()` fails exactly when no task can report any more. A task
//!   that dies still drops its sender, and the wait loop ends.
//! - Panics are caught per task and recorded as [`TaskState::Failed`]; a failed
//!   task publishes no artifact, and one left in the artifact directory by an
//!   earlier run is removed.
//! - Tasks share only read-only inputs (sequence supply, parameters). Each one
//!   opens its own pass over the sequence collection.
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::Result;
use log::{debug, error, info};
use rayon::ThreadPoolBuilder;

use crate::aggregate::{fasta_file_name, remove_stale_artifact, write_fasta_artifact, ResultAggregator, TaskArtifact};
use crate::amplicon::{extract_amplicons, AmpliconRecord};
use crate::config::MatchParams;
use crate::error::PcrError;
use crate::matcher::{find_matches, Anchor};
use crate::primer::{PairProfiles, PrimerPair};
use crate::seqio::SequenceSupply;

/// Lifecycle of one pair task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState { Pending, Running, Completed, Failed }

/// Final state of one task, in submission order.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub pair_id: String,
    pub state: TaskState,
    pub amplicons: usize,
    pub error: Option<String>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub aggregator: ResultAggregator,
    pub reports: Vec<TaskReport>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.iter().filter(|r| r.state == TaskState::Failed)
    }
}

enum TaskEvent {
    Started(usize),
    Finished(usize, std::result::Result<TaskArtifact, String>),
}

/// Scan the whole collection for one primer pair.
///
/// Builds the pair's profiles and anchor once, then streams every record:
/// anchor check, forward scan, reverse-complement scan, pairing. Hit numbers
/// restart at 1 for each sample.
pub fn run_pair_task(pair: &PrimerPair, supply: &dyn SequenceSupply, params: &MatchParams) -> Result<Vec<AmpliconRecord>> {
    let profiles = PairProfiles::for_pair(pair);
    let anchor = Anchor::from_primer(&pair.forward, params.anchor_len)?;
    let mut per_sample: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    let (mut scanned, mut filtered) = (0usize, 0usize);

    for rec in supply.stream()? {
        let rec = rec?;
        scanned += 1;
        if let Some(a) = &anchor {
            if !a.occurs_in(&rec.seq) {
                filtered += 1;
                continue;
            }
        }
        let fwd = find_matches(&rec.seq, &profiles.forward, params.max_mismatches);
        if fwd.is_empty() { continue; }
        let rev = find_matches(&rec.seq, &profiles.reverse_rc, params.max_mismatches);
        for c in extract_amplicons(&rec.seq, &fwd, &rev, params.lengths) {
            let n = per_sample.entry(rec.sample.clone()).or_insert(0);
            *n += 1;
            out.push(AmpliconRecord {
                pair_id: pair.id.clone(),
                sample_name: rec.sample.clone(),
                source_file: rec.source_file.clone(),
                seq_id: rec.id.clone(),
                hit_index: *n,
                forward: c.forward,
                reverse: c.reverse,
                length: c.length,
                sequence: c.sequence,
                forward_primer: pair.forward.clone(),
                reverse_primer: pair.reverse.clone(),
            });
        }
    }
    debug!("pair {}: scanned {} records, {} rejected by anchor, {} amplicons", pair.id, scanned, filtered, out.len());
    Ok(out)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Dispatches pair tasks over a bounded pool and collects their artifacts.
pub struct TaskOrchestrator<'s> {
    supply: &'s dyn SequenceSupply,
    params: MatchParams,
    workers: usize,
    artifact_dir: Option<PathBuf>,
}

impl<'s> TaskOrchestrator<'s> {
    pub fn new(supply: &'s dyn SequenceSupply, params: MatchParams, workers: usize) -> Self {
        Self { supply, params, workers: workers.max(1), artifact_dir: None }
    }

    /// Publish each completed pair's FASTA into `dir`.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn workers(&self) -> usize { self.workers }

    /// Run [`run_pair_task`] for every pair.
    pub fn run(&self, pairs: &[PrimerPair]) -> Result<RunSummary> {
        let supply = self.supply;
        let params = self.params;
        self.run_with(pairs, |pair| run_pair_task(pair, supply, &params))
    }

    /// Run an arbitrary per-pair task body under the orchestrator's slot,
    /// failure and artifact rules.
    pub fn run_with<F>(&self, pairs: &[PrimerPair], task: F) -> Result<RunSummary>
    where
        F: Fn(&PrimerPair) -> Result<Vec<AmpliconRecord>> + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("pcr-task-{i}"))
            .build()?;
        info!("dispatching {} pair task(s) on {} worker(s)", pairs.len(), self.workers);

        let mut states = vec![TaskState::Pending; pairs.len()];
        let mut reports: Vec<TaskReport> = pairs
            .iter()
            .map(|p| TaskReport { pair_id: p.id.clone(), state: TaskState::Pending, amplicons: 0, error: None })
            .collect();
        let mut aggregator = ResultAggregator::new();
        let (tx, rx) = mpsc::channel::<TaskEvent>();
        let task = &task;
        let artifact_dir = self.artifact_dir.as_deref();

        pool.in_place_scope(|s| {
            for (i, pair) in pairs.iter().enumerate() {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let _ = tx.send(TaskEvent::Started(i));
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(pair, task, artifact_dir)));
                    let result = match outcome {
                        Ok(Ok(artifact)) => Ok(artifact),
                        Ok(Err(e)) => Err(format!("{e:#}")),
                        Err(payload) => Err(PcrError::TaskPanicked {
                            pair_id: pair.id.clone(),
                            message: panic_message(payload.as_ref()),
                        }
                        .to_string()),
                    };
                    let _ = tx.send(TaskEvent::Finished(i, result));
                });
            }
            drop(tx);

            while let Ok(event) = rx.recv() {
                match event {
                    TaskEvent::Started(i) => {
                        states[i] = TaskState::Running;
                        debug!("pair {}: running", pairs[i].id);
                    }
                    TaskEvent::Finished(i, Ok(artifact)) => {
                        states[i] = TaskState::Completed;
                        reports[i].amplicons = artifact.amplicons.len();
                        info!("pair {}: {} amplicon(s)", pairs[i].id, artifact.amplicons.len());
                        aggregator.publish(i, artifact);
                    }
                    TaskEvent::Finished(i, Err(msg)) => {
                        states[i] = TaskState::Failed;
                        error!("pair {} failed: {}", pairs[i].id, msg);
                        reports[i].error = Some(msg);
                    }
                }
            }
        });

        for (report, state) in reports.iter_mut().zip(states) {
            report.state = match state {
                TaskState::Pending | TaskState::Running => {
                    if report.error.is_none() {
                        report.error = Some("task ended without reporting".to_string());
                    }
                    TaskState::Failed
                }
                done => done,
            };
        }
        if let Some(dir) = artifact_dir {
            let published: Vec<String> = aggregator.pair_ids().iter().map(|id| fasta_file_name(id)).collect();
            for report in reports.iter().filter(|r| r.state == TaskState::Failed) {
                if published.contains(&fasta_file_name(&report.pair_id)) {
                    continue;
                }
                if let Err(e) = remove_stale_artifact(dir, &report.pair_id) {
                    error!("pair {}: {e:#}", report.pair_id);
                }
            }
        }
        Ok(RunSummary { aggregator, reports })
    }
}

fn execute<F>(pair: &PrimerPair, task: &F, artifact_dir: Option<&Path>) -> Result<TaskArtifact>
where
    F: Fn(&PrimerPair) -> Result<Vec<AmpliconRecord>>,
{
    let amplicons = task(pair)?;
    let fasta = match artifact_dir {
        Some(dir) => Some(write_fasta_artifact(dir, &pair.id, &amplicons)?),
        None => None,
    };
    Ok(TaskArtifact { pair: pair.clone(), amplicons, fasta })
}
