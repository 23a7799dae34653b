//! Streaming IO for **FASTA / FASTA.GZ** genome collections.
//!
//! ### Design
//! - Files are discovered in one directory by extension and visited in sorted order.
//! - Records are parsed with `needletail` (gzip-transparent) and yielded one at a
//!   time; the collection is never held in memory.
//! - A [`SequenceSupply`] is restartable: every call to [`SequenceSupply::stream`]
//!   opens a fresh single-pass iterator, so each primer-pair task gets its own.
//!
//! ### Errors
//! Parsing/IO errors are bubbled via `anyhow::Result`; the caller decides
//! whether they fail the task.
//!
//! ### Example
//! ```no_run
//! use ampliscan::seqio::{FastaDir, SequenceSupply};
//! let supply = FastaDir::discover("genomes/").unwrap();
//! for rec in supply.stream().unwrap() {
//!     let rec = rec.unwrap();
//!     println!("{} {} {}", rec.sample, rec.id, rec.seq.len());
//! }
//! ```
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use needletail::errors::{ParseError, ParseErrorKind};
use needletail::{parse_fastx_file, FastxReader};

use crate::error::PcrError;

const FASTA_EXTENSIONS: &[&str] = &["fa", "fasta", "fna", "ffn"];

/// A normalized genome record passed to the matcher.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SequenceRecord {
    /// Header up to the first whitespace.
    pub id: String,
    /// Uppercased sequence.
    pub seq: Vec<u8>,
    /// Sample name, derived from the file name.
    pub sample: String,
    /// File name (no directory) the record came from.
    pub source_file: String,
}

/// Boxed record stream handed to a task.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<SequenceRecord>> + 'a>;

/// A lazy, restartable source of genome records.
pub trait SequenceSupply: Send + Sync {
    /// Open a new pass over the whole collection.
    fn stream(&self) -> Result<RecordStream<'_>>;
}

/// Sample name for a FASTA path: file name without `.gz` and FASTA extension.
pub fn sample_name(path: &Path) -> String {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    let stem = strip_suffix_ci(name, ".gz").unwrap_or(name);
    match stem.rfind('.') {
        Some(i) if i > 0 => stem[..i].to_string(),
        _ => stem.to_string(),
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let n = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(n) && s[n..].eq_ignore_ascii_case(suffix) { Some(&s[..n]) } else { None }
}

fn is_empty_file(e: &ParseError) -> bool {
    matches!(e.kind, ParseErrorKind::EmptyFile)
}

/// `true` for `.fa/.fasta/.fna/.ffn`, optionally followed by `.gz`.
pub fn is_fasta_path(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((_, ext)) => FASTA_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// All FASTA files in a directory, in sorted path order.
#[derive(Debug, Clone)]
pub struct FastaDir {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl FastaDir {
    /// List FASTA files in `dir`. Fails if the directory is unreadable or holds none.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files = Vec::new();
        let entries = std::fs::read_dir(&dir).with_context(|| format!("reading FASTA directory {}", dir.display()))?;
        for entry in entries {
            let p = entry?.path();
            if p.is_file() && is_fasta_path(&p) {
                files.push(p);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(PcrError::NoSequenceFiles(dir).into());
        }
        debug!("discovered {} FASTA file(s) in {}", files.len(), dir.display());
        Ok(Self { dir, files })
    }

    pub fn files(&self) -> &[PathBuf] { &self.files }

    /// Open every file once and make sure at least one record exists.
    pub fn ensure_readable(&self) -> Result<()> {
        let mut any = false;
        for f in &self.files {
            let mut reader = match parse_fastx_file(f) {
                Ok(r) => r,
                Err(e) if is_empty_file(&e) => {
                    warn!("{} contains no records", f.display());
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("opening {}", f.display())),
            };
            match reader.next() {
                Some(Ok(_)) => any = true,
                Some(Err(e)) => return Err(e).with_context(|| format!("parsing {}", f.display())),
                None => warn!("{} contains no records", f.display()),
            }
        }
        if !any {
            return Err(PcrError::EmptySequenceCollection(self.dir.clone()).into());
        }
        Ok(())
    }
}

impl SequenceSupply for FastaDir {
    fn stream(&self) -> Result<RecordStream<'_>> {
        Ok(Box::new(FastaRecords::new(&self.files)))
    }
}

enum Step {
    Record(SequenceRecord),
    Failed(anyhow::Error),
    Exhausted,
}

/// Single-pass iterator over several FASTA files.
///
/// Records with an empty sequence or an id already seen in the same file are
/// skipped with a warning.
pub struct FastaRecords<'a> {
    files: std::slice::Iter<'a, PathBuf>,
    reader: Option<Box<dyn FastxReader>>,
    sample: String,
    source_file: String,
    seen: HashSet<String>,
}

impl<'a> FastaRecords<'a> {
    pub fn new(files: &'a [PathBuf]) -> Self {
        Self {
            files: files.iter(),
            reader: None,
            sample: String::new(),
            source_file: String::new(),
            seen: HashSet::new(),
        }
    }

    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.files.next()?;
        self.sample = sample_name(path);
        self.source_file = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        self.seen.clear();
        match parse_fastx_file(path) {
            Ok(r) => {
                self.reader = Some(r);
                Some(Ok(()))
            }
            Err(e) if is_empty_file(&e) => {
                warn!("{} contains no records", path.display());
                Some(Ok(()))
            }
            Err(e) => Some(Err(anyhow::Error::new(e).context(format!("opening {}", path.display())))),
        }
    }
}

impl Iterator for FastaRecords<'_> {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reader.is_none() {
                if let Err(e) = self.open_next()? {
                    return Some(Err(e));
                }
            }
            let Some(reader) = self.reader.as_mut() else { continue };
            let step = match reader.next() {
                Some(Ok(rec)) => {
                    let head = String::from_utf8_lossy(rec.id());
                    let id = head.split_whitespace().next().unwrap_or("").to_string();
                    let mut seq = rec.seq().into_owned();
                    seq.make_ascii_uppercase();
                    Step::Record(SequenceRecord { id, seq, sample: self.sample.clone(), source_file: self.source_file.clone() })
                }
                Some(Err(e)) => Step::Failed(anyhow::Error::new(e).context(format!("parsing {}", self.source_file))),
                None => Step::Exhausted,
            };
            match step {
                Step::Record(rec) => {
                    if rec.seq.is_empty() {
                        warn!("{}: skipping record '{}' with empty sequence", rec.source_file, rec.id);
                        continue;
                    }
                    if !self.seen.insert(rec.id.clone()) {
                        warn!("{}: skipping duplicate record id '{}'", rec.source_file, rec.id);
                        continue;
                    }
                    return Some(Ok(rec));
                }
                Step::Failed(e) => {
                    self.reader = None;
                    return Some(Err(e));
                }
                Step::Exhausted => self.reader = None,
            }
        }
    }
}

/// In-memory supply, handy for tests and for callers that already hold records.
#[derive(Debug, Clone, Default)]
pub struct MemorySupply {
    pub records: Vec<SequenceRecord>,
}

impl SequenceSupply for MemorySupply {
    fn stream(&self) -> Result<RecordStream<'_>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn sample_names_and_extensions() {
        assert_eq!(sample_name(Path::new("/x/ecoli_k12.fasta")), "ecoli_k12");
        assert_eq!(sample_name(Path::new("a.b.fna.gz")), "a.b");
        assert!(is_fasta_path(Path::new("g.FA")));
        assert!(is_fasta_path(Path::new("g.ffn.gz")));
        assert!(!is_fasta_path(Path::new("g.fastq")));
        assert!(!is_fasta_path(Path::new("notes.txt")));
    }

    #[test]
    fn discover_sorts_and_filters() {
        let td = tempfile::tempdir().unwrap();
        write(td.path(), "b.fasta", ">s\nACGT\n");
        write(td.path(), "a.fa", ">s\nACGT\n");
        write(td.path(), "readme.txt", "hello");
        let d = FastaDir::discover(td.path()).unwrap();
        let names: Vec<_> = d.files().iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["a.fa", "b.fasta"]);
        d.ensure_readable().unwrap();
    }

    #[test]
    fn discover_fails_without_fasta() {
        let td = tempfile::tempdir().unwrap();
        write(td.path(), "readme.txt", "hello");
        let err = FastaDir::discover(td.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<PcrError>(), Some(PcrError::NoSequenceFiles(_))));
    }

    #[test]
    fn empty_collection_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        write(td.path(), "empty.fa", "");
        let d = FastaDir::discover(td.path()).unwrap();
        assert!(d.ensure_readable().is_err());
    }

    #[test]
    fn streams_uppercased_records_and_skips_bad_ones() {
        let td = tempfile::tempdir().unwrap();
        write(td.path(), "s1.fa", ">chr1 some description\nacgt\nTTAA\n>chr1 dup\nGGGG\n>chr2\nCC\n");
        write(td.path(), "s2.fasta", ">chr1\nAAAA\n");
        let d = FastaDir::discover(td.path()).unwrap();
        let recs: Vec<SequenceRecord> = d.stream().unwrap().collect::<Result<_>>().unwrap();
        let summary: Vec<(&str, &str, &[u8])> = recs.iter().map(|r| (r.sample.as_str(), r.id.as_str(), r.seq.as_slice())).collect();
        assert_eq!(summary, vec![
            ("s1", "chr1", &b"ACGTTTAA"[..]),
            ("s1", "chr2", &b"CC"[..]),
            ("s2", "chr1", &b"AAAA"[..]),
        ]);
        assert_eq!(recs[0].source_file, "s1.fa");
        // restartable
        assert_eq!(d.stream().unwrap().count(), 3);
    }
}
