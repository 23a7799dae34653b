//! Errors raised by input validation and task execution.
use std::path::PathBuf;

/// Fatal startup conditions and per-task failures.
#[derive(thiserror::Error, Debug)]
pub enum PcrError {
    /// The primer table had a header but no usable rows.
    #[error("primer table {} contains no primer pairs", .0.display())]
    EmptyPrimerTable(PathBuf),
    /// No header row could be read from the primer table.
    #[error("primer table {} is empty or malformed", .0.display())]
    MalformedPrimerTable(PathBuf),
    /// Forward or reverse column could not be identified from the header.
    #[error("could not detect forward/reverse columns in {} (headers: {headers}); expected names like 'forward'/'reverse' or 'fwd'/'rev'", .path.display())]
    MissingPrimerColumns { path: PathBuf, headers: String },
    /// Directory holds no file with a FASTA extension.
    #[error("no FASTA files (.fa/.fasta/.fna/.ffn, optionally .gz) found in {}", .0.display())]
    NoSequenceFiles(PathBuf),
    /// FASTA files exist but none holds a record.
    #[error("sequence collection in {} contains no records", .0.display())]
    EmptySequenceCollection(PathBuf),
    #[error("invalid amplicon length range: min_len={min} > max_len={max}")]
    InvalidLengthRange { min: usize, max: usize },
    /// A task panicked; the payload message is kept when it is a string.
    #[error("task for pair '{pair_id}' panicked: {message}")]
    TaskPanicked { pair_id: String, message: String },
}
