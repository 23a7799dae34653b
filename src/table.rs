//! Primer table loading (CSV).
//!
//! Column roles are detected from the header by substring, case-insensitively:
//! - forward: `forward`, `fwd`, `left`, `primer1`, `primer_fwd`
//! - reverse: `reverse`, `rev`, `right`, `primer2`, `primer_rev`
//! - id: `pair`, `id`, `pair_id`, `name`
//!
//! When several headers qualify for a role the right-most one wins. Rows with a
//! blank primer are skipped; a blank id becomes `pair_<row>` (1-based data row).
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::error::PcrError;
use crate::primer::PrimerPair;

const FWD_KEYS: &[&str] = &["forward", "fwd", "left", "primer1", "primer_fwd"];
const REV_KEYS: &[&str] = &["reverse", "rev", "right", "primer2", "primer_rev"];
const ID_KEYS: &[&str] = &["pair", "id", "pair_id", "name"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Columns {
    forward: Option<usize>,
    reverse: Option<usize>,
    id: Option<usize>,
}

fn detect_columns<'h>(headers: impl Iterator<Item = &'h str>) -> Columns {
    let mut cols = Columns::default();
    for (i, h) in headers.enumerate() {
        let h = h.trim().to_ascii_lowercase();
        if FWD_KEYS.iter().any(|k| h.contains(k)) { cols.forward = Some(i); }
        if REV_KEYS.iter().any(|k| h.contains(k)) { cols.reverse = Some(i); }
        if ID_KEYS.iter().any(|k| h.contains(k)) { cols.id = Some(i); }
    }
    cols
}

/// Parse primer pairs from any CSV reader. `origin` is only used in errors.
pub fn read_primer_pairs<R: std::io::Read>(rdr: R, origin: &Path) -> Result<Vec<PrimerPair>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(rdr);
    let headers = reader.headers().with_context(|| format!("reading header of {}", origin.display()))?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PcrError::MalformedPrimerTable(origin.to_path_buf()).into());
    }
    let cols = detect_columns(headers.iter());
    let (Some(fc), Some(rc)) = (cols.forward, cols.reverse) else {
        return Err(PcrError::MissingPrimerColumns {
            path: origin.to_path_buf(),
            headers: headers.iter().collect::<Vec<_>>().join(","),
        }
        .into());
    };
    debug!("primer columns: forward={fc} reverse={rc} id={:?}", cols.id);

    let mut pairs = Vec::new();
    let mut ids = HashSet::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("reading row {} of {}", idx + 1, origin.display()))?;
        let fwd = row.get(fc).unwrap_or("");
        let rev = row.get(rc).unwrap_or("");
        if fwd.is_empty() || rev.is_empty() {
            debug!("row {}: blank primer, skipped", idx + 1);
            continue;
        }
        let id = cols.id.and_then(|c| row.get(c)).filter(|s| !s.is_empty());
        let id = id.map(str::to_string).unwrap_or_else(|| format!("pair_{}", idx + 1));
        if !ids.insert(id.clone()) {
            warn!("duplicate primer pair id '{id}' in {}", origin.display());
        }
        pairs.push(PrimerPair::new(id, fwd, rev));
    }
    Ok(pairs)
}

/// Load a primer CSV; an empty or unreadable table is an error.
pub fn load_primer_table<P: AsRef<Path>>(path: P) -> Result<Vec<PrimerPair>> {
    let path = path.as_ref();
    let f = std::fs::File::open(path).with_context(|| format!("opening primer table {}", path.display()))?;
    let pairs = read_primer_pairs(f, path)?;
    if pairs.is_empty() {
        return Err(PcrError::EmptyPrimerTable(path.to_path_buf()).into());
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Vec<PrimerPair>> {
        read_primer_pairs(s.as_bytes(), Path::new("test.csv"))
    }

    #[test]
    fn standard_headers() {
        let p = parse("pair_id,forward,reverse\n16S,agagtttgatcmtggctcag,TACGGYTACCTTGTTACGACTT\n").unwrap();
        assert_eq!(p, vec![PrimerPair::new("16S", "AGAGTTTGATCMTGGCTCAG", "TACGGYTACCTTGTTACGACTT")]);
    }

    #[test]
    fn alternative_headers_and_column_order() {
        let p = parse("Right,Name,Left\nTTTT,p,AAAA\n").unwrap();
        assert_eq!(p[0].id, "p");
        assert_eq!(p[0].forward, "AAAA");
        assert_eq!(p[0].reverse, "TTTT");
    }

    #[test]
    fn blank_rows_and_missing_ids() {
        let p = parse("id,fwd,rev\n,ACGT,TTTT\nx,,GGGG\n,CCCC,AAAA\n").unwrap();
        let ids: Vec<_> = p.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["pair_1", "pair_3"]);
    }

    #[test]
    fn table_without_id_column() {
        let p = parse("forward,reverse\nACGT,TTTT\n").unwrap();
        assert_eq!(p[0].id, "pair_1");
    }

    #[test]
    fn missing_columns_is_an_error() {
        let err = parse("name,sequence\nx,ACGT\n").unwrap_err();
        assert!(matches!(err.downcast_ref::<PcrError>(), Some(PcrError::MissingPrimerColumns { .. })));
    }

    #[test]
    fn empty_file_is_an_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("p.csv");
        std::fs::write(&path, "").unwrap();
        assert!(load_primer_table(&path).is_err());
        std::fs::write(&path, "id,forward,reverse\n").unwrap();
        let err = load_primer_table(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<PcrError>(), Some(PcrError::EmptyPrimerTable(_))));
    }
}
