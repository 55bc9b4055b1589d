use crate::error::PrepError;
use anyhow::Result;
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One item that could not be processed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    pub path: PathBuf,
    pub message: String,
}

impl FailureInfo {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Append-only record of the failures of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    entries: Vec<FailureInfo>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: FailureInfo) {
        self.entries.push(failure);
    }

    pub fn entries(&self) -> &[FailureInfo] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the log to `destination`. Nothing is written for an empty log.
    pub fn persist(&self, destination: &Path) -> Result<bool> {
        persist_failures(&self.entries, destination)
    }
}

impl Extend<FailureInfo> for FailureLog {
    fn extend<T: IntoIterator<Item = FailureInfo>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl From<Vec<FailureInfo>> for FailureLog {
    fn from(entries: Vec<FailureInfo>) -> Self {
        Self { entries }
    }
}

/// Tabs and line breaks would split a record, so they become spaces.
fn one_line(s: &str) -> String {
    s.replace(['\t', '\r', '\n'], " ")
}

/// Write `path<TAB>message` per failure. Returns `false` without touching the
/// filesystem when there is nothing to report.
pub fn persist_failures(failures: &[FailureInfo], destination: &Path) -> Result<bool> {
    if failures.is_empty() {
        return Ok(false);
    }

    let file = File::create(destination).map_err(|e| PrepError::io(destination, e))?;
    let mut out = BufWriter::new(file);

    for f in failures {
        writeln!(
            out,
            "{}\t{}",
            one_line(&f.path.display().to_string()),
            one_line(&f.message)
        )
        .map_err(|e| PrepError::io(destination, e))?;
    }
    out.flush().map_err(|e| PrepError::io(destination, e))?;

    info!("Failure log -> {}", destination.display());
    Ok(true)
}

/// Read a failure log back for triage.
pub fn read_failure_log(path: &Path) -> Result<Vec<FailureInfo>> {
    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;

    let mut failures = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| PrepError::io(path, e))?;
        if line.is_empty() {
            continue;
        }

        let (p, message) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        failures.push(FailureInfo::new(p, message));
    }

    Ok(failures)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_log_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("_failed.txt");

        assert!(!FailureLog::new().persist(&dest).unwrap());
        assert!(!dest.exists());
    }

    #[test]
    fn one_line_per_failure() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("_failed.txt");

        let mut log = FailureLog::new();
        log.push(FailureInfo::new("data/a.mid", "Failed to parse MIDI"));
        log.push(FailureInfo::new("data/b.mid", "line one\nline\ttwo"));

        assert!(log.persist(&dest).unwrap());

        let text = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(
            text,
            "data/a.mid\tFailed to parse MIDI\ndata/b.mid\tline one line two\n"
        );

        let back = read_failure_log(&dest).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0], FailureInfo::new("data/a.mid", "Failed to parse MIDI"));
    }

    #[test]
    fn unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("_failed.txt");

        let failures = [FailureInfo::new("x.mid", "boom")];
        assert!(persist_failures(&failures, &dest).is_err());
    }
}
