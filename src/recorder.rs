//! Append-only session log with crash-safe persistence.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{Result, TaskError};
use crate::record::TrialRecord;

#[derive(Debug, Default)]
pub struct Recorder {
    records: Vec<TrialRecord>,
    path: Option<PathBuf>,
    saves: u32,
}

impl Recorder {
    /// A log that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn saves(&self) -> u32 {
        self.saves
    }

    pub fn append(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// Rewrite the whole log. The file on disk is always a complete JSON
    /// array, either the previous one or the new one.
    pub fn persist(&mut self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        write_records(path, &self.records).map_err(|source| {
            error!(path = %path.display(), %source, "failed to save behavioral data");
            TaskError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.saves += 1;
        debug!(path = %path.display(), records = self.records.len(), "saved");
        Ok(())
    }

    pub fn into_records(self) -> Vec<TrialRecord> {
        self.records
    }
}

fn write_records(path: &Path, records: &[TrialRecord]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut out, records).map_err(io::Error::from)?;
        out.flush()?;
    }
    fs::rename(&tmp, path)
}
