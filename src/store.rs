//! Append-only transaction log.
//!
//! One JSON record per line. A record is durable (flushed and fsynced) before
//! [`LogStore::append`] returns, and the full ordered sequence is reloaded and
//! validated on open so that the ledger can be rebuilt by replay. Records are
//! never rewritten: the file only ever grows.

use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;

use crate::record::RecordKind;
use crate::record::SequenceId;
use crate::record::TenderId;
use crate::record::TransactionRecord;

pub struct LogStore {
    path: PathBuf,
    writer: BufWriter<File>,
    records: Vec<TransactionRecord>,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("transaction log io failure path={path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode transaction record")]
    Encode(#[source] serde_json::Error),
    #[error("corrupt transaction log, unreadable record at line {line} path={path:?}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("transaction log out of order at line {line}, expected sequence {expected} found {found}")]
    OutOfOrder { line: usize, expected: u64, found: u64 },
}

impl LogStore {
    /// Opens the log at `path`, creating it (and its parent directory) if
    /// absent, and loads every existing record in sequence order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file or its parent directory cannot be created or read ([`StoreError::Io`]).
    /// - An existing line is not a valid record ([`StoreError::Corrupt`]).
    /// - Sequence ids are not contiguous from 1 ([`StoreError::OutOfOrder`]).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| io_error(&path, source))?;
        }

        let records = if path.exists() {
            load_records(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        tracing::info!(path = %path.display(), records = records.len(), "transaction log opened");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records,
        })
    }

    /// Seals `kind` into the next record and appends it durably: the record is
    /// written, flushed and fsynced before it becomes visible in memory, so a
    /// failed append leaves the log and the in-memory sequence untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The record cannot be encoded ([`StoreError::Encode`]).
    /// - The write does not durably complete ([`StoreError::Io`]).
    pub fn append(&mut self, kind: RecordKind) -> Result<TransactionRecord, StoreError> {
        let record = TransactionRecord {
            sequence_id: SequenceId(self.records.len() as u64 + 1),
            timestamp: Utc::now(),
            kind,
        };

        let mut line = serde_json::to_string(&record).map_err(StoreError::Encode)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .and_then(|()| self.writer.get_ref().sync_data())
            .map_err(|source| io_error(&self.path, source))?;

        tracing::debug!(%record, "transaction record appended");
        self.records.push(record.clone());
        Ok(record)
    }

    /// All records in sequence order.
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// History of a single tender, in sequence order.
    pub fn for_tender(&self, tender_id: &TenderId) -> Vec<TransactionRecord> {
        self.records
            .iter()
            .filter(|record| record.tender_id() == tender_id)
            .cloned()
            .collect()
    }
}

fn load_records(path: &Path) -> Result<Vec<TransactionRecord>, StoreError> {
    let file = File::open(path).map_err(|source| io_error(path, source))?;
    let mut records = Vec::new();
    for (idx, line_res) in BufReader::new(file).lines().enumerate() {
        let line_no = idx + 1;
        let line = line_res.map_err(|source| io_error(path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TransactionRecord = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        let expected = records.len() as u64 + 1;
        if record.sequence_id.0 != expected {
            return Err(StoreError::OutOfOrder {
                line: line_no,
                expected,
                found: record.sequence_id.0,
            });
        }
        records.push(record);
    }
    Ok(records)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
