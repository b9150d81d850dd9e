//! Write-ahead log of measurement mutations.
//!
//! Every mutation is appended (and optionally fsynced) before it is applied
//! to the in-memory index; opening a store replays the log.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec-encoded WalEntry]
//! [ENTRY 2: codec-encoded WalEntry]
//! ...
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measure::{Value, ValueId, Variable};

use super::codec;

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: WalEntryKind,
}

/// The logged mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntryKind {
    VariableInsert(Variable),
    ValueInsert(Value),
    ValueUpdate { id: ValueId, value: f64 },
}

/// Outcome of scanning an existing log.
#[derive(Debug)]
pub struct Replay {
    pub entries: Vec<WalEntry>,
    /// Byte length of the valid prefix.
    pub valid_len: u64,
    /// Description of the damaged tail, if one was found.
    pub torn_tail: Option<String>,
}

fn io_lock_err(context: &'static str) -> std::io::Error {
    std::io::Error::new(ErrorKind::Other, format!("poisoned lock: {context}"))
}

/// Append-only log file. Thread-safe via an internal mutex.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_on_write: bool,
}

struct WalWriter {
    file: BufWriter<File>,
    sequence: u64,
}

impl WriteAheadLog {
    /// Opens or creates the log at `path` and returns it with the replayed
    /// entries.
    ///
    /// A damaged or incomplete final entry is cut off so later appends land
    /// on a clean boundary. A damaged entry followed by more data fails with
    /// `ErrorKind::InvalidData` and leaves the file untouched.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Replay)> {
        let needs_header = fs::metadata(path).map_or(true, |m| m.len() == 0);
        if needs_header {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            codec::write_header(&mut file)?;
            file.sync_all()?;
        }

        let replay = Self::scan(path)?;
        if replay.torn_tail.is_some() {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let sequence = replay.entries.last().map_or(0, |e| e.sequence);
        let file = OpenOptions::new().append(true).open(path)?;
        let wal = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                file: BufWriter::new(file),
                sequence,
            }),
            sync_on_write,
        };
        Ok((wal, replay))
    }

    fn scan(path: &Path) -> IoResult<Replay> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader)?;

        let mut entries = Vec::new();
        let mut valid_len = codec::HEADER_LEN;
        let mut torn_tail = None;
        while valid_len < file_size {
            match codec::decode::<WalEntry>(&mut reader) {
                Ok(entry) => {
                    entries.push(entry);
                    valid_len = reader.stream_position()?;
                }
                Err(e) => {
                    // A frame that runs into end of file is an interrupted
                    // append. Damage with intact data after it is not.
                    let frame_end = reader.stream_position()?;
                    if e.kind() != ErrorKind::UnexpectedEof && frame_end < file_size {
                        return Err(std::io::Error::new(
                            ErrorKind::InvalidData,
                            format!(
                                "corrupt WAL entry at offset {valid_len} \
                                 ({} bytes follow it): {e}",
                                file_size - frame_end
                            ),
                        ));
                    }
                    torn_tail = Some(format!(
                        "{} trailing bytes unreadable: {e}",
                        file_size - valid_len
                    ));
                    break;
                }
            }
        }

        Ok(Replay {
            entries,
            valid_len,
            torn_tail,
        })
    }

    /// Appends a mutation and returns its sequence number.
    pub fn append(&self, kind: WalEntryKind) -> IoResult<u64> {
        let mut writer = self.writer.lock().map_err(|_| io_lock_err("wal.append"))?;
        let sequence = writer.sequence + 1;
        let encoded = codec::encode(&WalEntry {
            sequence,
            timestamp: Utc::now(),
            kind,
        })?;

        writer.file.write_all(&encoded)?;
        writer.file.flush()?;
        if self.sync_on_write {
            writer.file.get_ref().sync_data()?;
        }
        writer.sequence = sequence;
        Ok(sequence)
    }

    /// Last assigned sequence number.
    pub fn current_sequence(&self) -> IoResult<u64> {
        let writer = self.writer.lock().map_err(|_| io_lock_err("wal.sequence"))?;
        Ok(writer.sequence)
    }

    /// Size of the log file in bytes.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Replaces the log with `kinds`, renumbered from 1.
    ///
    /// The new log is written next to the old one and renamed over it, so a
    /// crash leaves either the old or the new file intact.
    pub fn rewrite(&self, kinds: Vec<WalEntryKind>) -> IoResult<()> {
        let mut writer = self.writer.lock().map_err(|_| io_lock_err("wal.rewrite"))?;
        writer.file.flush()?;

        let tmp_path = self.path.with_extension("wal.tmp");
        let mut sequence = 0;
        {
            let mut tmp = BufWriter::new(
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&tmp_path)?,
            );
            codec::write_header(&mut tmp)?;
            let timestamp = Utc::now();
            for kind in kinds {
                sequence += 1;
                tmp.write_all(&codec::encode(&WalEntry {
                    sequence,
                    timestamp,
                    kind,
                })?)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        writer.file = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        writer.sequence = sequence;
        Ok(())
    }
}
