//! Local durable progress cache: binary protobuf journal.
//!
//! One journal per (learner, content) pair. Storage format: length-prefixed
//! protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Append only between compactions, fsync after every write
//!   - Sequence strictly increasing within a journal
//!   - The newest frame whose checksum verifies is the cached state
//!   - A truncated tail (abrupt exit mid-write) is cut off on open, and
//!     again before any append that finds the file longer than its last
//!     intact frame
//!   - A failed append is rolled back to the last intact frame
//!   - Compaction rewrites the journal as its newest verified frame

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use rte_kernel::domain::Element;

use crate::error::CacheError;
use crate::proto_bridge::{proto_to_values, saved_at, values_to_proto};
use crate::proto_types::ProtoCacheRecord;

const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Identity of one learner's attempt at one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub learner_id: String,
    pub content_id: String,
}

impl CacheKey {
    pub fn new(learner_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            content_id: content_id.into(),
        }
    }

    /// File name derived from a digest, so ids never reach the filesystem.
    pub fn file_name(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.learner_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content_id.as_bytes());
        let digest: String = hasher
            .finalize()
            .iter()
            .take(16)
            .map(|b| format!("{:02x}", b))
            .collect();
        format!("{}.journal", digest)
    }
}

/// Newest verified state read back from a journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProgress {
    pub sequence: u64,
    pub values: BTreeMap<Element, String>,
    pub saved_at: DateTime<Utc>,
}

/// Directory of journals.
#[derive(Debug, Clone)]
pub struct ProgressCache {
    dir: PathBuf,
    compact_after_frames: usize,
}

impl ProgressCache {
    pub fn open(dir: &Path, compact_after_frames: usize) -> Result<Self, CacheError> {
        fs::create_dir_all(dir).map_err(|e| CacheError::io("creating cache directory", dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            compact_after_frames: compact_after_frames.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open (or create) the journal for `key`.
    pub fn journal(&self, key: &CacheKey) -> Result<CacheJournal, CacheError> {
        CacheJournal::open(
            &self.dir.join(key.file_name()),
            key.clone(),
            self.compact_after_frames,
        )
    }
}

/// Append-only journal of one (learner, content) pair.
#[derive(Debug)]
pub struct CacheJournal {
    path: PathBuf,
    key: CacheKey,
    last_sequence: u64,
    frames: usize,
    /// Byte length up to the end of the last intact frame.
    len: u64,
    compact_after_frames: usize,
}

impl CacheJournal {
    /// Open a journal, cutting off any truncated tail so later appends
    /// start on a frame boundary.
    pub fn open(path: &Path, key: CacheKey, compact_after_frames: usize) -> Result<Self, CacheError> {
        let (records, len) = if path.exists() {
            repair_tail(path)?
        } else {
            (Vec::new(), 0)
        };

        Ok(Self {
            path: path.to_path_buf(),
            key,
            last_sequence: records.iter().map(|r| r.sequence).max().unwrap_or(0),
            frames: records.len(),
            len,
            compact_after_frames: compact_after_frames.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Append the values as a new frame and fsync. Returns its sequence.
    pub fn save(
        &mut self,
        values: &BTreeMap<Element, String>,
        saved_at: DateTime<Utc>,
    ) -> Result<u64, CacheError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CacheError::io("opening journal", &self.path, e))?;
        let actual_len = file
            .metadata()
            .map_err(|e| CacheError::io("reading journal metadata", &self.path, e))?
            .len();
        if actual_len != self.len {
            self.resync()?;
        }

        let sequence = self.last_sequence + 1;
        let record = values_to_proto(
            sequence,
            &self.key.learner_id,
            &self.key.content_id,
            values,
            saved_at,
        );

        let appended = write_frame(&mut file, &record)
            .map_err(|e| CacheError::io("appending frame", &self.path, e))
            .and_then(|()| {
                file.sync_all()
                    .map_err(|e| CacheError::io("syncing journal", &self.path, e))
            });
        if let Err(e) = appended {
            if let Err(rollback) = file.set_len(self.len) {
                warn!(path = %self.path.display(), "failed append not rolled back: {}", rollback);
            }
            return Err(e);
        }

        self.last_sequence = sequence;
        self.frames += 1;
        self.len += frame_len(&record);
        debug!(sequence, frames = self.frames, "progress cached");

        if self.frames > self.compact_after_frames {
            self.compact()?;
        }
        Ok(sequence)
    }

    /// Newest frame whose checksum verifies, if any.
    pub fn load_latest(&self) -> Result<Option<CachedProgress>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let (records, _) = read_frames(&self.path)?;
        Ok(newest_verified(&records))
    }

    /// Rewrite the journal as its newest verified frame.
    pub fn compact(&mut self) -> Result<(), CacheError> {
        let (records, _) = read_frames(&self.path)?;
        let Some(latest) = records
            .iter()
            .rev()
            .find(|r| proto_to_values(r).is_some())
        else {
            return Ok(());
        };

        let tmp = self.path.with_extension("journal.tmp");
        {
            let mut file = File::create(&tmp)
                .map_err(|e| CacheError::io("creating compacted journal", &tmp, e))?;
            write_frame(&mut file, latest)
                .map_err(|e| CacheError::io("writing compacted journal", &tmp, e))?;
            file.sync_all()
                .map_err(|e| CacheError::io("syncing compacted journal", &tmp, e))?;
        }
        fs::rename(&tmp, &self.path)
            .map_err(|e| CacheError::io("replacing journal", &self.path, e))?;

        debug!(path = %self.path.display(), from = self.frames, "journal compacted");
        self.frames = 1;
        self.len = frame_len(latest);
        Ok(())
    }

    /// Re-read the journal after its length stopped matching the last
    /// intact frame, cutting off anything torn.
    fn resync(&mut self) -> Result<(), CacheError> {
        let (records, len) = repair_tail(&self.path)?;
        self.frames = records.len();
        self.len = len;
        if let Some(max) = records.iter().map(|r| r.sequence).max() {
            self.last_sequence = self.last_sequence.max(max);
        }
        Ok(())
    }
}

/// Read the intact frames and truncate the file after the last of them.
fn repair_tail(path: &Path) -> Result<(Vec<ProtoCacheRecord>, u64), CacheError> {
    let (records, valid_len) = read_frames(path)?;
    let actual_len = fs::metadata(path)
        .map_err(|e| CacheError::io("reading journal metadata", path, e))?
        .len();
    if actual_len > valid_len {
        warn!(
            path = %path.display(),
            dropped = actual_len - valid_len,
            "truncated journal tail discarded"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| CacheError::io("opening journal for repair", path, e))?;
        file.set_len(valid_len)
            .map_err(|e| CacheError::io("truncating journal", path, e))?;
        file.sync_all()
            .map_err(|e| CacheError::io("syncing journal", path, e))?;
    }
    Ok((records, valid_len))
}

fn frame_len(record: &ProtoCacheRecord) -> u64 {
    4 + record.encoded_len() as u64
}

fn newest_verified(records: &[ProtoCacheRecord]) -> Option<CachedProgress> {
    records.iter().rev().find_map(|record| {
        let values = proto_to_values(record)?;
        Some(CachedProgress {
            sequence: record.sequence,
            values,
            saved_at: saved_at(record),
        })
    })
}

fn write_frame(file: &mut File, record: &ProtoCacheRecord) -> io::Result<()> {
    let buf = record.encode_to_vec();
    let len = buf.len() as u32;
    let mut writer = BufWriter::new(file);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&buf)?;
    writer.flush()
}

/// Read all decodable frames and the byte length of the intact prefix.
///
/// Stops at the first short or implausible frame; everything after it is
/// treated as a torn write. Frames that fail to decode are skipped.
fn read_frames(path: &Path) -> Result<(Vec<ProtoCacheRecord>, u64), CacheError> {
    let file = File::open(path).map_err(|e| CacheError::io("opening journal", path, e))?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut valid_len = 0u64;
    let mut len_buf = [0u8; 4];

    loop {
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(CacheError::io("reading frame length", path, e)),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            warn!(path = %path.display(), len, "implausible frame length; ignoring rest of journal");
            break;
        }

        let mut frame = vec![0u8; len];
        match reader.read_exact(&mut frame) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(CacheError::io("reading frame", path, e)),
        }
        valid_len += 4 + len as u64;

        match ProtoCacheRecord::decode(frame.as_slice()) {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), "undecodable frame skipped: {}", e),
        }
    }

    Ok((records, valid_len))
}
