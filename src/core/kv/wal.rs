//! Write-ahead log for the KV store adapter. Grounded on
//! `core::storage::engine::wal`'s entry format (op byte, length-prefixed
//! key/value, trailing CRC32), generalized to log whole write batches
//! rather than single transaction-manager operations.

use crate::core::common::crc32;
use crate::core::common::error::{Result, ThemisError};
use std::fs::OpenOptions;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

const OP_PUT: u8 = 0x01;
const OP_DELETE: u8 = 0x02;
const OP_BATCH_COMMIT: u8 = 0x03;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    Put { batch_id: u64, key: Vec<u8>, value: Vec<u8> },
    Delete { batch_id: u64, key: Vec<u8> },
    BatchCommit { batch_id: u64 },
}

fn write_len_prefixed<W: Write>(w: &mut W, bytes: &[u8]) {
    w.write_all(&(bytes.len() as u32).to_le_bytes()).ok();
    w.write_all(bytes).ok();
}

fn read_len_prefixed<R: Read>(r: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

impl WalRecord {
    fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Put { batch_id, key, value } => {
                buf.push(OP_PUT);
                buf.extend_from_slice(&batch_id.to_le_bytes());
                write_len_prefixed(buf, key);
                write_len_prefixed(buf, value);
            }
            Self::Delete { batch_id, key } => {
                buf.push(OP_DELETE);
                buf.extend_from_slice(&batch_id.to_le_bytes());
                write_len_prefixed(buf, key);
            }
            Self::BatchCommit { batch_id } => {
                buf.push(OP_BATCH_COMMIT);
                buf.extend_from_slice(&batch_id.to_le_bytes());
            }
        }
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let mut op = [0u8; 1];
        r.read_exact(&mut op)?;
        let mut id_buf = [0u8; 8];
        r.read_exact(&mut id_buf)?;
        let batch_id = u64::from_le_bytes(id_buf);
        match op[0] {
            OP_PUT => {
                let key = read_len_prefixed(r)?;
                let value = read_len_prefixed(r)?;
                Ok(Self::Put { batch_id, key, value })
            }
            OP_DELETE => {
                let key = read_len_prefixed(r)?;
                Ok(Self::Delete { batch_id, key })
            }
            OP_BATCH_COMMIT => Ok(Self::BatchCommit { batch_id }),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown WAL op byte {other}"),
            )),
        }
    }
}

pub struct WalWriter {
    path: PathBuf,
}

impl WalWriter {
    pub fn new(dir: &Path) -> Self {
        Self { path: dir.join("themis.wal") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &WalRecord) -> Result<()> {
        let mut buf = Vec::new();
        record.write_to(&mut buf);
        let mut hasher = crc32::Hasher::new();
        hasher.update(&buf);
        let checksum = hasher.finalize();

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&buf)?;
        file.write_all(&checksum.to_le_bytes())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    pub fn truncate(&self) -> Result<()> {
        OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        Ok(())
    }

    /// Reads every well-formed record from the log, stopping at the first
    /// truncated or checksum-mismatched trailing entry (a torn write from a
    /// crash mid-append) rather than failing the whole recovery.
    pub fn replay(&self) -> Result<Vec<WalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let record = match WalRecord::read_from(&mut reader) {
                Ok(r) => r,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(_) => break,
            };
            let mut checksum_buf = [0u8; 4];
            if reader.read_exact(&mut checksum_buf).is_err() {
                break;
            }
            let mut reencoded = Vec::new();
            record.write_to(&mut reencoded);
            let mut hasher = crc32::Hasher::new();
            hasher.update(&reencoded);
            if hasher.finalize() != u32::from_le_bytes(checksum_buf) {
                return Err(ThemisError::Corruption(
                    "WAL checksum mismatch, log truncated at first bad record".to_string(),
                ));
            }
            records.push(record);
        }
        Ok(records)
    }
}
