//! A minimal write-ahead journal: each mutating call is appended as one
//! length-prefixed, CRC32-checked record before [`MemoryStore`](super::memory::MemoryStore)
//! applies it in memory, so a crash can replay exactly the writes that
//! were durably committed.
//!
//! # On-disk entry format (little-endian)
//!
//! ```text
//! [4 bytes: payload length][N bytes: JSON payload][4 bytes: CRC32 of payload]
//! ```
//!
//! This is a deliberately simplified cousin of a segment-rotating,
//! memory-mapped journal: single growable file, no rotation, no mmap.
//! Adequate for the kernel's scale and for `cargo test` runs; a production
//! deployment serving real throughput would want the rotating design this
//! one is descended from.

use super::PersistenceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Liquidation, Order, Position, Trade, Trader};
use crate::market::stats::MarketStats;

/// One durable event, written before the in-memory store is mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JournalRecord {
    /// A trader was registered or its stats/balance updated.
    TraderUpserted(Trader),
    /// A resting or terminal order was inserted or overwritten.
    OrderUpserted(Order),
    /// A position was inserted or overwritten.
    PositionUpserted(Position),
    /// A position closed to flat and its record was deleted.
    PositionDeleted {
        /// The trader whose position closed.
        trader_id: Uuid,
        /// The instrument the position was in.
        instrument: String,
    },
    /// A trade was appended.
    TradeAppended(Trade),
    /// A liquidation was appended.
    LiquidationAppended(Liquidation),
    /// The insurance fund's balance was updated.
    InsuranceFundBalance {
        /// Current balance.
        balance: Decimal,
        /// Lifetime total credited.
        total_in: Decimal,
        /// Lifetime total debited.
        total_out: Decimal,
    },
    /// The instrument's headline market statistics were recomputed.
    MarketStatsUpserted(MarketStats),
}

/// An append-only file journal of [`JournalRecord`]s.
pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileJournal {
    /// Open (creating if absent) the journal file at `path` for
    /// appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Durably append one record. Returns only once the write (and flush)
    /// has succeeded.
    pub fn append(&self, record: &JournalRecord) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec(record)
            .map_err(|e| PersistenceError::Corrupt(format!("failed to encode record: {e}")))?;
        let crc = crc32fast::hash(&payload);

        let mut file = self
            .file
            .lock()
            .map_err(|_| PersistenceError::Unavailable("journal writer lock poisoned".into()))?;
        file.write_all(&(payload.len() as u32).to_le_bytes())
            .and_then(|()| file.write_all(&payload))
            .and_then(|()| file.write_all(&crc.to_le_bytes()))
            .and_then(|()| file.flush())
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Replay every record in the journal, in the order it was written.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<JournalRecord>, PersistenceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(source) => {
                    return Err(PersistenceError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            reader
                .read_exact(&mut payload)
                .map_err(|source| PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

            let mut crc_buf = [0u8; 4];
            reader
                .read_exact(&mut crc_buf)
                .map_err(|source| PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            let stored_crc = u32::from_le_bytes(crc_buf);
            let actual_crc = crc32fast::hash(&payload);
            if stored_crc != actual_crc {
                return Err(PersistenceError::Corrupt(format!(
                    "journal entry CRC mismatch: expected {stored_crc:#010x}, got {actual_crc:#010x}"
                )));
            }

            let record: JournalRecord = serde_json::from_slice(&payload).map_err(|e| {
                PersistenceError::Corrupt(format!("failed to decode journal record: {e}"))
            })?;
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = FileJournal::open(&path).unwrap();

        journal
            .append(&JournalRecord::InsuranceFundBalance {
                balance: Decimal::ONE,
                total_in: Decimal::ZERO,
                total_out: Decimal::ZERO,
            })
            .unwrap();
        journal
            .append(&JournalRecord::PositionDeleted {
                trader_id: Uuid::nil(),
                instrument: "R.index".into(),
            })
            .unwrap();

        let replayed = FileJournal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 2);
        matches!(replayed[0], JournalRecord::InsuranceFundBalance { .. });
        matches!(replayed[1], JournalRecord::PositionDeleted { .. });
    }

    #[test]
    fn detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = FileJournal::open(&path).unwrap();
        journal
            .append(&JournalRecord::InsuranceFundBalance {
                balance: Decimal::ONE,
                total_in: Decimal::ZERO,
                total_out: Decimal::ZERO,
            })
            .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(FileJournal::replay(&path).is_err());
    }
}
