//! Torrent lifecycle over tiered storage: piece status, handles and the archive

pub mod archive;
pub mod factory;

use std::fmt;

pub use archive::{ArchiveError, TorrentArchive};
pub use factory::{LocalTorrent, LocalTorrentFactory, TorrentFactory};

use crate::metainfo::MetaInfo;
use crate::storage::StorageError;

/// Per-piece status byte as persisted in the piece-status metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PieceStatus {
    /// Nothing written yet
    Empty = 0,
    /// Verified and complete
    Complete = 1,
    /// Partially written or failed verification
    Dirty = 2,
}

impl TryFrom<u8> for PieceStatus {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(PieceStatus::Empty),
            1 => Ok(PieceStatus::Complete),
            2 => Ok(PieceStatus::Dirty),
            other => Err(other),
        }
    }
}

/// Record of which pieces are complete locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceBitfield {
    bits: Vec<bool>,
}

impl PieceBitfield {
    /// Decodes raw piece-status bytes, one byte per piece.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidPieceStatus` - If any byte is not a known status
    pub fn from_status_bytes(name: &str, raw: &[u8]) -> Result<Self, TorrentError> {
        let bits = raw
            .iter()
            .enumerate()
            .map(|(index, &byte)| {
                PieceStatus::try_from(byte)
                    .map(|status| status == PieceStatus::Complete)
                    .map_err(|byte| TorrentError::InvalidPieceStatus {
                        name: name.to_string(),
                        reason: format!("unknown status byte {byte} for piece {index}"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bits })
    }

    /// Decodes the piece-status slot of `meta_info`, one byte per piece.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidPieceStatus` - If a byte is unknown or the slot
    ///   length differs from the piece count
    pub fn for_meta_info(meta_info: &MetaInfo, raw: &[u8]) -> Result<Self, TorrentError> {
        let bitfield = Self::from_status_bytes(meta_info.name(), raw)?;
        if bitfield.len() != meta_info.piece_count() {
            return Err(TorrentError::InvalidPieceStatus {
                name: meta_info.name().to_string(),
                reason: format!(
                    "{} status bytes for {} pieces",
                    bitfield.len(),
                    meta_info.piece_count()
                ),
            });
        }
        Ok(bitfield)
    }

    /// Returns whether piece `index` is complete.
    pub fn has_piece(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Returns the number of tracked pieces.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns whether no pieces are tracked.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the number of complete pieces.
    pub fn count_complete(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }
}

/// Read-only snapshot of a torrent's metainfo and local progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    meta_info: MetaInfo,
    bitfield: PieceBitfield,
}

impl TorrentInfo {
    /// Pairs metainfo with its piece bitfield.
    pub fn new(meta_info: MetaInfo, bitfield: PieceBitfield) -> Self {
        Self {
            meta_info,
            bitfield,
        }
    }

    /// Returns the content name.
    pub fn name(&self) -> &str {
        self.meta_info.name()
    }

    /// Returns the declared length.
    pub fn length(&self) -> u64 {
        self.meta_info.length()
    }

    /// Returns the metainfo.
    pub fn meta_info(&self) -> &MetaInfo {
        &self.meta_info
    }

    /// Returns the piece bitfield.
    pub fn bitfield(&self) -> &PieceBitfield {
        &self.bitfield
    }

    /// Returns the percentage of pieces downloaded, 100 for empty torrents.
    pub fn percent_downloaded(&self) -> u8 {
        let total = self.meta_info.piece_count();
        if total == 0 {
            return 100;
        }
        let percent = (self.bitfield.count_complete() * 100 / total).min(100);
        u8::try_from(percent).unwrap_or(100)
    }
}

impl fmt::Display for TorrentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "torrent({}, length={}, pieces={}/{}, {}%)",
            self.name(),
            self.length(),
            self.bitfield.count_complete(),
            self.meta_info.piece_count(),
            self.percent_downloaded()
        )
    }
}

/// Errors that can occur while building a torrent handle.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("file {name} has length {actual}, metainfo declares {expected}")]
    FileLengthMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid piece status for {name}: {reason}")]
    InvalidPieceStatus { name: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
