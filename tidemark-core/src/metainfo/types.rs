//! Torrent metainfo descriptor and its JSON encoding

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// SHA-1 digest of a single piece.
///
/// Encoded as a lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PieceHash([u8; 20]);

impl PieceHash {
    /// Hashes piece content.
    pub fn of(piece: &[u8]) -> Self {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&Sha1::digest(piece));
        Self(hash)
    }
}

impl TryFrom<String> for PieceHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut hash = [0u8; 20];
        hex::decode_to_slice(&value, &mut hash)
            .map_err(|e| format!("invalid piece hash {value:?}: {e}"))?;
        Ok(Self(hash))
    }
}

impl From<PieceHash> for String {
    fn from(hash: PieceHash) -> Self {
        hex::encode(hash.0)
    }
}

/// Structural fields of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Content digest naming the blob
    pub name: String,
    /// Declared byte length of the blob
    pub length: u64,
    /// Byte length of every piece except possibly the last
    pub piece_length: u64,
    /// Digest of each piece in order
    pub piece_hashes: Vec<PieceHash>,
}

/// Immutable descriptor of a content-addressed blob.
///
/// Two valid values for the same name describe the same content, so their
/// declared lengths always agree even if their piece layout differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    info: Info,
}

impl MetaInfo {
    /// Creates metainfo from structural fields.
    ///
    /// # Errors
    ///
    /// - `MetaInfoError::Invalid` - If the fields are inconsistent
    pub fn new(info: Info) -> Result<Self, MetaInfoError> {
        let meta_info = Self { info };
        meta_info.validate()?;
        Ok(meta_info)
    }

    /// Builds metainfo by hashing blob content in `piece_length` chunks.
    ///
    /// # Errors
    ///
    /// - `MetaInfoError::Invalid` - If name is empty or piece length is zero
    pub fn from_blob(
        name: impl Into<String>,
        blob: &[u8],
        piece_length: u64,
    ) -> Result<Self, MetaInfoError> {
        if piece_length == 0 {
            return Err(MetaInfoError::Invalid {
                reason: "piece length must be positive".to_string(),
            });
        }
        let chunk_size = usize::try_from(piece_length).map_err(|_| MetaInfoError::Invalid {
            reason: format!("piece length {piece_length} exceeds address space"),
        })?;

        Self::new(Info {
            name: name.into(),
            length: blob.len() as u64,
            piece_length,
            piece_hashes: blob.chunks(chunk_size).map(PieceHash::of).collect(),
        })
    }

    /// Decodes and validates serialized metainfo.
    ///
    /// # Errors
    ///
    /// - `MetaInfoError::Json` - If bytes are not valid metainfo JSON
    /// - `MetaInfoError::Invalid` - If decoded fields are inconsistent
    pub fn deserialize(bytes: &[u8]) -> Result<Self, MetaInfoError> {
        let meta_info: Self = serde_json::from_slice(bytes)?;
        meta_info.validate()?;
        Ok(meta_info)
    }

    /// Encodes metainfo as JSON.
    ///
    /// # Errors
    ///
    /// - `MetaInfoError::Json` - If encoding failed
    pub fn serialize(&self) -> Result<Vec<u8>, MetaInfoError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns the content name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the declared blob length.
    pub fn length(&self) -> u64 {
        self.info.length
    }

    /// Returns the nominal piece length.
    pub fn piece_length(&self) -> u64 {
        self.info.piece_length
    }

    /// Returns the number of pieces.
    pub fn piece_count(&self) -> usize {
        self.info.piece_hashes.len()
    }

    /// Returns the digest of piece `index`.
    pub fn piece_hash(&self, index: usize) -> Option<&PieceHash> {
        self.info.piece_hashes.get(index)
    }

    /// Returns the actual length of piece `index`; the last piece may be short.
    pub fn piece_len(&self, index: usize) -> Option<u64> {
        if index >= self.piece_count() {
            return None;
        }
        let start = index as u64 * self.info.piece_length;
        Some((self.info.length - start).min(self.info.piece_length))
    }

    fn validate(&self) -> Result<(), MetaInfoError> {
        let info = &self.info;
        if info.name.is_empty() {
            return Err(MetaInfoError::Invalid {
                reason: "empty name".to_string(),
            });
        }
        if info.piece_length == 0 {
            return Err(MetaInfoError::Invalid {
                reason: "piece length must be positive".to_string(),
            });
        }

        let expected = info.length.div_ceil(info.piece_length);
        if info.piece_hashes.len() as u64 != expected {
            return Err(MetaInfoError::Invalid {
                reason: format!(
                    "{} piece hashes for length {} and piece length {}, expected {expected}",
                    info.piece_hashes.len(),
                    info.length,
                    info.piece_length
                ),
            });
        }
        Ok(())
    }
}

/// Errors produced while encoding, decoding or validating metainfo.
#[derive(Debug, thiserror::Error)]
pub enum MetaInfoError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid metainfo: {reason}")]
    Invalid { reason: String },
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_from_blob_splits_pieces() {
        let blob = vec![7u8; 1024];
        let meta_info = MetaInfo::from_blob("abc", &blob, 300).unwrap();

        assert_eq!(meta_info.name(), "abc");
        assert_eq!(meta_info.length(), 1024);
        assert_eq!(meta_info.piece_length(), 300);
        assert_eq!(meta_info.piece_count(), 4);
        assert_eq!(meta_info.piece_len(0), Some(300));
        assert_eq!(meta_info.piece_len(3), Some(124));
        assert_eq!(meta_info.piece_len(4), None);
        assert_eq!(meta_info.piece_hash(0), Some(&PieceHash::of(&blob[..300])));
    }

    #[test]
    fn test_empty_blob_has_no_pieces() {
        let meta_info = MetaInfo::from_blob("empty", &[], 64).unwrap();
        assert_eq!(meta_info.piece_count(), 0);
        assert_eq!(meta_info.length(), 0);
    }

    #[test]
    fn test_piece_hash_encodes_as_hex() {
        let meta_info = MetaInfo::from_blob("abc", b"hello", 16).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&meta_info.serialize().unwrap()).unwrap();

        assert_eq!(
            json["info"]["piece_hashes"][0],
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let err = MetaInfo::deserialize(b"not json").unwrap_err();
        assert!(matches!(err, MetaInfoError::Json(_)));
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_piece_count() {
        let bytes =
            br#"{"info":{"name":"abc","length":1024,"piece_length":512,"piece_hashes":[]}}"#;
        let err = MetaInfo::deserialize(bytes).unwrap_err();
        assert!(matches!(err, MetaInfoError::Invalid { .. }));
    }

    #[test]
    fn test_deserialize_rejects_bad_piece_hash() {
        let bytes =
            br#"{"info":{"name":"abc","length":1,"piece_length":512,"piece_hashes":["zz"]}}"#;
        assert!(MetaInfo::deserialize(bytes).is_err());
    }

    #[test]
    fn test_zero_piece_length_rejected() {
        assert!(MetaInfo::from_blob("abc", b"data", 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_serialization_preserves_name_and_length(
            name in "[a-f0-9]{1,64}",
            blob in proptest::collection::vec(any::<u8>(), 0..4096),
            piece_length in 1u64..2048,
        ) {
            let original = MetaInfo::from_blob(name, &blob, piece_length).unwrap();
            let decoded = MetaInfo::deserialize(&original.serialize().unwrap()).unwrap();

            prop_assert_eq!(decoded.name(), original.name());
            prop_assert_eq!(decoded.length(), original.length());
            prop_assert_eq!(decoded, original);
        }
    }
}
