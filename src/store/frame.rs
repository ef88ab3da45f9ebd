//! Store File Format
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ Header (48 bytes)                │
//! │ - magic: "CHRN"                  │
//! │ - format: u8 (+3 pad)            │
//! │ - schema_version: u64 LE         │
//! │ - key_check: [u8; 16]            │
//! │ - nonce_floor: u64 LE            │
//! │ - header_checksum: u32 LE        │
//! ├──────────────────────────────────┤
//! │ Frames (one per transaction)     │
//! │ - body_len: u32 LE               │
//! │ - checksum: u32 LE (CRC32 body)  │
//! │ - body:                          │
//! │   - nonce: u64 LE                │
//! │   - tag: [u8; 16] (Poly1305)     │
//! │   - ciphertext                   │
//! └──────────────────────────────────┘
//! ```
//!
//! `nonce_floor` is the first nonce this file may use. Compaction writes
//! a new file whose floor continues from the old one, so a nonce is never
//! reused under the same key.

use super::cipher::{KEY_CHECK_LEN, TAG_LEN};
use super::StoreError;

/// Store file magic number
pub const STORE_MAGIC: [u8; 4] = *b"CHRN";
/// Current file format version
pub const FORMAT_VERSION: u8 = 1;
/// Header size in bytes
pub const HEADER_SIZE: usize = 48;
/// Bytes a frame adds on top of its ciphertext
pub const FRAME_OVERHEAD: usize = 4 + 4 + 8 + TAG_LEN;

const BODY_PREFIX: usize = 8 + TAG_LEN;
const CHECKSUMMED_HEADER: usize = 40;

/// Fixed header at the start of every store file
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreHeader {
    pub schema_version: u64,
    pub key_check: [u8; KEY_CHECK_LEN],
    pub nonce_floor: u64,
}

impl StoreHeader {
    pub(crate) fn new(schema_version: u64, key_check: [u8; KEY_CHECK_LEN], nonce_floor: u64) -> Self {
        StoreHeader {
            schema_version,
            key_check,
            nonce_floor,
        }
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&STORE_MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&[0u8; 3]);
        buf.extend_from_slice(&self.schema_version.to_le_bytes());
        buf.extend_from_slice(&self.key_check);
        buf.extend_from_slice(&self.nonce_floor.to_le_bytes());
        debug_assert_eq!(buf.len(), CHECKSUMMED_HEADER);

        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        // Pad to fixed size
        buf.resize(HEADER_SIZE, 0);
        buf
    }

    /// Parse and validate magic, format and checksum.
    pub(crate) fn from_bytes(data: &[u8]) -> Result<Self, StoreError> {
        if data.len() < HEADER_SIZE {
            return Err(StoreError::Corruption {
                offset: 0,
                reason: format!("header truncated: {} of {} bytes", data.len(), HEADER_SIZE),
            });
        }
        if data[0..4] != STORE_MAGIC {
            return Err(StoreError::Corruption {
                offset: 0,
                reason: "bad magic".to_string(),
            });
        }
        let format = data[4];
        if format != FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormat(format));
        }

        let expected = read_u32(data, CHECKSUMMED_HEADER);
        let actual = crc32fast::hash(&data[..CHECKSUMMED_HEADER]);
        if expected != actual {
            return Err(StoreError::Corruption {
                offset: CHECKSUMMED_HEADER as u64,
                reason: format!(
                    "header checksum mismatch: expected {:08x}, got {:08x}",
                    expected, actual
                ),
            });
        }

        let mut key_check = [0u8; KEY_CHECK_LEN];
        key_check.copy_from_slice(&data[16..16 + KEY_CHECK_LEN]);

        Ok(StoreHeader {
            schema_version: read_u64(data, 8),
            key_check,
            nonce_floor: read_u64(data, 32),
        })
    }
}

/// One sealed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub nonce: u64,
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Frame {
    pub(crate) fn disk_size(&self) -> usize {
        FRAME_OVERHEAD + self.ciphertext.len()
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let body_len = (BODY_PREFIX + self.ciphertext.len()) as u32;
        let mut buf = Vec::with_capacity(self.disk_size());
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.tag);
        buf.extend_from_slice(&self.ciphertext);

        let checksum = crc32fast::hash(&buf[8..]);
        buf[4..8].copy_from_slice(&checksum.to_le_bytes());

        debug_assert_eq!(
            buf.len(),
            self.disk_size(),
            "Postcondition: encoded size must match expected"
        );
        buf
    }

    /// Decode the frame at the start of `data`. `offset` is its position
    /// in the file, for error reporting. Returns the frame and its size.
    pub(crate) fn decode(data: &[u8], offset: u64) -> Result<(Self, usize), StoreError> {
        if data.len() < 8 {
            return Err(truncated(offset, data.len(), 8));
        }
        let body_len = read_u32(data, 0) as usize;
        let checksum = read_u32(data, 4);
        if body_len < BODY_PREFIX {
            return Err(StoreError::Corruption {
                offset,
                reason: format!("frame body length {} below minimum", body_len),
            });
        }
        let total = 8 + body_len;
        if data.len() < total {
            return Err(truncated(offset, data.len(), total));
        }

        let body = &data[8..total];
        let actual = crc32fast::hash(body);
        if actual != checksum {
            return Err(StoreError::Corruption {
                offset,
                reason: format!(
                    "frame checksum mismatch: expected {:08x}, got {:08x}",
                    checksum, actual
                ),
            });
        }

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&body[8..BODY_PREFIX]);
        let frame = Frame {
            nonce: read_u64(body, 0),
            tag,
            ciphertext: body[BODY_PREFIX..].to_vec(),
        };
        Ok((frame, total))
    }
}

fn truncated(offset: u64, have: usize, need: usize) -> StoreError {
    StoreError::Corruption {
        offset,
        reason: format!("frame truncated: {} of {} bytes", have, need),
    }
}

// Callers check lengths first.
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}
