//! Tagged record codec
//!
//! Every value the store writes is a one-byte tag followed by the user
//! payload:
//!
//! ```text
//! ┌─────────┬──────────────────────┐
//! │ Tag (1) │ Payload (N bytes)    │
//! └─────────┴──────────────────────┘
//!   bit 0: splayed   promoted by an earlier read
//!   bit 1: merged    folded by a compaction since the last promotion
//!   bits 2-7: reserved, must be zero
//! ```

use thiserror::Error;

/// Size of the tag prefix in bytes
pub const TAG_SIZE: usize = 1;

/// Placeholder value written by an older, destructive splaying scheme
///
/// Never produced by this crate; compactions remove it. Its first byte
/// (`b't'`) has reserved tag bits set, so it never decodes as a record.
pub const LEGACY_SENTINEL: &[u8] = b"this key was splayed";

/// Why a stored value is not a well-formed tagged record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record is empty, expected at least a tag byte")]
    Empty,

    #[error("tag byte {0:#04x} has reserved bits set")]
    ReservedBits(u8),
}

/// Per-record metadata byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag(u8);

impl Tag {
    pub const SPLAYED: u8 = 0x01;
    pub const MERGED: u8 = 0x02;
    const DEFINED: u8 = Self::SPLAYED | Self::MERGED;

    /// No bits set: a freshly inserted record
    pub const fn empty() -> Self {
        Tag(0)
    }

    pub const fn new(splayed: bool, merged: bool) -> Self {
        let mut bits = 0;
        if splayed {
            bits |= Self::SPLAYED;
        }
        if merged {
            bits |= Self::MERGED;
        }
        Tag(bits)
    }

    /// Tag written back by a read-triggered promotion: `{merged: 0, splayed: 1}`
    pub const fn promoted() -> Self {
        Tag(Self::SPLAYED)
    }

    /// Parse a tag byte, rejecting reserved bits
    pub const fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        if byte & !Self::DEFINED != 0 {
            return Err(DecodeError::ReservedBits(byte));
        }
        Ok(Tag(byte))
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub const fn is_splayed(self) -> bool {
        self.0 & Self::SPLAYED != 0
    }

    pub const fn is_merged(self) -> bool {
        self.0 & Self::MERGED != 0
    }

    pub const fn with_merged(self, merged: bool) -> Self {
        if merged {
            Tag(self.0 | Self::MERGED)
        } else {
            Tag(self.0 & !Self::MERGED)
        }
    }

    pub const fn with_splayed(self, splayed: bool) -> Self {
        if splayed {
            Tag(self.0 | Self::SPLAYED)
        } else {
            Tag(self.0 & !Self::SPLAYED)
        }
    }
}

/// Prefix `value` with `tag`
pub fn encode_tagged(tag: Tag, value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(TAG_SIZE + value.len());
    record.push(tag.as_byte());
    record.extend_from_slice(value);
    record
}

/// Split a stored record into its tag and a borrowed payload
pub fn decode_tagged(bytes: &[u8]) -> Result<(Tag, &[u8]), DecodeError> {
    let (&first, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;
    Ok((Tag::from_byte(first)?, payload))
}
