//! Error types for the id3probe-core library.
//!
//! Failures are split by how far they reach:
//!
//! - [`Error`] aborts a parse entirely (no usable header).
//! - [`BodyError`] stops the tag body early; frames decoded before it are kept.
//! - [`DecodeError`] only affects the value of a single text frame.
//!
//! Non-fatal conditions are collected as [`Diagnostic`]s on the parsed tag.

use crate::frame::FrameId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for id3probe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error for a single tag parse
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to read from a byte stream
    #[error("failed to read tag bytes: {0}")]
    Read(#[from] std::io::Error),

    /// The buffer does not start with the "ID3" identifier
    #[error("not an ID3v2 tag (found identifier {found:02X?})")]
    NotAnId3Tag {
        /// The three bytes found where "ID3" was expected
        found: Vec<u8>,
    },

    /// Fewer than 10 bytes were available for the tag header
    #[error("truncated tag header: need 10 bytes, have {available}")]
    TruncatedHeader {
        /// Number of bytes that were available
        available: usize,
    },

    /// The tag claims a version this parser does not handle
    #[error("unsupported ID3v2 version 2.{major}.{minor}")]
    UnsupportedVersion {
        /// Major version byte
        major: u8,
        /// Revision byte
        minor: u8,
    },

    /// Malformed tag body
    #[error(transparent)]
    Body(#[from] BodyError),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new identifier mismatch error
    pub fn not_an_id3_tag(found: &[u8]) -> Self {
        Self::NotAnId3Tag {
            found: found.to_vec(),
        }
    }

    /// Returns true if the input simply carries no ID3v2 tag
    ///
    /// Callers should treat such files as untagged rather than broken. A
    /// header that starts with "ID3" but is cut short is broken, not untagged.
    pub fn is_untagged(&self) -> bool {
        matches!(self, Self::NotAnId3Tag { .. })
    }
}

/// Error inside the tag body that ends parsing of the remaining bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BodyError {
    /// The extended header ran out of bytes mid-field
    #[error("truncated extended header at offset {offset}: need {needed} bytes, have {available}")]
    TruncatedExtendedHeader {
        /// Offset within the tag body
        offset: usize,
        /// Bytes required by the field being read
        needed: usize,
        /// Bytes that were left
        available: usize,
    },

    /// A frame declares more content than the body holds
    #[error("truncated frame {id} at offset {offset}: declares {declared} bytes, {available} available")]
    TruncatedFrame {
        /// Identifier of the offending frame
        id: FrameId,
        /// Offset of the frame header within the tag body
        offset: usize,
        /// Declared frame size (content for a complete header, 10 otherwise)
        declared: usize,
        /// Bytes that were left
        available: usize,
    },

    /// Bytes where a frame id was expected are not a valid id
    #[error("invalid frame id {bytes:02X?} at offset {offset}")]
    InvalidFrameId {
        /// Offset within the tag body
        offset: usize,
        /// The raw id bytes
        bytes: [u8; 4],
    },
}

impl BodyError {
    /// Creates a new extended header truncation error
    pub fn truncated_extended_header(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedExtendedHeader {
            offset,
            needed,
            available,
        }
    }
}

/// Failure to decode the payload of a text frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The frame has no encoding byte at all
    #[error("text frame is empty (missing encoding byte)")]
    MissingEncoding,

    /// The encoding byte is not one of 0..=3
    #[error("unknown text encoding {0:#04x}")]
    UnknownEncoding(u8),

    /// UTF-16 payload with a dangling byte
    #[error("UTF-16 payload has odd length {0}")]
    OddUtf16Length(usize),

    /// UTF-16 payload with an unpaired surrogate
    #[error("invalid UTF-16 sequence")]
    InvalidUtf16,

    /// UTF-8 payload that is not valid UTF-8
    #[error("invalid UTF-8 sequence after {valid_up_to} bytes")]
    InvalidUtf8 {
        /// Length of the valid prefix
        valid_up_to: usize,
    },
}

/// A size field that is expected to be synchsafe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    /// Tag size in the fixed header
    TagSize,
    /// Size of the extended header
    ExtendedHeaderSize,
    /// CRC value in the extended header
    ExtendedHeaderCrc,
    /// Content size of a frame
    FrameSize(FrameId),
}

impl std::fmt::Display for SizeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeField::TagSize => f.write_str("tag size"),
            SizeField::ExtendedHeaderSize => f.write_str("extended header size"),
            SizeField::ExtendedHeaderCrc => f.write_str("extended header CRC"),
            SizeField::FrameSize(id) => write!(f, "size of frame {}", id),
        }
    }
}

/// Non-fatal condition recorded while parsing a tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Diagnostic {
    /// The extended header did not span its declared size
    #[error("extended header declares {declared} bytes but {consumed} were read")]
    ExtendedHeaderSize {
        /// Declared size
        declared: usize,
        /// Bytes actually consumed by its fields
        consumed: usize,
    },

    /// The input ended before the declared tag size
    #[error("tag declares {declared} body bytes but only {available} are present")]
    BodyShort {
        /// Declared body size
        declared: usize,
        /// Bytes present
        available: usize,
    },

    /// A synchsafe field has a byte with its high bit set
    ///
    /// The value was decoded without masking and is likely inflated.
    #[error("{field} at offset {offset} is not synchsafe")]
    NonSynchsafeSize {
        /// Which field was malformed
        field: SizeField,
        /// Offset of the field from the start of the tag
        offset: usize,
    },

    /// The tag is unsynchronised and frame contents were taken as-is
    #[error("tag uses unsynchronisation; frame contents are not reversed")]
    Unsynchronised,

    /// A text frame could not be decoded
    #[error("frame {id}: {cause}")]
    Frame {
        /// Identifier of the frame
        id: FrameId,
        /// Underlying decode failure
        cause: DecodeError,
    },

    /// Parsing of the tag body stopped early
    #[error("parse stopped early: {0}")]
    Stopped(BodyError),
}
