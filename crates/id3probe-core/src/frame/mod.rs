//! Frame sequence parsing.
//!
//! Each frame in the tag body is encoded as:
//!
//! ```text
//! 4  frame id, four characters from A-Z / 0-9
//! 4  content size (synchsafe in ID3v2.4, plain big-endian in ID3v2.3)
//! 2  flags
//! n  content
//! ```
//!
//! The sequence ends at the end of the body, or at the first all-zero id,
//! which marks the start of padding.

mod text;

use crate::error::BodyError;
use crate::header::Version;
use crate::synchsafe;
use bytes::Buf;
use tracing::trace;

pub use text::{decode_text, TextEncoding};

/// Length of a frame header in bytes
pub const FRAME_HEADER_LEN: usize = 10;

/// Four-character frame identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId([u8; 4]);

impl FrameId {
    /// Title / song name
    pub const TITLE: FrameId = FrameId(*b"TIT2");
    /// Lead performer
    pub const ARTIST: FrameId = FrameId(*b"TPE1");
    /// Album title
    pub const ALBUM: FrameId = FrameId(*b"TALB");

    /// Creates a frame id from raw bytes without validation
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parses a frame id from a string such as `"TIT2"`
    ///
    /// Returns `None` unless the string is four characters from `A-Z` / `0-9`.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().ok()?;
        let id = Self(bytes);
        id.is_valid().then_some(id)
    }

    /// Returns the raw id bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Returns true if every byte is an uppercase ASCII letter or digit
    pub fn is_valid(&self) -> bool {
        self.0
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Returns true for the padding marker (four zero bytes)
    pub fn is_padding(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "FrameId({})", self.as_str())
        } else {
            write!(f, "FrameId({:02X?})", self.0)
        }
    }
}

/// A single undecoded frame borrowed from the tag body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    /// Frame identifier
    pub id: FrameId,
    /// Size field exactly as stored in the frame header
    pub raw_size: [u8; 4],
    /// Frame flags, not interpreted
    pub flags: u16,
    /// Frame content, excluding the 10-byte frame header
    pub content: &'a [u8],
    /// Offset of the frame header within the tag body
    pub offset: usize,
}

/// Lazy iterator over the frames of a tag body.
///
/// Yields `Err` at most once, after which it is exhausted. A fresh reader is
/// needed to walk the frames again.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    len: usize,
    base_offset: usize,
    version: Version,
    done: bool,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over the frame region of a tag with the given version
    pub fn new(data: &'a [u8], version: Version) -> Self {
        Self {
            buf: data,
            len: data.len(),
            base_offset: 0,
            version,
            done: false,
        }
    }

    /// Reports offsets relative to a region starting `offset` bytes into the body
    pub fn with_base_offset(mut self, offset: usize) -> Self {
        self.base_offset = offset;
        self
    }

    /// Offset of the next unread byte within the tag body
    pub fn offset(&self) -> usize {
        self.base_offset + self.len - self.buf.remaining()
    }

    fn decode_size(&self, raw: [u8; 4]) -> usize {
        if self.version.major >= 4 {
            synchsafe::decode_u32(raw) as usize
        } else {
            u32::from_be_bytes(raw) as usize
        }
    }

    fn read_frame(&mut self) -> Option<Result<RawFrame<'a>, BodyError>> {
        let offset = self.offset();
        let remaining = self.buf.remaining();

        if remaining < 4 {
            trace!("{} trailing bytes at offset {}, ending frames", remaining, offset);
            return None;
        }

        let id = FrameId::new([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if id.is_padding() {
            trace!("Padding starts at offset {}", offset);
            return None;
        }
        if !id.is_valid() {
            return Some(Err(BodyError::InvalidFrameId {
                offset,
                bytes: *id.as_bytes(),
            }));
        }
        if remaining < FRAME_HEADER_LEN {
            return Some(Err(BodyError::TruncatedFrame {
                id,
                offset,
                declared: FRAME_HEADER_LEN,
                available: remaining,
            }));
        }

        self.buf.advance(4);
        let mut raw_size = [0u8; 4];
        self.buf.copy_to_slice(&mut raw_size);
        let size = self.decode_size(raw_size);
        let flags = self.buf.get_u16();

        if size > self.buf.remaining() {
            return Some(Err(BodyError::TruncatedFrame {
                id,
                offset,
                declared: size,
                available: self.buf.remaining(),
            }));
        }

        let buf: &'a [u8] = self.buf;
        let (content, rest) = buf.split_at(size);
        self.buf = rest;

        trace!("Frame {} at offset {} ({} bytes)", id, offset, size);

        Some(Ok(RawFrame {
            id,
            raw_size,
            flags,
            content,
            offset,
        }))
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<RawFrame<'a>, BodyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.read_frame();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl std::iter::FusedIterator for FrameReader<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const V4: Version = Version { major: 4, minor: 0 };
    const V3: Version = Version { major: 3, minor: 0 };

    fn frame(id: &[u8; 4], size: [u8; 4], content: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&size);
        out.extend_from_slice(&[0x00, 0x00]);
        out.extend_from_slice(content);
        out
    }

    #[test]
    fn test_frame_id_parse() {
        assert_eq!(FrameId::parse("TIT2"), Some(FrameId::TITLE));
        assert_eq!(FrameId::parse("tit2"), None);
        assert_eq!(FrameId::parse("TIT"), None);
        assert_eq!(FrameId::parse("TIT22"), None);
        assert!(!FrameId::new([0xFF, 0xFB, 0x90, 0x00]).is_valid());
    }

    #[test]
    fn test_single_frame_then_padding() {
        let mut body = frame(b"TIT2", [0, 0, 0, 6], b"\x00Hello");
        body.extend_from_slice(&[0, 0, 0, 0]);

        let frames: Vec<_> = FrameReader::new(&body, V4).collect();
        assert_eq!(frames.len(), 1);

        let first = frames[0].as_ref().unwrap();
        assert_eq!(first.id, FrameId::TITLE);
        assert_eq!(first.content, b"\x00Hello");
        assert_eq!(first.offset, 0);
    }

    #[test]
    fn test_ends_at_body_end() {
        let mut body = frame(b"TIT2", [0, 0, 0, 2], b"\x00A");
        body.extend(frame(b"TPE1", [0, 0, 0, 2], b"\x00B"));

        let ids: Vec<_> = FrameReader::new(&body, V4)
            .map(|f| f.unwrap().id)
            .collect();
        assert_eq!(ids, vec![FrameId::TITLE, FrameId::ARTIST]);
    }

    #[test]
    fn test_short_trailer_is_not_an_error() {
        let mut body = frame(b"TIT2", [0, 0, 0, 2], b"\x00A");
        body.extend_from_slice(&[0x54, 0x50]);
        assert_eq!(FrameReader::new(&body, V4).count(), 1);
    }

    #[test]
    fn test_truncated_frame_stops_sequence() {
        let mut body = frame(b"TIT2", [0, 0, 0, 2], b"\x00A");
        body.extend(frame(b"TALB", [0, 0, 0, 0x20], b"\x00short"));
        body.extend(frame(b"TPE1", [0, 0, 0, 2], b"\x00B"));

        let mut reader = FrameReader::new(&body, V4);
        assert!(reader.next().unwrap().is_ok());
        assert_eq!(
            reader.next().unwrap().unwrap_err(),
            BodyError::TruncatedFrame {
                id: FrameId::ALBUM,
                offset: 12,
                declared: 32,
                available: 18,
            }
        );
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_frame_header() {
        let body = b"TIT2\x00\x00";
        let err = FrameReader::new(body, V4).next().unwrap().unwrap_err();
        assert!(matches!(err, BodyError::TruncatedFrame { declared: 10, available: 6, .. }));
    }

    #[test]
    fn test_invalid_id_stops_sequence() {
        let mut body = frame(b"TIT2", [0, 0, 0, 2], b"\x00A");
        body.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64, 0, 0, 0, 0, 0, 0]);

        let frames: Vec<_> = FrameReader::new(&body, V4).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            Err(BodyError::InvalidFrameId {
                offset: 12,
                bytes: [0xFF, 0xFB, 0x90, 0x64],
            })
        );
    }

    #[test]
    fn test_v3_sizes_are_plain() {
        // 0x80 would be invalid as synchsafe; in v2.3 it means 128
        let content = vec![0u8; 128];
        let body = frame(b"APIC", [0, 0, 0, 0x80], &content);

        let first = FrameReader::new(&body, V3).next().unwrap().unwrap();
        assert_eq!(first.content.len(), 128);
        assert_eq!(first.raw_size, [0, 0, 0, 0x80]);
    }

    #[test]
    fn test_v4_sizes_are_synchsafe() {
        let content = vec![0u8; 257];
        let body = frame(b"APIC", [0, 0, 0x02, 0x01], &content);

        let first = FrameReader::new(&body, V4).next().unwrap().unwrap();
        assert_eq!(first.content.len(), 257);
    }

    #[test]
    fn test_base_offset() {
        let body = frame(b"TIT2", [0, 0, 0, 2], b"\x00A");
        let first = FrameReader::new(&body, V4)
            .with_base_offset(6)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(first.offset, 6);
    }
}
