//! ID3v2 tag header parsing.
//!
//! ## Layout
//!
//! ```text
//! offset  size  field
//! 0       3     file identifier "ID3"
//! 3       1     major version
//! 4       1     revision
//! 5       1     flags %abcd0000
//! 6       4     tag size (synchsafe)
//! ```
//!
//! Flags: `a` unsynchronisation, `b` extended header, `c` experimental,
//! `d` footer present.
//!
//! The tag size counts everything after the header (extended header, frames
//! and padding) but excludes a footer.

mod extended;

use crate::error::{Error, Result};
use crate::synchsafe;

pub use extended::{ExtendedFlags, ExtendedHeader};

/// Length of the fixed tag header in bytes
pub const HEADER_LEN: usize = 10;

/// Length of the optional tag footer in bytes
pub const FOOTER_LEN: usize = 10;

/// Magic bytes at the start of every ID3v2 tag
pub const FILE_IDENTIFIER: &[u8; 3] = b"ID3";

/// Major versions this parser understands
pub const SUPPORTED_MAJOR_VERSIONS: [u8; 2] = [3, 4];

/// Tag version (`2.major.minor`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Major version, 3 or 4
    pub major: u8,
    /// Revision number
    pub minor: u8,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "2.{}.{}", self.major, self.minor)
    }
}

/// Tag header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    /// Bit 7: unsynchronisation applied to all frames
    pub unsynchronisation: bool,
    /// Bit 6: an extended header follows
    pub extended_header: bool,
    /// Bit 5: experimental tag
    pub experimental: bool,
    /// Bit 4: a footer ends the tag
    pub footer_present: bool,
}

impl From<u8> for HeaderFlags {
    fn from(byte: u8) -> Self {
        Self {
            unsynchronisation: byte & 0x80 != 0,
            extended_header: byte & 0x40 != 0,
            experimental: byte & 0x20 != 0,
            footer_present: byte & 0x10 != 0,
        }
    }
}

/// The fixed 10-byte tag header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    /// Tag version
    pub version: Version,
    /// Header flags
    pub flags: HeaderFlags,
    /// Size of everything after the header, excluding a footer
    pub size: u32,
}

impl TagHeader {
    /// Parse the header from the start of `data`.
    ///
    /// Only the first [`HEADER_LEN`] bytes are inspected.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let prefix = &data[..data.len().min(FILE_IDENTIFIER.len())];
        if prefix != &FILE_IDENTIFIER[..prefix.len()] {
            return Err(Error::not_an_id3_tag(prefix));
        }
        if data.len() < HEADER_LEN {
            return Err(Error::TruncatedHeader {
                available: data.len(),
            });
        }

        let version = Version {
            major: data[3],
            minor: data[4],
        };
        if version.major == 0xFF
            || version.minor == 0xFF
            || !SUPPORTED_MAJOR_VERSIONS.contains(&version.major)
        {
            return Err(Error::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
            });
        }

        Ok(Self {
            version,
            flags: HeaderFlags::from(data[5]),
            size: synchsafe::decode_u32([data[6], data[7], data[8], data[9]]),
        })
    }

    /// Size of the tag body in bytes
    pub fn body_len(&self) -> usize {
        self.size as usize
    }

    /// Total on-disk size of the tag, including header and footer
    pub fn total_size(&self) -> usize {
        let footer = if self.flags.footer_present {
            FOOTER_LEN
        } else {
            0
        };
        HEADER_LEN + self.body_len() + footer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_header() {
        let data = [b'I', b'D', b'3', 0x04, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01];
        let header = TagHeader::parse(&data).unwrap();

        assert_eq!(header.version, Version { major: 4, minor: 0 });
        assert_eq!(header.flags, HeaderFlags::default());
        assert_eq!(header.size, 257);
        assert_eq!(header.total_size(), 267);
    }

    #[test]
    fn test_parse_extended_header_flag() {
        let data = [b'I', b'D', b'3', 0x04, 0x00, 0x40, 0x00, 0x00, 0x00, 0x0A];
        let header = TagHeader::parse(&data).unwrap();

        assert_eq!(
            header.flags,
            HeaderFlags {
                extended_header: true,
                ..HeaderFlags::default()
            }
        );
    }

    #[test]
    fn test_parse_all_flags() {
        let flags = HeaderFlags::from(0xF0);
        assert!(flags.unsynchronisation);
        assert!(flags.extended_header);
        assert!(flags.experimental);
        assert!(flags.footer_present);
    }

    #[test]
    fn test_footer_counts_towards_total_size() {
        let data = [b'I', b'D', b'3', 0x04, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05];
        let header = TagHeader::parse(&data).unwrap();
        assert_eq!(header.total_size(), 25);
    }

    #[test]
    fn test_not_an_id3_tag() {
        let data = b"RIFF\x00\x00\x00\x00WAVE";
        assert!(matches!(
            TagHeader::parse(data),
            Err(Error::NotAnId3Tag { .. })
        ));
    }

    #[test]
    fn test_short_foreign_prefix_is_not_a_tag() {
        assert!(matches!(
            TagHeader::parse(b"RI"),
            Err(Error::NotAnId3Tag { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            TagHeader::parse(b"ID3\x04"),
            Err(Error::TruncatedHeader { available: 4 })
        ));
        assert!(matches!(
            TagHeader::parse(&[]),
            Err(Error::TruncatedHeader { available: 0 })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let v22 = [b'I', b'D', b'3', 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            TagHeader::parse(&v22),
            Err(Error::UnsupportedVersion { major: 2, minor: 0 })
        ));

        let bad_revision = [b'I', b'D', b'3', 0x04, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            TagHeader::parse(&bad_revision),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_v23_is_supported() {
        let data = [b'I', b'D', b'3', 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let header = TagHeader::parse(&data).unwrap();
        assert_eq!(header.version.to_string(), "2.3.0");
    }
}
