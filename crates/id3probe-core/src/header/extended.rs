//! Extended header parsing.
//!
//! The extended header sits between the tag header and the first frame and
//! is only present when [`HeaderFlags::extended_header`](super::HeaderFlags)
//! is set.
//!
//! ID3v2.4 layout:
//!
//! ```text
//! 4  size (synchsafe, includes these 4 bytes)
//! 1  number of flag bytes
//! 1  extended flags %abc00000
//!    a: tag is an update   -> 1 byte length indicator (always 0)
//!    b: CRC data present   -> 1 byte length indicator, 5 byte synchsafe CRC
//!    c: tag restrictions   -> 1 byte length indicator, 1 byte restrictions
//! ```
//!
//! ID3v2.3 layout:
//!
//! ```text
//! 4  size (big-endian, excludes these 4 bytes)
//! 2  flags, bit 15 = CRC data present
//! 4  padding size (big-endian)
//! 4  CRC (big-endian, only if flagged)
//! ```

use super::{Version, HEADER_LEN};
use crate::error::{BodyError, Diagnostic, SizeField};
use crate::synchsafe;
use bytes::Buf;
use tracing::trace;

/// Extended header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedFlags {
    /// The tag updates an earlier tag
    pub tag_is_update: bool,
    /// A CRC-32 of the tag data follows
    pub crc_data_present: bool,
    /// Tag restrictions follow
    pub tag_restrictions: bool,
}

impl From<u8> for ExtendedFlags {
    fn from(byte: u8) -> Self {
        Self {
            tag_is_update: byte & 0x80 != 0,
            crc_data_present: byte & 0x40 != 0,
            tag_restrictions: byte & 0x20 != 0,
        }
    }
}

/// Decoded extended header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    /// Size field as stored in the tag
    pub size: u32,
    /// Number of flag bytes (1 for ID3v2.4, 2 for ID3v2.3)
    pub flag_bytes: u8,
    /// Extended flags
    pub flags: ExtendedFlags,
    /// CRC value, if present
    pub crc: Option<u64>,
    /// Restrictions bitfield, if present
    pub restrictions: Option<u8>,
    /// Padding size (ID3v2.3 only)
    pub padding_size: Option<u32>,
    /// Bytes of the tag body the extended header declares to span
    pub declared_len: usize,
}

impl ExtendedHeader {
    /// Parse the extended header at the start of the tag body.
    ///
    /// Returns the header and the number of bytes its fields actually
    /// consumed, which may differ from [`ExtendedHeader::declared_len`].
    /// Synchsafe fields with a high bit set are reported to `diagnostics`.
    pub fn parse(
        body: &[u8],
        version: Version,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(Self, usize), BodyError> {
        let mut reader = FieldReader::new(body);
        let header = if version.major == 3 {
            Self::parse_v3(&mut reader)?
        } else {
            Self::parse_v4(&mut reader, diagnostics)?
        };
        let consumed = reader.offset();

        trace!(
            "Extended header: declared {} bytes, consumed {}",
            header.declared_len,
            consumed
        );

        Ok((header, consumed))
    }

    fn parse_v4(
        reader: &mut FieldReader<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self, BodyError> {
        let size = synchsafe::decode_u32(reader.synchsafe_array(
            SizeField::ExtendedHeaderSize,
            diagnostics,
        )?);
        let flag_bytes = reader.u8()?;
        let flags = ExtendedFlags::from(reader.u8()?);

        if flags.tag_is_update {
            reader.skip(1)?;
        }

        let crc = if flags.crc_data_present {
            reader.skip(1)?;
            Some(synchsafe::decode(&reader.synchsafe_array::<5>(
                SizeField::ExtendedHeaderCrc,
                diagnostics,
            )?))
        } else {
            None
        };

        let restrictions = if flags.tag_restrictions {
            reader.skip(1)?;
            Some(reader.u8()?)
        } else {
            None
        };

        Ok(Self {
            size,
            flag_bytes,
            flags,
            crc,
            restrictions,
            padding_size: None,
            declared_len: size as usize,
        })
    }

    fn parse_v3(reader: &mut FieldReader<'_>) -> Result<Self, BodyError> {
        let size = u32::from_be_bytes(reader.array()?);
        let raw_flags = u16::from_be_bytes(reader.array()?);
        let padding_size = u32::from_be_bytes(reader.array()?);

        let flags = ExtendedFlags {
            crc_data_present: raw_flags & 0x8000 != 0,
            ..ExtendedFlags::default()
        };
        let crc = if flags.crc_data_present {
            Some(u64::from(u32::from_be_bytes(reader.array()?)))
        } else {
            None
        };

        Ok(Self {
            size,
            flag_bytes: 2,
            flags,
            crc,
            restrictions: None,
            padding_size: Some(padding_size),
            declared_len: (size as usize).saturating_add(4),
        })
    }
}

/// Bounds-checked field reader over the start of the tag body
struct FieldReader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), BodyError> {
        if self.buf.remaining() < needed {
            return Err(BodyError::truncated_extended_header(
                self.offset(),
                needed,
                self.buf.remaining(),
            ));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, BodyError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn skip(&mut self, n: usize) -> Result<(), BodyError> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BodyError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    fn synchsafe_array<const N: usize>(
        &mut self,
        field: SizeField,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<[u8; N], BodyError> {
        let offset = HEADER_LEN + self.offset();
        let out = self.array::<N>()?;
        if !synchsafe::is_synchsafe(&out) {
            diagnostics.push(Diagnostic::NonSynchsafeSize { field, offset });
        }
        Ok(out)
    }
}
