//! Text frame decoding.
//!
//! The first content byte of a text frame selects the encoding of the rest:
//!
//! - 0: ISO-8859-1
//! - 1: UTF-16, little-endian unless a byte order mark says otherwise
//! - 2: UTF-16BE, no byte order mark
//! - 3: UTF-8
//!
//! Payload boundaries are taken exactly as declared by the frame size. NUL
//! separators and terminators survive decoding.

use crate::error::DecodeError;

/// Text encoding selected by the first byte of a text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextEncoding {
    /// ISO-8859-1
    Latin1 = 0,
    /// UTF-16 with optional byte order mark, little-endian by default
    Utf16 = 1,
    /// UTF-16 big-endian
    Utf16Be = 2,
    /// UTF-8
    Utf8 = 3,
}

impl TryFrom<u8> for TextEncoding {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(TextEncoding::Latin1),
            1 => Ok(TextEncoding::Utf16),
            2 => Ok(TextEncoding::Utf16Be),
            3 => Ok(TextEncoding::Utf8),
            _ => Err(DecodeError::UnknownEncoding(value)),
        }
    }
}

impl TextEncoding {
    /// Decode a payload (without the encoding byte) under this encoding
    pub fn decode(self, payload: &[u8]) -> Result<String, DecodeError> {
        match self {
            TextEncoding::Latin1 => Ok(payload.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Utf16 => match payload {
                [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, Endian::Little),
                [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, Endian::Big),
                _ => decode_utf16(payload, Endian::Little),
            },
            TextEncoding::Utf16Be => decode_utf16(payload, Endian::Big),
            TextEncoding::Utf8 => String::from_utf8(payload.to_vec()).map_err(|e| {
                DecodeError::InvalidUtf8 {
                    valid_up_to: e.utf8_error().valid_up_to(),
                }
            }),
        }
    }
}

/// Decode the full content of a text frame, encoding byte included.
pub fn decode_text(content: &[u8]) -> Result<String, DecodeError> {
    let (&encoding, payload) = content
        .split_first()
        .ok_or(DecodeError::MissingEncoding)?;
    TextEncoding::try_from(encoding)?.decode(payload)
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn decode_utf16(payload: &[u8], endian: Endian) -> Result<String, DecodeError> {
    if payload.len() % 2 != 0 {
        return Err(DecodeError::OddUtf16Length(payload.len()));
    }

    let units = payload.chunks_exact(2).map(|pair| match endian {
        Endian::Little => u16::from_le_bytes([pair[0], pair[1]]),
        Endian::Big => u16::from_be_bytes([pair[0], pair[1]]),
    });

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| DecodeError::InvalidUtf16)
}
