//! Tag assembly.
//!
//! [`TagParser`] drives the header, extended header and frame parsers over
//! one tag and collects the result into an owned [`ParsedTag`]:
//!
//! 1. Parse the fixed header (failures here abort the parse)
//! 2. Parse the extended header if the header flags announce one
//! 3. Walk the frames, decoding configured text frames
//!
//! Problems after step 1 never discard what was already decoded. They are
//! recorded as [`Diagnostic`]s on the returned tag instead.

use crate::error::{BodyError, DecodeError, Diagnostic, Error, Result, SizeField};
use crate::frame::{decode_text, FrameId, FrameReader, RawFrame};
use crate::header::{ExtendedHeader, TagHeader, HEADER_LEN};
use crate::synchsafe;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};

/// Text frames decoded by default
pub const DEFAULT_TEXT_FRAMES: &[&[u8; 4]] = &[
    b"TALB", b"TBPM", b"TCOM", b"TCON", b"TCOP", b"TDOR", b"TDRC", b"TDRL", b"TENC", b"TEXT",
    b"TIT1", b"TIT2", b"TIT3", b"TKEY", b"TLAN", b"TLEN", b"TMOO", b"TOAL", b"TOLY", b"TOPE",
    b"TPE1", b"TPE2", b"TPE3", b"TPE4", b"TPOS", b"TPUB", b"TRCK", b"TSOA", b"TSOP", b"TSOT",
    b"TSRC", b"TSSE", b"TYER",
];

/// Upper bound on the buffer reserved up front by [`TagParser::read_from`]
const MAX_PREALLOCATION: usize = 64 * 1024;

/// Value stored for a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameValue {
    /// Decoded text frame
    Text(String),
    /// Content of a frame that is not treated as text
    Binary(Vec<u8>),
    /// Text frame whose payload failed to decode
    Undecodable(DecodeError),
}

impl FrameValue {
    /// Returns the decoded text, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FrameValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Configuration for the tag parser
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Frame ids whose content is decoded as text
    pub text_frames: BTreeSet<FrameId>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            text_frames: DEFAULT_TEXT_FRAMES
                .iter()
                .map(|&&id| FrameId::new(id))
                .collect(),
        }
    }
}

impl ParserConfig {
    /// Creates a new parser config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame id to decode as text
    pub fn text_frame(mut self, id: FrameId) -> Self {
        self.text_frames.insert(id);
        self
    }

    /// Adds several frame ids to decode as text
    pub fn text_frames(mut self, ids: impl IntoIterator<Item = FrameId>) -> Self {
        self.text_frames.extend(ids);
        self
    }

    /// Replaces the text frame set
    pub fn only_text_frames(mut self, ids: impl IntoIterator<Item = FrameId>) -> Self {
        self.text_frames = ids.into_iter().collect();
        self
    }

    /// Returns true if frames with this id are decoded as text
    pub fn is_text_frame(&self, id: &FrameId) -> bool {
        self.text_frames.contains(id)
    }
}

/// A fully parsed tag.
///
/// Owns copies of everything it exposes; the input buffer can be dropped
/// once parsing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    header: TagHeader,
    extended_header: Option<ExtendedHeader>,
    frames: BTreeMap<FrameId, FrameValue>,
    diagnostics: Vec<Diagnostic>,
    display_name: Option<String>,
}

impl ParsedTag {
    /// Attaches the name used when title, artist or album are missing
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The tag header
    pub fn header(&self) -> &TagHeader {
        &self.header
    }

    /// The extended header, if the tag has one and it parsed
    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.extended_header.as_ref()
    }

    /// All frames, ordered by id
    pub fn frames(&self) -> impl Iterator<Item = (&FrameId, &FrameValue)> {
        self.frames.iter()
    }

    /// Number of distinct frame ids
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no frames were decoded
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Looks up a frame value
    pub fn frame(&self, id: &FrameId) -> Option<&FrameValue> {
        self.frames.get(id)
    }

    /// Decoded text of a frame, exactly as stored
    pub fn text(&self, id: &FrameId) -> Option<&str> {
        self.frame(id).and_then(FrameValue::as_text)
    }

    /// The NUL-separated values of a text frame
    ///
    /// A trailing terminator does not produce an empty value, and per-value
    /// byte order marks are dropped.
    pub fn text_values(&self, id: &FrameId) -> Vec<&str> {
        let Some(text) = self.text(id) else {
            return Vec::new();
        };
        let text = text.strip_suffix('\0').unwrap_or(text);
        text.split('\0')
            .map(|value| value.trim_start_matches('\u{FEFF}'))
            .collect()
    }

    fn first_text_or_name(&self, id: &FrameId) -> &str {
        self.text_values(id)
            .into_iter()
            .next()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.display_name())
    }

    /// Song title (TIT2), or the display name
    pub fn title(&self) -> &str {
        self.first_text_or_name(&FrameId::TITLE)
    }

    /// Lead artist (TPE1), or the display name
    pub fn artist(&self) -> &str {
        self.first_text_or_name(&FrameId::ARTIST)
    }

    /// Album (TALB), or the display name
    pub fn album(&self) -> &str {
        self.first_text_or_name(&FrameId::ALBUM)
    }

    /// The display name, or an empty string if none was given
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("")
    }

    /// Non-fatal problems found while parsing
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The error that stopped body parsing, if any
    pub fn stopped_early(&self) -> Option<&BodyError> {
        self.diagnostics.iter().find_map(|diag| match diag {
            Diagnostic::Stopped(err) => Some(err),
            _ => None,
        })
    }

    /// Returns true if the whole frame region was walked
    pub fn is_complete(&self) -> bool {
        self.stopped_early().is_none()
    }
}

/// ID3v2 tag parser
#[derive(Debug, Clone, Default)]
pub struct TagParser {
    config: ParserConfig,
}

impl TagParser {
    /// Creates a new parser with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new parser with custom configuration
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns the parser configuration
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse the tag at the start of `data`.
    ///
    /// At most `10 + header.size` bytes are inspected.
    pub fn parse(&self, data: &[u8]) -> Result<ParsedTag> {
        let header = TagHeader::parse(data)?;
        let mut diagnostics = Vec::new();

        if !synchsafe::is_synchsafe(&data[6..HEADER_LEN]) {
            diagnostics.push(Diagnostic::NonSynchsafeSize {
                field: SizeField::TagSize,
                offset: 6,
            });
        }

        let declared = header.body_len();
        let body = &data[HEADER_LEN..data.len().min(HEADER_LEN.saturating_add(declared))];
        if body.len() < declared {
            diagnostics.push(Diagnostic::BodyShort {
                declared,
                available: body.len(),
            });
        }
        if header.flags.unsynchronisation {
            diagnostics.push(Diagnostic::Unsynchronised);
        }

        let mut tag = ParsedTag {
            header,
            extended_header: None,
            frames: BTreeMap::new(),
            diagnostics,
            display_name: None,
        };

        let mut frames_start = 0;
        if header.flags.extended_header {
            match ExtendedHeader::parse(body, header.version, &mut tag.diagnostics) {
                Ok((extended, consumed)) => {
                    frames_start = consumed;
                    if consumed != extended.declared_len {
                        tag.diagnostics.push(Diagnostic::ExtendedHeaderSize {
                            declared: extended.declared_len,
                            consumed,
                        });
                        if extended.declared_len > consumed && extended.declared_len <= body.len() {
                            frames_start = extended.declared_len;
                        }
                    }
                    tag.extended_header = Some(extended);
                }
                Err(err) => {
                    tag.diagnostics.push(Diagnostic::Stopped(err));
                    return Ok(tag);
                }
            }
        }

        let reader = FrameReader::new(&body[frames_start..], header.version)
            .with_base_offset(frames_start);
        for item in reader {
            match item {
                Ok(frame) => {
                    if header.version.major >= 4 && !synchsafe::is_synchsafe(&frame.raw_size) {
                        tag.diagnostics.push(Diagnostic::NonSynchsafeSize {
                            field: SizeField::FrameSize(frame.id),
                            offset: HEADER_LEN + frame.offset + 4,
                        });
                    }
                    let value = self.decode_frame(&frame, &mut tag.diagnostics);
                    if tag.frames.insert(frame.id, value).is_some() {
                        trace!("Frame {} repeated, keeping the later one", frame.id);
                    }
                }
                Err(err) => {
                    tag.diagnostics.push(Diagnostic::Stopped(err));
                    break;
                }
            }
        }

        debug!(
            "Parsed ID3v{} tag: {} frames, {} diagnostics",
            header.version,
            tag.frames.len(),
            tag.diagnostics.len()
        );

        Ok(tag)
    }

    /// Read and parse a tag from the current position of `reader`.
    ///
    /// Consumes exactly the header and the declared tag body, leaving any
    /// footer or audio data unread.
    pub fn read_from<R: Read>(&self, mut reader: R) -> Result<ParsedTag> {
        let mut data = Vec::with_capacity(HEADER_LEN);
        reader
            .by_ref()
            .take(HEADER_LEN as u64)
            .read_to_end(&mut data)?;

        let header = TagHeader::parse(&data)?;
        // The declared size is untrusted; let the buffer grow with what arrives
        data.reserve(header.body_len().min(MAX_PREALLOCATION));
        reader.take(u64::from(header.size)).read_to_end(&mut data)?;

        self.parse(&data)
    }

    fn decode_frame(&self, frame: &RawFrame<'_>, diagnostics: &mut Vec<Diagnostic>) -> FrameValue {
        if !self.config.is_text_frame(&frame.id) {
            return FrameValue::Binary(frame.content.to_vec());
        }

        match decode_text(frame.content) {
            Ok(text) => FrameValue::Text(text),
            Err(cause) => {
                trace!("Frame {} failed to decode: {}", frame.id, cause);
                diagnostics.push(Diagnostic::Frame {
                    id: frame.id,
                    cause: cause.clone(),
                });
                FrameValue::Undecodable(cause)
            }
        }
    }
}

/// Parse the tag at the start of a file
///
/// The file name is attached as display name.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedTag> {
    parse_file_with_config(path, ParserConfig::default())
}

/// Parse the tag at the start of a file with custom configuration
pub fn parse_file_with_config(path: impl AsRef<Path>, config: ParserConfig) -> Result<ParsedTag> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::file_read(path, e))?;
    let tag = TagParser::with_config(config)
        .read_from(std::io::BufReader::new(file))
        .map_err(|e| match e {
            Error::Read(source) => Error::file_read(path, source),
            other => other,
        })?;

    match path.file_name() {
        Some(name) => Ok(tag.with_display_name(name.to_string_lossy())),
        None => Ok(tag),
    }
}
