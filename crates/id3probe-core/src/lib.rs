//! # id3probe-core
//!
//! A library for reading the ID3v2 tag prepended to audio files.
//!
//! This crate provides the core functionality for:
//! - Decoding the fixed tag header and the optional extended header
//! - Walking the frame sequence of ID3v2.3 and ID3v2.4 tags
//! - Decoding text frames in all four ID3v2 text encodings
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`synchsafe`]: 7-bit-per-byte size integers
//! - [`header`]: Tag header and extended header parsing
//! - [`frame`]: Frame iteration and text decoding
//! - [`tag`]: Assembly of a complete [`ParsedTag`]
//! - [`error`]: Error and diagnostic types
//!
//! ## Example
//!
//! ```no_run
//! use id3probe_core::TagParser;
//! use std::fs;
//!
//! let data = fs::read("./music/track01.mp3")?;
//! let tag = TagParser::new().parse(&data)?.with_display_name("track01.mp3");
//!
//! println!("{} - {}", tag.artist(), tag.title());
//! for diagnostic in tag.diagnostics() {
//!     eprintln!("warning: {}", diagnostic);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Parsing is a pure function of the input bytes, so many files can be
//! parsed concurrently with no coordination.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod frame;
pub mod header;
pub mod synchsafe;
pub mod tag;

// Re-export primary types for convenience
pub use error::{BodyError, DecodeError, Diagnostic, Error, Result, SizeField};
pub use frame::{decode_text, FrameId, FrameReader, RawFrame, TextEncoding};
pub use header::{ExtendedFlags, ExtendedHeader, HeaderFlags, TagHeader, Version};
pub use tag::{parse_file, parse_file_with_config, FrameValue, ParsedTag, ParserConfig, TagParser};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
