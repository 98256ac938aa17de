//! id3probe - List ID3v2 metadata of audio files
//!
//! This tool reads the ID3v2 tag at the start of each audio file and prints
//! its artist and title, a JSON record, or every frame it contains.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use id3probe_core::{FrameId, FrameValue, ParsedTag, ParserConfig, TagParser};
use serde_json::{json, Map, Value};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// List ID3v2 metadata of audio files
#[derive(Parser, Debug)]
#[command(name = "id3probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// File extension to look for when walking a directory (repeatable)
    #[arg(short, long = "extension", default_value = "mp3")]
    extensions: Vec<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Additional frame id to decode as text, e.g. TXXX (repeatable)
    #[arg(long = "text-frame", value_parser = parse_frame_id)]
    text_frames: Vec<FrameId>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single audio file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of audio files to walk recursively
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for parsed tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// "artist - title", one line per file
    Text,
    /// One JSON object per line
    Json,
    /// Every frame of every tag
    Frames,
}

/// Running totals over all processed files
#[derive(Debug, Default)]
struct ScanStats {
    scanned: usize,
    tagged: usize,
    untagged: usize,
    failed: usize,
    with_diagnostics: usize,
}

impl ScanStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} scanned, {} tagged, {} untagged, {} failed, {} with warnings",
            self.scanned, self.tagged, self.untagged, self.failed, self.with_diagnostics
        );
    }
}

fn parse_frame_id(s: &str) -> std::result::Result<FrameId, String> {
    FrameId::parse(s).ok_or_else(|| format!("'{}' is not a frame id (four characters A-Z, 0-9)", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ParserConfig::new().text_frames(cli.text_frames.iter().copied());
    let parser = TagParser::with_config(config);

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, &parser, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, &parser, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single audio file
fn process_single_file(cli: &Cli, parser: &TagParser, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut stats = ScanStats::default();
    if let Some(line) = process_file(parser, file, cli.format, &mut stats)? {
        println!("{}", line);
    }
    Ok(())
}

/// Process a directory of audio files recursively
fn process_directory(cli: &Cli, parser: &TagParser, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut stats = ScanStats::default();
    for path in collect_files(directory, &cli.extensions) {
        debug!("Processing: {}", path.display());
        match process_file(parser, &path, cli.format, &mut stats) {
            Ok(Some(line)) => println!("{}", line),
            Ok(None) => {}
            Err(e) => {
                // Log error but continue with other files
                warn!("Error processing {}: {:#}", path.display(), e);
                stats.failed += 1;
            }
        }
    }

    stats.print_summary();
    Ok(())
}

/// Walk `directory` for non-hidden files with one of the given extensions
fn collect_files(directory: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extensions))
        .collect();

    files.sort();
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Parse one file and render it
///
/// Returns `Ok(None)` for files without an ID3v2 tag.
fn process_file(
    parser: &TagParser,
    path: &Path,
    format: OutputFormat,
    stats: &mut ScanStats,
) -> Result<Option<String>> {
    stats.scanned += 1;
    trace!("Reading {}", path.display());

    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let tag = match parser.read_from(BufReader::new(file)) {
        Ok(tag) => tag,
        Err(e) if e.is_untagged() => {
            debug!("No ID3v2 tag in {}: {}", path.display(), e);
            stats.untagged += 1;
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to parse tag: {}", path.display()));
        }
    };

    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag = tag.with_display_name(display_name);

    stats.tagged += 1;
    if !tag.diagnostics().is_empty() {
        stats.with_diagnostics += 1;
        for diagnostic in tag.diagnostics() {
            warn!("{}: {}", path.display(), diagnostic);
        }
    }

    Ok(Some(render(&tag, path, format)))
}

/// Render a parsed tag in the requested format
fn render(tag: &ParsedTag, path: &Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{} - {}", tag.artist(), tag.title()),
        OutputFormat::Json => to_json(tag, path).to_string(),
        OutputFormat::Frames => {
            let mut out = path.display().to_string();
            for (id, value) in tag.frames() {
                out.push_str(&format!("\n  {}: {}", id, describe_value(tag, id, value)));
            }
            out
        }
    }
}

fn describe_value(tag: &ParsedTag, id: &FrameId, value: &FrameValue) -> String {
    match value {
        FrameValue::Text(_) => tag.text_values(id).join(" / "),
        FrameValue::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        FrameValue::Undecodable(cause) => format!("<undecodable: {}>", cause),
    }
}

fn to_json(tag: &ParsedTag, path: &Path) -> Value {
    let frames: Map<String, Value> = tag
        .frames()
        .map(|(id, value)| {
            let value = match value {
                FrameValue::Text(_) => json!(tag.text_values(id)),
                FrameValue::Binary(bytes) => json!({ "bytes": bytes.len() }),
                FrameValue::Undecodable(cause) => json!({ "error": cause.to_string() }),
            };
            (id.to_string(), value)
        })
        .collect();

    let diagnostics: Vec<String> = tag.diagnostics().iter().map(|d| d.to_string()).collect();

    json!({
        "path": path.display().to_string(),
        "version": tag.header().version.to_string(),
        "title": tag.title(),
        "artist": tag.artist(),
        "album": tag.album(),
        "frames": frames,
        "complete": tag.is_complete(),
        "diagnostics": diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tag(path: &Path, frames: &[(&[u8; 4], &[u8])]) {
        let mut body = Vec::new();
        for (id, content) in frames {
            body.extend_from_slice(*id);
            body.extend_from_slice(&[0, 0, 0, content.len() as u8, 0, 0]);
            body.extend_from_slice(content);
        }
        let mut data = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, body.len() as u8];
        data.extend(body);
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);

        let mut file = fs::File::create(path).unwrap();
        file.write_all(&data).unwrap();
    }

    #[test]
    fn test_has_extension() {
        let mp3 = vec!["mp3".to_string()];
        assert!(has_extension(Path::new("/music/a.mp3"), &mp3));
        assert!(has_extension(Path::new("/music/A.MP3"), &mp3));
        assert!(!has_extension(Path::new("/music/a.flac"), &mp3));
        assert!(!has_extension(Path::new("/music/mp3"), &mp3));
        assert!(has_extension(Path::new("a.aiff"), &[".aiff".to_string()]));
    }

    #[test]
    fn test_collect_files_skips_hidden_and_foreign() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("album")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("album/01.mp3"), b"").unwrap();
        fs::write(root.join("album/cover.jpg"), b"").unwrap();
        fs::write(root.join(".cache/02.mp3"), b"").unwrap();
        fs::write(root.join(".hidden.mp3"), b"").unwrap();

        let files = collect_files(root, &["mp3".to_string()]);
        assert_eq!(files, vec![root.join("album/01.mp3")]);
    }

    #[test]
    fn test_process_file_text_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        write_tag(&path, &[(b"TIT2", &b"\x00Teardrop"[..]), (b"TPE1", &b"\x00Massive Attack"[..])]);

        let mut stats = ScanStats::default();
        let line = process_file(&TagParser::new(), &path, OutputFormat::Text, &mut stats).unwrap();

        assert_eq!(line.as_deref(), Some("Massive Attack - Teardrop"));
        assert_eq!(stats.tagged, 1);
        assert_eq!(stats.with_diagnostics, 0);
    }

    #[test]
    fn test_process_file_falls_back_to_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("unknown.mp3");
        write_tag(&path, &[(b"TALB", &b"\x00Mezzanine"[..])]);

        let mut stats = ScanStats::default();
        let line = process_file(&TagParser::new(), &path, OutputFormat::Text, &mut stats).unwrap();
        assert_eq!(line.as_deref(), Some("unknown.mp3 - unknown.mp3"));
    }

    #[test]
    fn test_process_untagged_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.mp3");
        fs::write(&path, [0xFF, 0xFB, 0x90, 0x64, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();

        let mut stats = ScanStats::default();
        let line = process_file(&TagParser::new(), &path, OutputFormat::Text, &mut stats).unwrap();

        assert!(line.is_none());
        assert_eq!(stats.untagged, 1);
        assert_eq!(stats.scanned, 1);
    }

    #[test]
    fn test_cut_short_tag_is_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cut.mp3");
        fs::write(&path, b"ID3\x04").unwrap();

        let mut stats = ScanStats::default();
        let result = process_file(&TagParser::new(), &path, OutputFormat::Text, &mut stats);

        assert!(result.is_err());
        assert_eq!(stats.untagged, 0);
    }

    #[test]
    fn test_json_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        write_tag(&path, &[(b"TIT2", &b"\x03Angel\x00"[..]), (b"TCON", &b"\x09??"[..])]);

        let mut stats = ScanStats::default();
        let line = process_file(&TagParser::new(), &path, OutputFormat::Json, &mut stats)
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["title"], "Angel");
        assert_eq!(value["version"], "2.4.0");
        assert_eq!(value["frames"]["TIT2"], json!(["Angel"]));
        assert!(value["frames"]["TCON"]["error"].is_string());
        assert_eq!(value["complete"], true);
        assert_eq!(value["diagnostics"].as_array().unwrap().len(), 1);
        assert_eq!(stats.with_diagnostics, 1);
    }

    #[test]
    fn test_frames_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        write_tag(&path, &[(b"TIT2", &b"\x00Hello"[..]), (b"PRIV", &b"\x01\x02\x03"[..])]);

        let mut stats = ScanStats::default();
        let out = process_file(&TagParser::new(), &path, OutputFormat::Frames, &mut stats)
            .unwrap()
            .unwrap();

        assert!(out.contains("\n  PRIV: <3 bytes>"));
        assert!(out.contains("\n  TIT2: Hello"));
    }

    #[test]
    fn test_parse_frame_id_arg() {
        assert_eq!(parse_frame_id("TXXX").unwrap(), FrameId::new(*b"TXXX"));
        assert!(parse_frame_id("txxx").is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
