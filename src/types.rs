//! Core data types used throughout the textarc library
//!
//! This module contains the data structures shared across components:
//!
//! - **Archive contents**: [`FileRecord`], [`ArchiveHeader`] — one entry's
//!   metadata and the archive-level header
//! - **Formats**: [`ArchiveFormat`] — the five supported wire formats
//! - **Operation results**: [`CombineReport`], [`SplitReport`], [`PreviewEntry`]
//! - **Control**: [`ProgressInfo`], [`ProgressCallback`], [`CancellationToken`]
//!
//! A [`FileRecord`]'s serialized field order is part of the wire contract of
//! the txt and JSON formats and must not be reordered.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ArchiveError;

/// Current archive format version, written into every header
pub const FORMAT_VERSION: &str = "2.0";

/// Generator string written into archive headers
pub const GENERATOR: &str = concat!("textarc v", env!("CARGO_PKG_VERSION"));

/// One archive entry's metadata
///
/// Constructed by the scanner with metadata only; the content codec fills in
/// `encoding`, `is_binary` and `ends_with_newline` while reading the file,
/// because the true encoding is only knowable after the bytes have been seen.
/// Records are immutable once handed to a format encoder.
///
/// `size` and `checksum` are advisory: the payload length is authoritative on
/// restore and checksums are never re-verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    /// Slash-separated path relative to the archive root
    pub path: String,
    /// Source file size in bytes (informational only)
    #[serde(default)]
    pub size: u64,
    /// Modification time, seconds since epoch
    #[serde(default)]
    pub mtime: f64,
    /// POSIX mode bits (optional restore)
    #[serde(default)]
    pub mode: u32,
    /// Encoding tag: `utf-8`, `utf-8-sig`, `latin1`, `cp1252`, `iso-8859-1` or `base64`
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Optional SHA-256 hex digest of the source bytes (advisory)
    #[serde(default)]
    pub checksum: Option<String>,
    /// Optional MIME type guess (advisory)
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Whether the payload is base64 of raw bytes
    #[serde(default)]
    pub is_binary: bool,
    /// Optional diagnostic, unused on the happy path
    #[serde(default)]
    pub error: Option<String>,
    /// Whether the restored text content must end with `\n`
    ///
    /// Defaults to `true` when a format omits the field, for backward
    /// compatibility with older archives. Only meaningful for text entries.
    #[serde(default = "default_true")]
    pub ends_with_newline: bool,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

impl FileRecord {
    /// Create a record with metadata only, prior to content classification
    pub fn new(path: impl Into<String>, size: u64, mtime: f64, mode: u32) -> Self {
        FileRecord {
            path: path.into(),
            size,
            mtime,
            mode,
            encoding: default_encoding(),
            checksum: None,
            mime_type: None,
            is_binary: false,
            error: None,
            ends_with_newline: false,
        }
    }
}

/// Archive-level header written before any entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveHeader {
    /// Archive format version
    pub version: String,
    /// Creation timestamp (UTC, `YYYY-MM-DD HH:MM:SS UTC`)
    pub created_at: String,
    /// Source directory as given at combine time
    pub source_path: String,
    /// Number of entries at encode time (informational)
    #[serde(default)]
    pub total_files: usize,
    /// Sum of source file sizes in bytes (informational)
    #[serde(default)]
    pub total_size: u64,
    /// Tool that produced the archive
    #[serde(default)]
    pub generator: String,
    /// Platform the archive was produced on
    #[serde(default)]
    pub platform: String,
    /// Entry paths in encode order, for formats that render a table of
    /// contents before the first entry; never serialized into the archive
    #[serde(skip)]
    pub entry_paths: Vec<String>,
}

impl ArchiveHeader {
    /// Build a header for a new archive
    pub fn new(source_path: &Path, total_files: usize, total_size: u64) -> Self {
        ArchiveHeader {
            version: FORMAT_VERSION.to_string(),
            created_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            source_path: source_path.display().to_string(),
            total_files,
            total_size,
            generator: GENERATOR.to_string(),
            platform: std::env::consts::OS.to_string(),
            entry_paths: Vec::new(),
        }
    }

    /// Attach the sorted path list for formats that emit a table of contents
    pub fn with_entry_paths(mut self, paths: Vec<String>) -> Self {
        self.entry_paths = paths;
        self
    }
}

/// The supported archive wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Line-oriented text format with `=== FILE_SEPARATOR ===` blocks
    Txt,
    /// Single JSON document with `metadata` and `files`
    Json,
    /// Single `<file_archive>` root element
    Xml,
    /// Restricted YAML subset with 6-space block literals
    Yaml,
    /// Table of contents plus fenced code blocks
    Markdown,
}

impl ArchiveFormat {
    /// All formats, in detection-preference order
    pub const ALL: [ArchiveFormat; 5] = [
        ArchiveFormat::Txt,
        ArchiveFormat::Json,
        ArchiveFormat::Xml,
        ArchiveFormat::Yaml,
        ArchiveFormat::Markdown,
    ];

    /// Canonical lowercase name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Txt => "txt",
            ArchiveFormat::Json => "json",
            ArchiveFormat::Xml => "xml",
            ArchiveFormat::Yaml => "yaml",
            ArchiveFormat::Markdown => "markdown",
        }
    }

    /// Map a file extension (without the dot, `.gz` already stripped) to a format
    pub fn from_extension(ext: &str) -> Option<ArchiveFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(ArchiveFormat::Txt),
            "json" => Some(ArchiveFormat::Json),
            "xml" => Some(ArchiveFormat::Xml),
            "yaml" | "yml" => Some(ArchiveFormat::Yaml),
            "md" | "markdown" => Some(ArchiveFormat::Markdown),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ArchiveFormat::Txt),
            "json" => Ok(ArchiveFormat::Json),
            "xml" => Ok(ArchiveFormat::Xml),
            "yaml" | "yml" => Ok(ArchiveFormat::Yaml),
            "markdown" | "md" => Ok(ArchiveFormat::Markdown),
            other => Err(ArchiveError::UnknownFormat(other.to_string())),
        }
    }
}

/// Result of a combine operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineReport {
    /// Archive file that was written
    pub output_path: PathBuf,
    /// Format the archive was written in
    pub format: ArchiveFormat,
    /// Whether the archive is gzip-wrapped
    pub compressed: bool,
    /// Entries written into the archive
    pub files_processed: usize,
    /// Files skipped by the exclusion predicate or size ceiling
    pub files_skipped: usize,
    /// Per-file errors (file dropped, operation continued)
    pub errors: usize,
    /// Sum of source sizes of processed files
    pub bytes_processed: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Result of a split operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    /// Directory the entries were restored into
    pub output_dir: PathBuf,
    /// Format that was detected or forced
    pub format: ArchiveFormat,
    /// Entries successfully restored
    pub files_restored: usize,
    /// Per-file errors (entry dropped, operation continued)
    pub errors: usize,
    /// Entries rejected by the path sanitizer, with reasons
    pub security_blocked: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// One line of a dry-run preview
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    /// Slash-separated path relative to the source root
    pub path: String,
    /// Source size in bytes (0 when the file would be skipped)
    pub size: u64,
    /// Whether the file classified as binary
    pub is_binary: bool,
    /// Skip reason; `None` means the file would be included
    pub skip_reason: Option<String>,
}

/// Progress callback for long-running operations
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: usize,
    /// Total items to process (if known)
    pub total: Option<usize>,
    /// Bytes processed so far
    pub bytes_processed: u64,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f32 / total as f32) * 100.0),
            _ => None,
        }
    }
}

/// Cooperative cancellation handle threaded through combine and split
///
/// Cloning is cheap; all clones share the same flag. Once cancelled, the
/// pipeline stops issuing new reads, in-flight work is drained, and the
/// operation returns [`ArchiveError::Cancelled`]. Temporary files are
/// removed on every exit path regardless.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; safe to call from any thread or signal context
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_defaults() {
        // Older archives omit ends_with_newline; it must default to true.
        let json = r#"{"path":"a.txt","size":3,"mtime":1.0,"mode":420,"encoding":"utf-8"}"#;
        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert!(record.ends_with_newline);
        assert!(!record.is_binary);
        assert_eq!(record.checksum, None);
    }

    #[test]
    fn test_record_json_field_order() {
        let record = FileRecord::new("a.txt", 3, 1.5, 0o644);
        let json = serde_json::to_string(&record).unwrap();
        // Serialized field order is part of the txt/JSON wire contract.
        assert!(json.starts_with(r#"{"path":"a.txt","size":3,"mtime":1.5,"mode":420,"#));
        assert!(json.contains(r#""checksum":null"#));
    }

    #[test]
    fn test_format_round_trip_names() {
        for format in ArchiveFormat::ALL {
            assert_eq!(format, format.as_str().parse().unwrap());
        }
        assert!("tsv".parse::<ArchiveFormat>().is_err());
        assert_eq!(ArchiveFormat::from_extension("yml"), Some(ArchiveFormat::Yaml));
        assert_eq!(ArchiveFormat::from_extension("bin"), None);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_progress_percentage() {
        let info = ProgressInfo {
            operation: "Combining files".to_string(),
            current_item: None,
            processed: 50,
            total: Some(100),
            bytes_processed: 0,
        };
        assert_eq!(info.percentage(), Some(50.0));
    }
}
