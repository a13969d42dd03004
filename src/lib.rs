//! # textarc
//!
//! Serialize a directory tree into a single, portable, human-readable
//! archive file, and back again. Five wire formats are supported: a
//! line-oriented text format, JSON, XML, a YAML subset, and Markdown, with
//! optional gzip wrapping detected transparently on the way back in.
//!
//! ## Features
//!
//! - **Streaming encode** with depth-1 read-ahead: the next file's content
//!   is read while the current entry is written
//! - **Parallel metadata collection** on a bounded worker pool, with
//!   deterministic path-sorted output
//! - **Safe extraction**: every restored path passes a traversal-proof
//!   sanitizer; hostile entries are skipped and reported, never written
//! - **Atomic output**: archives appear under their final name only after a
//!   fully successful encode
//! - **Binary-safe round trips**: text is trial-decoded across common
//!   encodings and normalized to UTF-8, everything else travels as base64
//!
//! ## Example
//!
//! ```no_run
//! use textarc::Combiner;
//! use std::path::Path;
//!
//! # fn main() -> textarc::Result<()> {
//! let combiner = Combiner::builder()
//!     .max_file_size("10M")
//!     .calculate_checksums(true)
//!     .build()?;
//!
//! let report = combiner.combine(
//!     Path::new("./my-project"),
//!     Path::new("project.json.gz"),
//!     true,
//!     None,
//! )?;
//! println!("archived {} files", report.files_processed);
//!
//! combiner.split(Path::new("project.json.gz"), Path::new("./restored"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Caveats
//!
//! Text content is normalized to UTF-8 with `\n` line endings; a lone
//! trailing newline is reconstructed exactly, but `\r\n` endings and runs of
//! trailing newlines are not preserved. Byte-exact round trips are
//! guaranteed for binary-classified files.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combiner;
pub mod content;
pub mod error;
pub mod formats;
pub mod pipeline;
pub mod restore;
pub mod sanitize;
pub mod scanner;
pub mod types;
pub mod utils;
pub mod writer;

pub use combiner::{Combiner, CombinerBuilder, DEFAULT_MAX_FILE_SIZE};
pub use error::{ArchiveError, Result};
pub use restore::FileRestorer;
pub use sanitize::sanitize;
pub use types::{
    ArchiveFormat, ArchiveHeader, CancellationToken, CombineReport, FileRecord, PreviewEntry,
    ProgressCallback, ProgressInfo, SplitReport,
};
pub use writer::AtomicArchiveWriter;
