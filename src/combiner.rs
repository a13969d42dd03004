//! High-level combine and split operations
//!
//! [`Combiner`] is the library entry point, built through [`CombinerBuilder`].
//! Combine: scan the source tree, stream payloads through the read-ahead
//! pipeline into a format encoder, and atomically publish the archive.
//! Split: detect the format, decode the stream, and restore entries through
//! the sanitizing [`FileRestorer`].
//!
//! Gzip is detected by the two-byte magic regardless of file extension. If
//! gzip framing fails mid-decode the whole parse is retried uncompressed,
//! matching what older archives in the wild need.

use crate::error::{ArchiveError, Result};
use crate::formats::{codec_for, detect_format, EntrySink};
use crate::pipeline::stream_payloads;
use crate::restore::FileRestorer;
use crate::scanner::{build_globset, default_excludes, DirectoryScanner, ScannerConfig};
use crate::types::{
    ArchiveFormat, ArchiveHeader, CancellationToken, CombineReport, FileRecord, PreviewEntry,
    ProgressCallback, ProgressInfo, SplitReport,
};
use crate::utils::{format_bytes, parse_size};
use crate::writer::{AtomicArchiveWriter, DEFAULT_COMPRESSION_LEVEL};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Default ceiling on individual file size
pub const DEFAULT_MAX_FILE_SIZE: &str = "50M";

/// Builder for [`Combiner`] with validation at build time
pub struct CombinerBuilder {
    max_file_size: String,
    workers: usize,
    max_depth: usize,
    exclude_patterns: Vec<String>,
    include_patterns: Vec<String>,
    use_default_excludes: bool,
    follow_symlinks: bool,
    preserve_permissions: bool,
    calculate_checksums: bool,
    ignore_binary: bool,
    compression_level: u32,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Default for CombinerBuilder {
    fn default() -> Self {
        CombinerBuilder {
            max_file_size: DEFAULT_MAX_FILE_SIZE.to_string(),
            workers: num_cpus::get(),
            max_depth: 50,
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            use_default_excludes: true,
            follow_symlinks: false,
            preserve_permissions: false,
            calculate_checksums: false,
            ignore_binary: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl CombinerBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip files larger than this ("50M", "1G", "512K", plain bytes)
    pub fn max_file_size(mut self, size: impl Into<String>) -> Self {
        self.max_file_size = size.into();
        self
    }

    /// Metadata worker count (clamped to 32 at scan time)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Maximum traversal depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Additional exclusion patterns on top of the defaults
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// When non-empty, only matching paths are archived
    pub fn include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.include_patterns = patterns;
        self
    }

    /// Drop the built-in exclusion list (`.git/**`, `node_modules/**`, ...)
    pub fn no_default_excludes(mut self) -> Self {
        self.use_default_excludes = false;
        self
    }

    /// Traverse symlinks (cycles are still broken by the visited set)
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Restore permission bits and mtimes on split
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Record a SHA-256 checksum per file (advisory, never re-verified)
    pub fn calculate_checksums(mut self, calculate: bool) -> Self {
        self.calculate_checksums = calculate;
        self
    }

    /// Skip binary files entirely on combine
    pub fn ignore_binary(mut self, ignore: bool) -> Self {
        self.ignore_binary = ignore;
        self
    }

    /// Gzip level used when compression is enabled (1-9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Callback invoked during scans, combines and splits
    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Cancellation token checked throughout both operations
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate the configuration and build a [`Combiner`]
    pub fn build(self) -> Result<Combiner> {
        let max_file_size = parse_size(&self.max_file_size)?;
        if self.workers == 0 {
            return Err(ArchiveError::invalid_config("workers must be at least 1"));
        }
        if !(1..=9).contains(&self.compression_level) {
            return Err(ArchiveError::invalid_config(format!(
                "compression level must be 1-9, got {}",
                self.compression_level
            )));
        }

        let mut exclude = if self.use_default_excludes {
            default_excludes()
        } else {
            Vec::new()
        };
        exclude.extend(self.exclude_patterns);

        let include = if self.include_patterns.is_empty() {
            None
        } else {
            Some(build_globset(&self.include_patterns)?)
        };

        Ok(Combiner {
            scanner_config: ScannerConfig {
                max_file_size,
                max_depth: self.max_depth,
                follow_symlinks: self.follow_symlinks,
                workers: self.workers,
                calculate_checksums: self.calculate_checksums,
                ignore_binary: self.ignore_binary,
                exclude: build_globset(&exclude)?,
                include,
            },
            preserve_permissions: self.preserve_permissions,
            compression_level: self.compression_level,
            progress: self.progress,
            cancel: self.cancel,
        })
    }
}

/// Directory tree to archive codec, both directions
pub struct Combiner {
    scanner_config: ScannerConfig,
    preserve_permissions: bool,
    compression_level: u32,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Combiner {
    /// Start building a combiner
    pub fn builder() -> CombinerBuilder {
        CombinerBuilder::new()
    }

    /// Archive `source` into `dest`
    ///
    /// The format comes from `format_override`, else the destination's
    /// extension (with `.gz` stripped), else txt. A `.gz` destination
    /// implies compression even without `compress`.
    pub fn combine(
        &self,
        source: &Path,
        dest: &Path,
        compress: bool,
        format_override: Option<ArchiveFormat>,
    ) -> Result<CombineReport> {
        let started = Instant::now();

        if !source.exists() {
            return Err(ArchiveError::SourceMissing(source.to_path_buf()));
        }
        if !source.is_dir() {
            return Err(ArchiveError::NotADirectory(source.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ArchiveError::OutputNotWritable(parent.to_path_buf()));
            }
        }

        let compress =
            compress || dest.extension().and_then(|e| e.to_str()) == Some("gz");
        let format = match format_override {
            Some(f) => f,
            None => detect_format(Some(dest), ""),
        };

        let mut scanner = DirectoryScanner::new(&self.scanner_config, self.cancel.clone());
        if let Some(callback) = &self.progress {
            scanner = scanner.with_progress(callback.clone());
        }
        let outcome = scanner.scan(source)?;
        info!(
            "Found {} files to combine ({})",
            outcome.files.len(),
            format_bytes(outcome.total_size)
        );

        let header = ArchiveHeader::new(source, outcome.files.len(), outcome.total_size)
            .with_entry_paths(outcome.files.iter().map(|f| f.record.path.clone()).collect());
        let codec = codec_for(format);
        let mut writer = AtomicArchiveWriter::create(dest, compress, self.compression_level)?;

        let pipeline_errors = AtomicUsize::new(0);
        let written = AtomicUsize::new(0);
        let bytes_processed = AtomicU64::new(0);
        let total = outcome.files.len();

        stream_payloads(outcome.files, &self.cancel, &pipeline_errors, |entries| {
            let mut watched = entries.inspect(|(record, _payload)| {
                let done = written.fetch_add(1, Ordering::Relaxed) + 1;
                let bytes =
                    bytes_processed.fetch_add(record.size, Ordering::Relaxed) + record.size;
                if let Some(callback) = &self.progress {
                    callback(ProgressInfo {
                        operation: "Combining files".to_string(),
                        current_item: Some(record.path.clone()),
                        processed: done,
                        total: Some(total),
                        bytes_processed: bytes,
                    });
                }
            });
            codec.encode(&mut writer, &header, &mut watched)
        })?;

        writer.commit()?;

        let report = CombineReport {
            output_path: dest.to_path_buf(),
            format,
            compressed: compress,
            files_processed: written.load(Ordering::Relaxed),
            files_skipped: outcome.skipped,
            errors: outcome.errors + pipeline_errors.load(Ordering::Relaxed),
            bytes_processed: bytes_processed.load(Ordering::Relaxed),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Combined {} files into {} in {} ms",
            report.files_processed,
            dest.display(),
            report.duration_ms
        );
        Ok(report)
    }

    /// Restore `archive` into the directory `dest`
    pub fn split(&self, archive: &Path, dest: &Path) -> Result<SplitReport> {
        let started = Instant::now();

        if !archive.exists() {
            return Err(ArchiveError::SourceMissing(archive.to_path_buf()));
        }
        if !archive.is_file() {
            return Err(ArchiveError::NotAFile(archive.to_path_buf()));
        }

        let gzipped = has_gzip_magic(archive)?;
        let head = read_head(archive, gzipped);
        let format = detect_format(Some(archive), &head);
        info!("Detected {format} archive{}", if gzipped { " (gzip)" } else { "" });

        // Entry pre-scan is progress-only and cheap enough for the plain
        // txt case; every other shape reports an unknown total.
        let total = if !gzipped && format == ArchiveFormat::Txt {
            count_txt_entries(archive)
        } else {
            None
        };

        let restorer = match self.run_split_pass(archive, dest, format, gzipped, total) {
            Ok(restorer) => restorer,
            Err(ArchiveError::Io(err)) if gzipped => {
                warn!("Gzip framing failed ({err}), retrying as uncompressed");
                self.run_split_pass(archive, dest, format, false, total)?
            }
            Err(err) => return Err(err),
        };

        let report = SplitReport {
            output_dir: dest.to_path_buf(),
            format,
            files_restored: restorer.restored,
            errors: restorer.errors,
            security_blocked: restorer.security_blocked,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Restored {} files into {} in {} ms",
            report.files_restored,
            dest.display(),
            report.duration_ms
        );
        if !report.security_blocked.is_empty() {
            warn!("Blocked {} unsafe entries", report.security_blocked.len());
        }
        Ok(report)
    }

    /// List what a combine of `source` would include and skip
    pub fn preview(&self, source: &Path) -> Result<Vec<PreviewEntry>> {
        if !source.exists() {
            return Err(ArchiveError::SourceMissing(source.to_path_buf()));
        }
        if !source.is_dir() {
            return Err(ArchiveError::NotADirectory(source.to_path_buf()));
        }
        DirectoryScanner::new(&self.scanner_config, self.cancel.clone()).preview(source)
    }

    fn run_split_pass(
        &self,
        archive: &Path,
        dest: &Path,
        format: ArchiveFormat,
        gzipped: bool,
        total: Option<usize>,
    ) -> Result<FileRestorer> {
        let mut restorer = FileRestorer::new(dest, self.preserve_permissions)?;
        if let Some(callback) = &self.progress {
            restorer = restorer.with_progress(callback.clone(), total);
        }

        let codec = codec_for(format);
        let file = File::open(archive)?;
        {
            let mut sink = CancellableSink {
                inner: &mut restorer,
                cancel: &self.cancel,
            };
            if gzipped {
                let mut reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
                codec.decode(&mut reader, &mut sink)?;
            } else {
                let mut reader = BufReader::new(file);
                codec.decode(&mut reader, &mut sink)?;
            }
        }
        Ok(restorer)
    }
}

/// Sink wrapper that aborts the decode once cancellation is requested
struct CancellableSink<'a> {
    inner: &'a mut FileRestorer,
    cancel: &'a CancellationToken,
}

impl EntrySink for CancellableSink<'_> {
    fn entry(&mut self, record: FileRecord, payload: String) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        self.inner.entry(record, payload)
    }
}

/// Check the two-byte gzip magic, regardless of file extension
fn has_gzip_magic(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let mut read = 0;
    while read < 2 {
        match file.read(&mut magic[read..])? {
            0 => return Ok(false),
            n => read += n,
        }
    }
    Ok(magic == [0x1f, 0x8b])
}

/// First ~512 decoded characters, for format sniffing
fn read_head(path: &Path, gzipped: bool) -> String {
    let Ok(file) = File::open(path) else {
        return String::new();
    };
    let mut buf = vec![0u8; 512];
    let n = if gzipped {
        read_up_to(&mut GzDecoder::new(BufReader::new(file)), &mut buf)
    } else {
        read_up_to(&mut BufReader::new(file), &mut buf)
    };
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

fn read_up_to(reader: &mut dyn Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

/// Count separator lines for progress totals; `None` on any read problem
fn count_txt_entries(path: &Path) -> Option<usize> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let mut count = 0;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.trim_end() == crate::formats::txt::SEPARATOR {
                    count += 1;
                }
            }
            Err(_) => return None,
        }
    }
    Some(count)
}
