//! File reconstruction from decoded archive entries
//!
//! [`FileRestorer`] is the [`EntrySink`] the decoders feed. Every entry goes
//! through the path sanitizer before any byte is written; a rejected path is
//! recorded and skipped, it never aborts the operation. Per-file decode or
//! write failures are likewise counted and skipped. Only failures touching
//! the output root itself are fatal.

use crate::content::decode_payload;
use crate::error::Result;
use crate::formats::EntrySink;
use crate::sanitize::sanitize;
use crate::types::{FileRecord, ProgressCallback, ProgressInfo};
use crate::utils::{set_mtime, set_permissions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes decoded entries into an output directory
pub struct FileRestorer {
    output_root: PathBuf,
    preserve_permissions: bool,
    progress: Option<ProgressCallback>,
    total: Option<usize>,
    /// Entries successfully written
    pub restored: usize,
    /// Entries dropped by per-file errors
    pub errors: usize,
    /// Paths rejected by the sanitizer, with reasons
    pub security_blocked: Vec<String>,
    /// Bytes written so far
    pub bytes_written: u64,
}

impl FileRestorer {
    /// Create a restorer rooted at `output_root`, creating it if needed
    pub fn new(output_root: &Path, preserve_permissions: bool) -> Result<Self> {
        fs::create_dir_all(output_root)?;
        Ok(FileRestorer {
            output_root: output_root.to_path_buf(),
            preserve_permissions,
            progress: None,
            total: None,
            restored: 0,
            errors: 0,
            security_blocked: Vec::new(),
            bytes_written: 0,
        })
    }

    /// Attach a progress callback; `total` may be unknown for piped input
    pub fn with_progress(mut self, callback: ProgressCallback, total: Option<usize>) -> Self {
        self.progress = Some(callback);
        self.total = total;
        self
    }

    fn restore_one(&mut self, record: &FileRecord, payload: &str) -> Result<()> {
        let dest = sanitize(&self.output_root, &record.path)?;
        let bytes = decode_payload(payload, record)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &bytes)?;

        if self.preserve_permissions {
            // Metadata restoration is best-effort, a read-only target or
            // odd filesystem must not fail the entry.
            if record.mode != 0 {
                if let Err(err) = set_permissions(&dest, record.mode) {
                    warn!("Cannot restore permissions for {}: {err}", record.path);
                }
            }
            if record.mtime > 0.0 {
                if let Err(err) = set_mtime(&dest, record.mtime) {
                    warn!("Cannot restore mtime for {}: {err}", record.path);
                }
            }
        }

        self.bytes_written += bytes.len() as u64;
        debug!("Restored: {}", record.path);
        Ok(())
    }
}

impl EntrySink for FileRestorer {
    fn entry(&mut self, record: FileRecord, payload: String) -> Result<()> {
        match self.restore_one(&record, &payload) {
            Ok(()) => self.restored += 1,
            Err(err) if err.is_security() => {
                warn!("Blocked unsafe path {:?}: {err}", record.path);
                self.security_blocked.push(format!("{}: {err}", record.path));
            }
            Err(err) => {
                warn!("Failed to restore {}: {err}", record.path);
                self.errors += 1;
            }
        }

        if let Some(callback) = &self.progress {
            callback(ProgressInfo {
                operation: "Extracting files".to_string(),
                current_item: Some(record.path.clone()),
                processed: self.restored + self.errors + self.security_blocked.len(),
                total: self.total,
                bytes_processed: self.bytes_written,
            });
        }
        Ok(())
    }
}
