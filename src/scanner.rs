//! Directory traversal and parallel metadata collection
//!
//! Scanning is two phases. First a depth-first walk gathers candidate file
//! paths: entries are visited in sorted order, a visited set of canonical
//! directory paths breaks symlink cycles, and anything past the depth limit
//! is skipped with a warning. Then a bounded rayon pool stats and classifies
//! the candidates in parallel; workers share nothing but atomic counters.
//! Pool results arrive unordered, so the final list is sorted by path before
//! handoff. Deterministic archive output depends on that sort.

use crate::content::is_binary_file;
use crate::error::{ArchiveError, Result};
use crate::pipeline::PendingFile;
use crate::types::{CancellationToken, FileRecord, ProgressCallback, ProgressInfo};
use crate::utils::{get_permissions, hash_file_content, mtime_seconds, to_slash};
use globset::GlobSet;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Hard ceiling on metadata worker threads
pub const MAX_WORKERS: usize = 32;

/// Scanner tuning and filtering options
pub struct ScannerConfig {
    /// Files larger than this are skipped
    pub max_file_size: u64,
    /// Directories deeper than this are skipped with a warning
    pub max_depth: usize,
    /// Whether to traverse symlinks
    pub follow_symlinks: bool,
    /// Metadata worker count, clamped to [`MAX_WORKERS`]
    pub workers: usize,
    /// Whether to compute a SHA-256 checksum per file
    pub calculate_checksums: bool,
    /// Whether to drop binary files entirely
    pub ignore_binary: bool,
    /// Exclusion patterns, matched against slash-relative paths
    pub exclude: GlobSet,
    /// When non-empty, only matching paths are kept
    pub include: Option<GlobSet>,
}

/// Everything a scan produces
pub struct ScanOutcome {
    /// Files to archive, sorted by relative path
    pub files: Vec<PendingFile>,
    /// Files dropped by the exclusion predicate or size ceiling
    pub skipped: usize,
    /// Files dropped by I/O errors
    pub errors: usize,
    /// Sum of kept files' sizes
    pub total_size: u64,
}

/// Walks a source tree and collects [`PendingFile`]s
pub struct DirectoryScanner<'a> {
    config: &'a ScannerConfig,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl<'a> DirectoryScanner<'a> {
    /// Create a scanner over a borrowed configuration
    pub fn new(config: &'a ScannerConfig, cancel: CancellationToken) -> Self {
        DirectoryScanner {
            config,
            cancel,
            progress: None,
        }
    }

    /// Attach a progress callback for the metadata phase
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Why a file would be excluded, or `None` if it is kept
    ///
    /// Shared with dry-run previews so they report the same decisions the
    /// real scan makes.
    pub fn exclusion_reason(&self, metadata: &fs::Metadata, rel_path: &str) -> Option<String> {
        if metadata.len() > self.config.max_file_size {
            return Some(format!(
                "too large ({})",
                crate::utils::format_bytes(metadata.len())
            ));
        }
        if matches_path(&self.config.exclude, rel_path) {
            return Some("matches exclude pattern".to_string());
        }
        if let Some(include) = &self.config.include {
            if !matches_path(include, rel_path) {
                return Some("doesn't match include pattern".to_string());
            }
        }
        if !metadata.is_file() {
            return Some("not a regular file".to_string());
        }
        None
    }

    /// Scan `root`, returning sorted files plus counters
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        let candidates = self.collect_candidates(root)?;

        let skipped = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);
        let total_size = AtomicU64::new(0);
        let processed = AtomicUsize::new(0);
        let candidate_count = candidates.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.clamp(1, MAX_WORKERS))
            .build()
            .map_err(|e| ArchiveError::internal(format!("worker pool: {e}")))?;

        let mut files: Vec<PendingFile> = pool.install(|| {
            candidates
                .par_iter()
                .filter_map(|(abs_path, rel_path)| {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    let result = self.process_candidate(abs_path, rel_path, &skipped, &errors);
                    if let Some(file) = &result {
                        total_size.fetch_add(file.record.size, Ordering::Relaxed);
                    }
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(callback) = &self.progress {
                        callback(ProgressInfo {
                            operation: "Scanning files".to_string(),
                            current_item: Some(rel_path.clone()),
                            processed: done,
                            total: Some(candidate_count),
                            bytes_processed: total_size.load(Ordering::Relaxed),
                        });
                    }
                    result
                })
                .collect()
        });

        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        // Workers finish out of order; the archive contract is path-sorted.
        files.sort_by(|a, b| a.record.path.cmp(&b.record.path));

        Ok(ScanOutcome {
            files,
            skipped: skipped.load(Ordering::Relaxed),
            errors: errors.load(Ordering::Relaxed),
            total_size: total_size.load(Ordering::Relaxed),
        })
    }

    /// Dry-run listing: what a scan would keep and skip, without reading content
    pub fn preview(&self, root: &Path) -> Result<Vec<crate::types::PreviewEntry>> {
        let candidates = self.collect_candidates(root)?;
        let mut entries = Vec::with_capacity(candidates.len());

        for (abs_path, rel_path) in candidates {
            if self.cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }
            let entry = match fs::metadata(&abs_path) {
                Ok(metadata) => {
                    let mut skip_reason = self.exclusion_reason(&metadata, &rel_path);
                    let is_binary = skip_reason.is_none() && is_binary_file(&abs_path);
                    if skip_reason.is_none() && is_binary && self.config.ignore_binary {
                        skip_reason = Some("binary".to_string());
                    }
                    crate::types::PreviewEntry {
                        path: rel_path,
                        size: metadata.len(),
                        is_binary,
                        skip_reason,
                    }
                }
                Err(err) => crate::types::PreviewEntry {
                    path: rel_path,
                    size: 0,
                    is_binary: false,
                    skip_reason: Some(format!("cannot access: {err}")),
                },
            };
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn process_candidate(
        &self,
        abs_path: &Path,
        rel_path: &str,
        skipped: &AtomicUsize,
        errors: &AtomicUsize,
    ) -> Option<PendingFile> {
        let metadata = match fs::metadata(abs_path) {
            Ok(m) => m,
            Err(err) => {
                warn!("Cannot stat {}: {err}", abs_path.display());
                errors.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if let Some(reason) = self.exclusion_reason(&metadata, rel_path) {
            debug!("Skipping {rel_path}: {reason}");
            skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let binary = is_binary_file(abs_path);
        if binary && self.config.ignore_binary {
            debug!("Skipping {rel_path}: binary");
            skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut record = FileRecord::new(
            rel_path,
            metadata.len(),
            mtime_seconds(&metadata),
            get_permissions(&metadata),
        );
        record.is_binary = binary;
        record.mime_type = crate::content::guess_mime(abs_path).map(str::to_string);

        if self.config.calculate_checksums {
            match hash_file_content(abs_path) {
                Ok(digest) => record.checksum = Some(digest),
                Err(err) => {
                    warn!("Cannot checksum {}: {err}", abs_path.display());
                    errors.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        Some(PendingFile {
            abs_path: abs_path.to_path_buf(),
            record,
        })
    }

    /// Depth-first walk producing `(absolute, slash-relative)` file paths
    fn collect_candidates(&self, root: &Path) -> Result<Vec<(PathBuf, String)>> {
        let mut candidates = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        while let Some((dir, depth)) = stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }
            if depth > self.config.max_depth {
                warn!("Maximum depth ({}) reached at {}", self.config.max_depth, dir.display());
                continue;
            }

            // Canonical identity breaks symlink cycles.
            let real = match dir.canonicalize() {
                Ok(p) => p,
                Err(err) => {
                    warn!("Cannot resolve {}: {err}", dir.display());
                    continue;
                }
            };
            if !visited.insert(real) {
                continue;
            }

            let entries = match fs::read_dir(&dir) {
                Ok(iter) => iter,
                Err(err) => {
                    warn!("Cannot read {}: {err}", dir.display());
                    continue;
                }
            };
            let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
            entries.sort_by_key(|e| e.file_name());

            for entry in entries {
                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                if file_type.is_symlink() && !self.config.follow_symlinks {
                    continue;
                }

                let is_dir = if file_type.is_symlink() {
                    fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false)
                } else {
                    file_type.is_dir()
                };

                if is_dir {
                    stack.push((path, depth + 1));
                } else {
                    let rel = path.strip_prefix(root).unwrap_or(&path);
                    candidates.push((path.clone(), to_slash(rel)));
                }
            }
        }

        Ok(candidates)
    }
}

/// Match a slash-relative path, or its bare file name, against a glob set
pub fn matches_path(globs: &GlobSet, rel_path: &str) -> bool {
    if globs.is_match(rel_path) {
        return true;
    }
    match rel_path.rsplit('/').next() {
        Some(name) if name != rel_path => globs.is_match(name),
        _ => false,
    }
}

/// Exclusion patterns applied to every combine unless disabled
pub fn default_excludes() -> Vec<String> {
    [
        // Version control
        ".git/**",
        ".svn/**",
        ".hg/**",
        ".bzr/**",
        // Dependencies
        "node_modules/**",
        "__pycache__/**",
        ".pytest_cache/**",
        "vendor/**",
        ".tox/**",
        ".venv/**",
        "venv/**",
        // Build artifacts
        "dist/**",
        "build/**",
        "target/**",
        "out/**",
        "*.egg-info/**",
        ".eggs/**",
        // Compiled files
        "*.pyc",
        "*.pyo",
        "*.pyd",
        "*.class",
        "*.jar",
        "*.war",
        "*.o",
        "*.obj",
        "*.dll",
        "*.so",
        "*.dylib",
        // IDE files
        ".vscode/**",
        ".idea/**",
        "*.swp",
        "*.swo",
        "*~",
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        // Logs and temporary files
        "*.log",
        "*.tmp",
        "*.temp",
        "*.cache",
        "*.pid",
        // Minified files
        "*.min.js",
        "*.min.css",
        "*.bundle.js",
        // Coverage and test artifacts
        ".coverage",
        ".nyc_output/**",
        "coverage/**",
        // Environment files
        ".env",
        ".env.*",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Build a glob set from patterns, rejecting invalid ones
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(pattern).map_err(|e| {
            ArchiveError::invalid_config(format!("Invalid pattern {pattern:?}: {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ArchiveError::invalid_config(format!("Invalid patterns: {e}")))
}
