//! Utility functions for textarc
//!
//! Shared helpers: human-readable size parsing/formatting, SHA-256 hashing,
//! slash-normalized relative paths, and cross-platform permission and
//! timestamp restoration.

use crate::error::{ArchiveError, Result};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Parse a human-readable size string ("50M", "1.5G", "512K", "1024") to bytes
///
/// An optional trailing `B` is accepted (`10MB` == `10M`). Units are binary
/// (K = 1024). Invalid input is a configuration error.
pub fn parse_size(size_str: &str) -> Result<u64> {
    let cleaned = size_str.trim().to_ascii_uppercase();
    let cleaned = cleaned.strip_suffix('B').unwrap_or(&cleaned);

    if cleaned.is_empty() {
        return Err(ArchiveError::invalid_config(format!(
            "Invalid size format: {size_str}"
        )));
    }

    let (number_part, multiplier) = match cleaned.chars().last() {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1024u64),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1024u64.pow(2)),
        Some('G') => (&cleaned[..cleaned.len() - 1], 1024u64.pow(3)),
        Some('T') => (&cleaned[..cleaned.len() - 1], 1024u64.pow(4)),
        _ => (cleaned, 1u64),
    };

    let number: f64 = number_part.parse().map_err(|_| {
        ArchiveError::invalid_config(format!("Invalid size format: {size_str}"))
    })?;

    if !number.is_finite() || number < 0.0 {
        return Err(ArchiveError::invalid_config(format!(
            "Size cannot be negative: {size_str}"
        )));
    }

    Ok((number * multiplier as f64) as u64)
}

/// Format bytes in human-readable form (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Hash a file's content with SHA-256, returning a 64-char hex digest
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary data with SHA-256, returning a 64-char hex digest
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Render a relative path with `/` separators regardless of platform
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Modification time of a file as fractional seconds since the epoch
pub fn mtime_seconds(metadata: &fs::Metadata) -> f64 {
    match metadata.modified() {
        Ok(time) => match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs_f64(),
            Err(_) => 0.0, // pre-epoch timestamps clamp to zero
        },
        Err(_) => 0.0,
    }
}

/// Unix permission bits from metadata
#[cfg(unix)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

/// Permission bits from metadata (Windows approximation)
#[cfg(windows)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o100444
    } else {
        0o100644
    }
}

/// Set Unix permissions on a restored file
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

/// Set permissions on a restored file (Windows: read-only bit only)
#[cfg(windows)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    let metadata = fs::metadata(path)?;
    let mut perms = metadata.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Set a file's modification time from fractional epoch seconds
pub fn set_mtime(path: &Path, mtime: f64) -> Result<()> {
    let secs = mtime.trunc() as i64;
    let nanos = (mtime.fract() * 1_000_000_000.0) as u32;
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, nanos))?;
    Ok(())
}
