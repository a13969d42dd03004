//! Path sanitization for archive extraction
//!
//! Every entry restored from an archive passes through [`sanitize`] before a
//! single byte is written. The invariant it enforces: the resolved
//! destination is always a descendant of the designated output root. There is
//! no archive-level "trusted" bypass.
//!
//! Inputs that merely *look* absolute (`/etc/passwd`) are not rejected: the
//! leading slash is stripped so they land inside the root
//! (`<root>/etc/passwd`). Only inputs that still escape after stripping
//! (`../../x`) are security errors, along with NUL bytes.

use crate::error::{ArchiveError, Result};
use std::path::{Component, Path, PathBuf};

/// Validate an archive-relative path against an output root
///
/// Returns the absolute path to write to, guaranteed to be inside
/// `output_root`. The root must already exist (it is canonicalized to a
/// symlink-free form before the containment check, so a symlinked root
/// compares component-wise against its real location).
///
/// # Errors
///
/// [`ArchiveError::Security`] if the path contains a NUL byte, is empty
/// after normalization, or resolves outside the root.
pub fn sanitize(output_root: &Path, raw_rel_path: &str) -> Result<PathBuf> {
    if raw_rel_path.contains('\0') {
        return Err(ArchiveError::security(raw_rel_path, "path contains NUL byte"));
    }

    // Normalize separators and strip any leading slashes so absolute-looking
    // inputs are re-rooted under the output directory.
    let normalized = raw_rel_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');

    if trimmed.is_empty() {
        return Err(ArchiveError::security(raw_rel_path, "empty path"));
    }

    let resolved_root = output_root.canonicalize()?;

    // Resolve the candidate lexically on top of the resolved root. `..` pops
    // a component; popping past the root is the traversal we exist to catch.
    let mut resolved = resolved_root.clone();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(&resolved_root) {
                    return Err(ArchiveError::security(
                        raw_rel_path,
                        "path traversal outside output root",
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::security(
                    raw_rel_path,
                    "absolute component after normalization",
                ));
            }
        }
    }

    // Component-wise prefix check, not a string comparison, so a sibling
    // like /outputXYZ can never pass for /output.
    if !resolved.starts_with(&resolved_root) || resolved == resolved_root {
        return Err(ArchiveError::security(
            raw_rel_path,
            "path traversal outside output root",
        ));
    }

    Ok(resolved)
}
