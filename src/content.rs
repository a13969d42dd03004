//! Content classification and payload codec
//!
//! Turns file bytes into the canonical archive payload and back:
//!
//! - Text files are trial-decoded against an ordered list of candidate
//!   encodings and re-encoded as UTF-8; the winning encoding, together with
//!   whether the text ended in a newline, is recorded on the [`FileRecord`]
//!   in place (the true encoding is only knowable after reading).
//! - Binary files (and text that defeats every candidate) become base64 of
//!   the raw bytes. The fallback is silent but observable via
//!   `is_binary`/`encoding` on the record; it is not an error.
//!
//! Classification ahead of reading uses an extension allow-list, then a MIME
//! guess, then an 8 KiB printable-ratio sample with NUL bytes treated as
//! conclusive. Empty files are text.

use crate::error::{ArchiveError, Result};
use crate::types::FileRecord;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Ordered candidate encodings for text trial decoding
pub const TEXT_ENCODING_CANDIDATES: [&str; 5] =
    ["utf-8", "utf-8-sig", "latin1", "cp1252", "iso-8859-1"];

/// Sample size for printable-ratio sniffing
const SNIFF_SAMPLE: usize = 8192;

/// Minimum printable-byte ratio for a sample to classify as text
const PRINTABLE_THRESHOLD: f64 = 0.7;

/// Extensions that classify as text without reading the file
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "py", "js", "ts", "html", "css", "json", "xml", "yaml", "yml",
    "toml", "ini", "cfg", "conf", "sh", "bash", "c", "cpp", "h", "hpp", "java", "go",
    "rs", "rb", "pl", "php", "swift", "kt", "scala", "clj", "sql", "r", "m",
    "dockerfile", "makefile", "cmake",
];

/// Read a file and produce its canonical payload, updating the record
///
/// For binary records the payload is base64 of the raw bytes. For text
/// records the candidates in [`TEXT_ENCODING_CANDIDATES`] are tried in
/// order; the first successful decode wins and is re-encoded as UTF-8. When
/// every candidate fails the record is flipped to binary and the payload is
/// base64 — a fallback, not an error.
pub fn read_payload(path: &Path, record: &mut FileRecord) -> Result<Vec<u8>> {
    let raw = fs::read(path)?;

    if record.is_binary {
        return Ok(BASE64.encode(&raw).into_bytes());
    }

    for name in TEXT_ENCODING_CANDIDATES {
        if let Some(text) = decode_text(&raw, name) {
            record.encoding = name.to_string();
            record.ends_with_newline = text.ends_with('\n');
            return Ok(text.into_bytes());
        }
    }

    warn!("Cannot decode {:?} as text, treating as binary", path);
    record.is_binary = true;
    record.encoding = "base64".to_string();
    Ok(BASE64.encode(&raw).into_bytes())
}

/// Decode an archive payload back into file bytes
///
/// Base64 payloads tolerate interior line breaks (some tools hard-wrap long
/// lines); invalid base64 is a recoverable, per-entry error. Text payloads
/// have their trailing newline re-appended or stripped according to
/// `ends_with_newline`.
pub fn decode_payload(payload: &str, record: &FileRecord) -> Result<Vec<u8>> {
    if record.is_binary || record.encoding == "base64" {
        let cleaned: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        return BASE64
            .decode(cleaned.as_bytes())
            .map_err(|_| ArchiveError::InvalidBase64 {
                path: record.path.clone(),
            });
    }

    let mut text = payload.to_string();
    if record.ends_with_newline && !text.ends_with('\n') {
        text.push('\n');
    } else if !record.ends_with_newline && text.ends_with('\n') {
        text.truncate(text.trim_end_matches('\n').len());
    }
    Ok(text.into_bytes())
}

/// Decode bytes with one named candidate encoding
///
/// Returns `None` when the bytes are not valid in that encoding. `latin1`
/// and `iso-8859-1` accept any byte sequence; `cp1252` rejects the five
/// undefined code points of that code page.
pub fn decode_text(bytes: &[u8], encoding: &str) -> Option<String> {
    match encoding {
        "utf-8" => std::str::from_utf8(bytes).ok().map(str::to_string),
        "utf-8-sig" => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            std::str::from_utf8(body).ok().map(str::to_string)
        }
        "latin1" | "iso-8859-1" => Some(bytes.iter().map(|&b| b as char).collect()),
        "cp1252" => {
            let mut out = String::with_capacity(bytes.len());
            for &b in bytes {
                out.push(cp1252_char(b)?);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Windows-1252 mapping for the 0x80..=0x9F block; other bytes are latin1
fn cp1252_char(b: u8) -> Option<char> {
    match b {
        0x80 => Some('\u{20AC}'),
        0x82 => Some('\u{201A}'),
        0x83 => Some('\u{0192}'),
        0x84 => Some('\u{201E}'),
        0x85 => Some('\u{2026}'),
        0x86 => Some('\u{2020}'),
        0x87 => Some('\u{2021}'),
        0x88 => Some('\u{02C6}'),
        0x89 => Some('\u{2030}'),
        0x8A => Some('\u{0160}'),
        0x8B => Some('\u{2039}'),
        0x8C => Some('\u{0152}'),
        0x8E => Some('\u{017D}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201C}'),
        0x94 => Some('\u{201D}'),
        0x95 => Some('\u{2022}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x98 => Some('\u{02DC}'),
        0x99 => Some('\u{2122}'),
        0x9A => Some('\u{0161}'),
        0x9B => Some('\u{203A}'),
        0x9C => Some('\u{0153}'),
        0x9E => Some('\u{017E}'),
        0x9F => Some('\u{0178}'),
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => None,
        other => Some(other as char),
    }
}

/// Classify a file as binary or text without reading the whole content
///
/// Fast path: extension allow-list, then a MIME guess with a `text/` prefix.
/// Otherwise sample up to 8 KiB: any NUL byte is conclusive binary, and less
/// than 70% printable bytes classifies as binary. Empty files are text.
/// Unreadable files are reported binary for safety.
pub fn is_binary_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return false;
        }
    }

    if let Some(mime) = guess_mime(path) {
        if mime.starts_with("text/") {
            return false;
        }
    }

    let Ok(mut file) = File::open(path) else {
        return true;
    };
    let mut chunk = vec![0u8; SNIFF_SAMPLE];
    let Ok(read) = file.read(&mut chunk) else {
        return true;
    };
    if read == 0 {
        return false;
    }
    chunk.truncate(read);

    if chunk.contains(&0) {
        return true;
    }

    let printable = chunk
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || matches!(b, 9 | 10 | 13))
        .count();
    (printable as f64 / chunk.len() as f64) < PRINTABLE_THRESHOLD
}

/// Guess a MIME type from the extension (advisory metadata only)
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "c" => "text/x-csrc",
        "js" => "text/javascript",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}
