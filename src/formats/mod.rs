//! Archive format codecs
//!
//! Every wire format lives behind the [`FormatCodec`] capability: encode an
//! ordered entry stream into a sink, decode a byte stream back into entries.
//! A fixed registry keys codecs by [`ArchiveFormat`]; adding a format means
//! adding one variant and one module, call sites never change.
//!
//! Decoders are dedicated state machines over the constrained subset each
//! encoder emits — not general-purpose parsers. They tolerate header noise,
//! accept entries in any order, and never require a seekable input. The txt
//! and markdown decoders stream entries out as they are recognized; the
//! JSON, XML and YAML decoders materialize the whole document first, which
//! bounds archive size to available memory for those three formats (a
//! documented asymmetry).

use crate::error::Result;
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use std::io::{BufRead, Write};
use std::path::Path;

pub mod json;
pub mod markdown;
pub mod txt;
pub mod xml;
pub mod yaml;

/// Ordered stream of `(record, payload)` pairs fed to an encoder
///
/// Payloads are the canonical bytes produced by the content codec (UTF-8
/// text or base64 ASCII). The stream yields entries in path-sorted order and
/// the encoder writes them in exactly that order.
pub type EntryStream<'a> = &'a mut dyn Iterator<Item = (FileRecord, Vec<u8>)>;

/// Receiver for decoded archive entries
///
/// Decoders call [`EntrySink::entry`] once per recognized entry, as soon as
/// it is complete. Returning an error aborts the decode.
pub trait EntrySink {
    /// Accept one decoded entry; `payload` is the raw captured content
    /// (text or base64) before trailing-newline reconstruction.
    fn entry(&mut self, record: FileRecord, payload: String) -> Result<()>;
}

/// An [`EntrySink`] that collects entries in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Decoded entries in the order they were recognized
    pub entries: Vec<(FileRecord, String)>,
}

impl EntrySink for MemorySink {
    fn entry(&mut self, record: FileRecord, payload: String) -> Result<()> {
        self.entries.push((record, payload));
        Ok(())
    }
}

/// One archive wire format: a paired encoder and decoder
pub trait FormatCodec: Send + Sync {
    /// The format this codec implements
    fn format(&self) -> ArchiveFormat;

    /// Write a header, all entries, and any footer to the sink
    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()>;

    /// Parse a forward-only stream, emitting entries to the sink
    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()>;
}

/// Look up the codec for a format in the fixed registry
pub fn codec_for(format: ArchiveFormat) -> &'static dyn FormatCodec {
    match format {
        ArchiveFormat::Txt => &txt::TxtCodec,
        ArchiveFormat::Json => &json::JsonCodec,
        ArchiveFormat::Xml => &xml::XmlCodec,
        ArchiveFormat::Yaml => &yaml::YamlCodec,
        ArchiveFormat::Markdown => &markdown::MarkdownCodec,
    }
}

/// Auto-detect an archive's format from its file name and decoded head
///
/// Extension first (with any `.gz` suffix stripped), then content
/// fingerprints over the first few hundred decoded characters; txt is
/// the fallback when nothing matches.
pub fn detect_format(path: Option<&Path>, head: &str) -> ArchiveFormat {
    if let Some(path) = path {
        let mut path = path.to_path_buf();
        if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            path.set_extension("");
        }
        if let Some(format) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ArchiveFormat::from_extension)
        {
            return format;
        }
    }

    let trimmed = head.trim_start();
    if trimmed.starts_with('{') {
        ArchiveFormat::Json
    } else if trimmed.starts_with("<?xml") || trimmed.starts_with("<file_archive") {
        ArchiveFormat::Xml
    } else if head.contains("# Combined Files Archive") && head.contains('`') {
        ArchiveFormat::Markdown
    } else if head.contains("version:") && head.contains("files:") {
        ArchiveFormat::Yaml
    } else {
        ArchiveFormat::Txt
    }
}

/// Read one line into `buf`, normalizing the terminator away
///
/// Returns `false` at end of input. Both `\n` and `\r\n` terminators are
/// stripped; decoders treat lines as terminator-less. Lines that are not
/// valid UTF-8 are lossily decoded rather than failing the whole parse, so
/// stray binary junk ahead of the first entry reads as ignorable noise.
pub(crate) fn read_trimmed_line(input: &mut dyn BufRead, buf: &mut String) -> Result<bool> {
    let mut raw = Vec::new();
    if input.read_until(b'\n', &mut raw)? == 0 {
        return Ok(false);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    buf.clear();
    buf.push_str(&String::from_utf8_lossy(&raw));
    Ok(true)
}
