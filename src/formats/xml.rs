//! XML archive format
//!
//! A single `<file_archive>` root element with header attributes; one
//! `<file ...>payload</file>` element per entry. Attribute values and text
//! content are entity-escaped, which is what makes the decoder's scan for a
//! literal `</file>` safe: an escaped payload can never contain one.
//!
//! The decoder is a state machine over exactly the subset this encoder
//! emits, not an XML parser. It materializes the whole document, iterates
//! `<file>` elements, and coerces attributes back to record fields
//! (`is_binary`/`ends_with_newline` from `"true"`/`"false"`, `mode` from a
//! decimal string, `mtime` from a float string). A malformed element fails
//! that one entry, not the parse.

use super::{EntrySink, EntryStream, FormatCodec};
use crate::error::{ArchiveError, Result};
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use std::io::{BufRead, Write};
use tracing::warn;

/// Codec for the XML format
pub struct XmlCodec;

impl FormatCodec for XmlCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Xml
    }

    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()> {
        writeln!(sink, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(
            sink,
            "<file_archive version=\"{}\" created_at=\"{}\" source_path=\"{}\" \
             total_files=\"{}\" total_size=\"{}\" generator=\"{}\" platform=\"{}\">",
            escape_attr(&header.version),
            escape_attr(&header.created_at),
            escape_attr(&header.source_path),
            header.total_files,
            header.total_size,
            escape_attr(&header.generator),
            escape_attr(&header.platform),
        )?;

        for (record, payload) in entries {
            write!(
                sink,
                "  <file path=\"{}\" size=\"{}\" mtime=\"{}\" mode=\"{}\" encoding=\"{}\"",
                escape_attr(&record.path),
                record.size,
                record.mtime,
                record.mode,
                escape_attr(&record.encoding),
            )?;
            if let Some(checksum) = &record.checksum {
                write!(sink, " checksum=\"{}\"", escape_attr(checksum))?;
            }
            if let Some(mime) = &record.mime_type {
                write!(sink, " mime_type=\"{}\"", escape_attr(mime))?;
            }
            write!(
                sink,
                " is_binary=\"{}\" ends_with_newline=\"{}\">",
                record.is_binary, record.ends_with_newline,
            )?;
            sink.write_all(escape_text(&String::from_utf8_lossy(&payload)).as_bytes())?;
            writeln!(sink, "</file>")?;
        }

        writeln!(sink, "</file_archive>")?;
        Ok(())
    }

    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()> {
        let mut document = String::new();
        input.read_to_string(&mut document)?;

        let mut rest = document.as_str();
        while let Some(start) = rest.find("<file ") {
            rest = &rest[start + "<file ".len()..];
            let Some(tag_end) = rest.find('>') else { break };
            let mut attr_str = rest[..tag_end].trim();
            rest = &rest[tag_end + 1..];

            // Self-closing element means empty content.
            let self_closing = attr_str.ends_with('/');
            if self_closing {
                attr_str = attr_str[..attr_str.len() - 1].trim_end();
            }

            let payload = if self_closing {
                String::new()
            } else {
                let Some(close) = rest.find("</file>") else { break };
                let raw = &rest[..close];
                rest = &rest[close + "</file>".len()..];
                unescape(raw)
            };

            match record_from_attrs(attr_str) {
                Ok(record) => sink.entry(record, payload)?,
                Err(err) => warn!("Skipping malformed file element: {err}"),
            }
        }
        Ok(())
    }
}

/// Coerce a `<file>` element's attribute string into a record
fn record_from_attrs(attr_str: &str) -> Result<FileRecord> {
    let mut record = FileRecord::new("", 0, 0.0, 0);
    record.ends_with_newline = true;

    for (name, value) in parse_attrs(attr_str) {
        match name {
            "path" => record.path = value,
            "size" => record.size = value.parse().unwrap_or(0),
            "mtime" => record.mtime = value.parse().unwrap_or(0.0),
            "mode" => record.mode = value.parse().unwrap_or(0),
            "encoding" => record.encoding = value,
            "checksum" => record.checksum = Some(value),
            "mime_type" => record.mime_type = Some(value),
            "is_binary" => record.is_binary = value == "true",
            "ends_with_newline" => record.ends_with_newline = value != "false",
            "error" => record.error = Some(value),
            _ => {}
        }
    }

    if record.path.is_empty() {
        return Err(ArchiveError::parse("file element missing path attribute"));
    }
    Ok(record)
}

/// Split `name="value"` pairs; values are unescaped
fn parse_attrs(s: &str) -> Vec<(&str, String)> {
    let mut out = Vec::new();
    let mut rest = s.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let name = rest[..eq].trim();
        rest = rest[eq + 1..].trim_start();
        if !rest.starts_with('"') {
            break;
        }
        rest = &rest[1..];
        let Some(end) = rest.find('"') else { break };
        out.push((name, unescape(&rest[..end])));
        rest = rest[end + 1..].trim_start();
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let entity_end = rest.find(';').filter(|&i| i <= 6);
        match entity_end {
            Some(end) => {
                match &rest[..=end] {
                    "&amp;" => out.push('&'),
                    "&lt;" => out.push('<'),
                    "&gt;" => out.push('>'),
                    "&quot;" => out.push('"'),
                    "&apos;" => out.push('\''),
                    other => out.push_str(other), // unknown entity kept verbatim
                }
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
