//! YAML-subset archive format
//!
//! A restricted, hand-rolled subset, not general YAML: header scalars, a
//! `files:` list of `- path: '...'` items with scalar fields, and a
//! `content: |` block literal whose lines are indented by exactly six
//! spaces. Strings are single-quoted with `''` doubling. The decoder
//! recognizes exactly this shape; anything else fails the one entry it
//! belongs to, never the whole parse.

use super::{read_trimmed_line, EntrySink, EntryStream, FormatCodec};
use crate::error::Result;
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use std::io::{BufRead, Write};
use tracing::warn;

const CONTENT_INDENT: &str = "      ";

/// Codec for the YAML-subset format
pub struct YamlCodec;

impl FormatCodec for YamlCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Yaml
    }

    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()> {
        writeln!(sink, "version: {}", quote(&header.version))?;
        writeln!(sink, "created_at: {}", quote(&header.created_at))?;
        writeln!(sink, "source_path: {}", quote(&header.source_path))?;
        writeln!(sink, "total_files: {}", header.total_files)?;
        writeln!(sink, "total_size: {}", header.total_size)?;
        writeln!(sink, "generator: {}", quote(&header.generator))?;
        writeln!(sink, "platform: {}", quote(&header.platform))?;
        writeln!(sink, "files:")?;

        for (record, payload) in entries {
            writeln!(sink, "  - path: {}", quote(&record.path))?;
            writeln!(sink, "    size: {}", record.size)?;
            writeln!(sink, "    mtime: {}", record.mtime)?;
            writeln!(sink, "    mode: {}", record.mode)?;
            writeln!(sink, "    encoding: {}", quote(&record.encoding))?;
            if let Some(checksum) = &record.checksum {
                writeln!(sink, "    checksum: {}", quote(checksum))?;
            }
            if let Some(mime) = &record.mime_type {
                writeln!(sink, "    mime_type: {}", quote(mime))?;
            }
            writeln!(sink, "    is_binary: {}", record.is_binary)?;
            writeln!(sink, "    ends_with_newline: {}", record.ends_with_newline)?;
            writeln!(sink, "    content: |")?;
            for line in String::from_utf8_lossy(&payload).lines() {
                if line.is_empty() {
                    writeln!(sink)?;
                } else {
                    writeln!(sink, "{CONTENT_INDENT}{line}")?;
                }
            }
        }

        Ok(())
    }

    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()> {
        let mut pending: Option<FileRecord> = None;
        let mut in_content = false;
        let mut content_lines: Vec<String> = Vec::new();
        let mut line = String::new();

        while read_trimmed_line(input, &mut line)? {
            if in_content {
                if let Some(stripped) = line.strip_prefix(CONTENT_INDENT) {
                    content_lines.push(stripped.to_string());
                    continue;
                }
                if line.is_empty() {
                    content_lines.push(String::new());
                    continue;
                }
                in_content = false;
            }

            let trimmed = line.trim_start();
            if let Some(first_field) = trimmed.strip_prefix("- ") {
                flush(&mut pending, &mut content_lines, sink)?;
                let mut record = FileRecord::new("", 0, 0.0, 0);
                record.ends_with_newline = true;
                in_content = apply_field(&mut record, first_field);
                pending = Some(record);
            } else if line.starts_with("    ") {
                if let Some(record) = pending.as_mut() {
                    if apply_field(record, trimmed) {
                        in_content = true;
                        content_lines.clear();
                    }
                }
            }
            // Header scalars and anything unrecognized are ignored.
        }

        flush(&mut pending, &mut content_lines, sink)
    }
}

/// Apply one `key: value` field to the record; returns true when the field
/// opens a `content: |` block
fn apply_field(record: &mut FileRecord, field: &str) -> bool {
    let Some(colon) = field.find(':') else { return false };
    let key = field[..colon].trim();
    let value = field[colon + 1..].trim();

    match key {
        "path" => record.path = unquote(value),
        "size" => record.size = value.parse().unwrap_or(0),
        "mtime" => record.mtime = value.parse().unwrap_or(0.0),
        "mode" => record.mode = value.parse().unwrap_or(0),
        "encoding" => record.encoding = unquote(value),
        "checksum" => record.checksum = Some(unquote(value)),
        "mime_type" => record.mime_type = Some(unquote(value)),
        "is_binary" => record.is_binary = value == "true",
        "ends_with_newline" => record.ends_with_newline = value != "false",
        "error" => record.error = Some(unquote(value)),
        "content" => return value == "|",
        _ => {}
    }
    false
}

fn flush(
    pending: &mut Option<FileRecord>,
    content_lines: &mut Vec<String>,
    sink: &mut dyn EntrySink,
) -> Result<()> {
    if let Some(record) = pending.take() {
        let payload = content_lines.join("\n");
        content_lines.clear();
        if record.path.is_empty() {
            warn!("Skipping list item without a path");
        } else {
            sink.entry(record, payload)?;
        }
    } else {
        content_lines.clear();
    }
    Ok(())
}

/// Single-quote a scalar, doubling embedded quotes
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].replace("''", "'")
    } else {
        s.to_string()
    }
}
