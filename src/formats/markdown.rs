//! Markdown archive format
//!
//! A table of contents linking to one `##`-headed section per file; each
//! section carries `**Key:** value` metadata lines and a fenced code block
//! with the payload. The fence is always longer than the longest backtick
//! run inside the content, so payloads containing ``` can never break out
//! of their own block.
//!
//! The decoder treats `## ` headers outside fences as file boundaries,
//! tracks fence open/close by the exact backtick run that opened the block,
//! and only emits a section once its fence has been seen. That rule is what
//! drops the table of contents, it has a header but no fence.

use super::{read_trimmed_line, EntrySink, EntryStream, FormatCodec};
use crate::error::Result;
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use crate::utils::format_bytes;
use std::io::{BufRead, Write};

/// Codec for the Markdown format
pub struct MarkdownCodec;

impl FormatCodec for MarkdownCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Markdown
    }

    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()> {
        writeln!(sink, "# Combined Files Archive")?;
        writeln!(sink)?;
        writeln!(sink, "Generated by {} on {}", header.generator, header.created_at)?;
        writeln!(sink, "Source: `{}`", header.source_path)?;
        writeln!(sink, "Total files: {}", header.total_files)?;
        writeln!(sink, "Total size: {}", format_bytes(header.total_size))?;
        writeln!(sink)?;

        // The ToC comes from the header's path list, so each section can be
        // written as soon as its payload arrives off the stream.
        writeln!(sink, "## Table of Contents")?;
        writeln!(sink)?;
        for path in &header.entry_paths {
            writeln!(sink, "- [{path}](#{})", anchor(path))?;
        }
        writeln!(sink)?;

        for (record, payload) in entries {
            writeln!(sink, "## {}", record.path)?;
            writeln!(sink)?;
            writeln!(sink, "**Size:** {}", record.size)?;
            writeln!(sink, "**Mtime:** {}", record.mtime)?;
            writeln!(sink, "**Mode:** {}", record.mode)?;
            writeln!(sink, "**Encoding:** {}", record.encoding)?;
            if let Some(checksum) = &record.checksum {
                writeln!(sink, "**Checksum:** {checksum}")?;
            }
            if let Some(mime) = &record.mime_type {
                writeln!(sink, "**MIME type:** {mime}")?;
            }
            writeln!(sink, "**Binary:** {}", record.is_binary)?;
            writeln!(sink, "**Ends with newline:** {}", record.ends_with_newline)?;
            writeln!(sink)?;

            let fence = fence_for(&payload);
            writeln!(sink, "{fence}")?;
            sink.write_all(&payload)?;
            if !payload.ends_with(b"\n") {
                writeln!(sink)?;
            }
            writeln!(sink, "{fence}")?;
            writeln!(sink)?;
        }

        Ok(())
    }

    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()> {
        let mut pending: Option<FileRecord> = None;
        let mut fence_seen = false;
        let mut open_fence: Option<String> = None;
        let mut content_lines: Vec<String> = Vec::new();
        let mut line = String::new();

        while read_trimmed_line(input, &mut line)? {
            if let Some(fence) = &open_fence {
                if line == *fence {
                    open_fence = None;
                    fence_seen = true;
                } else {
                    content_lines.push(line.clone());
                }
                continue;
            }

            if let Some(title) = line.strip_prefix("## ") {
                flush(&mut pending, fence_seen, &mut content_lines, sink)?;
                fence_seen = false;
                let title = title.trim();
                if title == "Table of Contents" {
                    pending = None;
                } else {
                    let mut record = FileRecord::new(title, 0, 0.0, 0);
                    record.ends_with_newline = true;
                    pending = Some(record);
                }
            } else if is_fence(&line) {
                // First fence of the section holds the payload; a second
                // fence pair in the same section would be malformed input
                // and is skipped as prose.
                if pending.is_some() && !fence_seen {
                    open_fence = Some(line.clone());
                    content_lines.clear();
                }
            } else if let Some(record) = pending.as_mut() {
                apply_metadata_line(record, &line);
            }
        }

        flush(&mut pending, fence_seen, &mut content_lines, sink)
    }
}

/// Heading anchor: the path with `/` and `.` stripped
fn anchor(path: &str) -> String {
    path.chars().filter(|c| *c != '/' && *c != '.').collect()
}

/// A fence one backtick longer than the longest run inside the payload
fn fence_for(payload: &[u8]) -> String {
    let mut max_run = 0usize;
    let mut run = 0usize;
    for &b in payload {
        if b == b'`' {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 0;
        }
    }
    let len = if max_run >= 3 { max_run + 1 } else { 3 };
    "`".repeat(len)
}

fn is_fence(line: &str) -> bool {
    line.len() >= 3 && line.bytes().all(|b| b == b'`')
}

/// Parse a `**Key:** value` line into the pending record
fn apply_metadata_line(record: &mut FileRecord, line: &str) {
    let Some(rest) = line.strip_prefix("**") else { return };
    let Some(colon) = rest.find(":**") else { return };
    let key = &rest[..colon];
    let value = rest[colon + 3..].trim();

    match key {
        "Size" => record.size = value.parse().unwrap_or(0),
        "Mtime" => record.mtime = value.parse().unwrap_or(0.0),
        "Mode" => record.mode = value.parse().unwrap_or(0),
        "Encoding" => record.encoding = value.to_string(),
        "Checksum" => record.checksum = Some(value.to_string()),
        "MIME type" => record.mime_type = Some(value.to_string()),
        "Binary" => record.is_binary = value == "true",
        "Ends with newline" => record.ends_with_newline = value != "false",
        _ => {}
    }
}

/// Emit the pending section, but only if its fence was actually seen
fn flush(
    pending: &mut Option<FileRecord>,
    fence_seen: bool,
    content_lines: &mut Vec<String>,
    sink: &mut dyn EntrySink,
) -> Result<()> {
    if let Some(record) = pending.take() {
        if fence_seen {
            let payload = content_lines.join("\n");
            content_lines.clear();
            sink.entry(record, payload)?;
            return Ok(());
        }
    }
    content_lines.clear();
    Ok(())
}
