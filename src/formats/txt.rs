//! Line-oriented text format
//!
//! The oldest and most interoperable format. Comment-prefixed header lines,
//! then one block per entry:
//!
//! ```text
//! === FILE_SEPARATOR ===
//! FILE_METADATA: {"path":"src/main.rs",...}
//! ENCODING: utf-8
//! <payload>
//! <blank line>
//! ```
//!
//! The separator line, the `FILE_METADATA:` and `ENCODING:` prefixes, and the
//! blank line after each payload are load-bearing for external readers and
//! must not change. A text payload containing a line equal to the separator
//! will truncate its own entry on decode; this is a known limitation of the
//! format, binary entries are immune because base64 never collides with it.

use super::{read_trimmed_line, EntrySink, EntryStream, FormatCodec};
use crate::error::Result;
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use crate::utils::format_bytes;
use std::io::{BufRead, Write};
use tracing::warn;

pub(crate) const SEPARATOR: &str = "=== FILE_SEPARATOR ===";
const METADATA_PREFIX: &str = "FILE_METADATA:";
const ENCODING_PREFIX: &str = "ENCODING:";

/// Codec for the line-oriented text format
pub struct TxtCodec;

impl FormatCodec for TxtCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Txt
    }

    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()> {
        writeln!(sink, "# Combined Files Archive")?;
        writeln!(sink, "# Generated by {}", header.generator)?;
        writeln!(sink, "# Date: {}", header.created_at)?;
        writeln!(sink, "# Source: {}", header.source_path)?;
        writeln!(sink, "# Total files: {}", header.total_files)?;
        writeln!(sink, "# Total size: {}", format_bytes(header.total_size))?;
        writeln!(sink, "#")?;
        writeln!(sink, "# Format:")?;
        writeln!(sink, "# {SEPARATOR}")?;
        writeln!(sink, "# {METADATA_PREFIX} <json_metadata>")?;
        writeln!(sink, "# {ENCODING_PREFIX} <encoding_type>")?;
        writeln!(sink, "# <file_content>")?;
        writeln!(sink, "#")?;
        writeln!(sink)?;

        for (record, payload) in entries {
            writeln!(sink, "{SEPARATOR}")?;
            writeln!(sink, "{METADATA_PREFIX} {}", serde_json::to_string(&record)?)?;
            writeln!(sink, "{ENCODING_PREFIX} {}", record.encoding)?;
            sink.write_all(&payload)?;
            writeln!(sink)?;
        }

        Ok(())
    }

    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()> {
        let mut pending: Option<FileRecord> = None;
        let mut capturing = false;
        let mut content_lines: Vec<String> = Vec::new();
        let mut line = String::new();

        while read_trimmed_line(input, &mut line)? {
            if line == SEPARATOR {
                flush(&mut pending, &mut content_lines, sink)?;
                capturing = false;
                continue;
            }

            if capturing {
                content_lines.push(line.clone());
                continue;
            }

            if let Some(rest) = line.strip_prefix(METADATA_PREFIX) {
                match serde_json::from_str::<FileRecord>(rest.trim()) {
                    Ok(record) => pending = Some(record),
                    Err(err) => {
                        // Bad metadata drops this entry; keep scanning for
                        // the next separator.
                        warn!("Skipping entry with unparseable metadata: {err}");
                        pending = None;
                    }
                }
            } else if line.starts_with(ENCODING_PREFIX) {
                if pending.is_some() {
                    capturing = true;
                    content_lines.clear();
                }
            }
            // Header comments and stray lines before the first separator are
            // ignored.
        }

        flush(&mut pending, &mut content_lines, sink)
    }
}

/// Emit the pending entry, if any, to the sink
fn flush(
    pending: &mut Option<FileRecord>,
    content_lines: &mut Vec<String>,
    sink: &mut dyn EntrySink,
) -> Result<()> {
    if let Some(record) = pending.take() {
        let payload = content_lines.join("\n");
        content_lines.clear();
        sink.entry(record, payload)?;
    } else {
        content_lines.clear();
    }
    Ok(())
}
