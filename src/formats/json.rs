//! JSON archive format
//!
//! One JSON document: `{"metadata": {...}, "files": [...]}`. Each file
//! object carries the record fields plus a `content` string. The document is
//! written incrementally (commas between entries, none after the last) yet
//! always parses as a single object.

use super::{EntrySink, EntryStream, FormatCodec};
use crate::error::{ArchiveError, Result};
use crate::types::{ArchiveFormat, ArchiveHeader, FileRecord};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::warn;

/// One `files` array element: the record fields plus content, flattened
#[derive(Serialize, Deserialize)]
struct JsonEntry {
    #[serde(flatten)]
    record: FileRecord,
    content: String,
}

#[derive(Deserialize)]
struct JsonArchive {
    #[serde(default)]
    #[allow(dead_code)]
    metadata: Option<serde_json::Value>,
    files: Vec<serde_json::Value>,
}

/// Codec for the JSON format
pub struct JsonCodec;

impl FormatCodec for JsonCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Json
    }

    fn encode(
        &self,
        sink: &mut dyn Write,
        header: &ArchiveHeader,
        entries: EntryStream<'_>,
    ) -> Result<()> {
        writeln!(sink, "{{")?;
        writeln!(sink, "  \"metadata\": {},", serde_json::to_string(header)?)?;
        writeln!(sink, "  \"files\": [")?;

        let mut first = true;
        for (record, payload) in entries {
            if !first {
                writeln!(sink, ",")?;
            }
            first = false;
            let entry = JsonEntry {
                record,
                content: String::from_utf8_lossy(&payload).into_owned(),
            };
            write!(sink, "    {}", serde_json::to_string(&entry)?)?;
        }

        if !first {
            writeln!(sink)?;
        }
        writeln!(sink, "  ]")?;
        writeln!(sink, "}}")?;
        Ok(())
    }

    fn decode(&self, input: &mut dyn BufRead, sink: &mut dyn EntrySink) -> Result<()> {
        let mut document = String::new();
        input.read_to_string(&mut document)?;

        let archive: JsonArchive = serde_json::from_str(&document)
            .map_err(|e| ArchiveError::parse(format!("not a JSON archive: {e}")))?;

        for value in archive.files {
            match serde_json::from_value::<JsonEntry>(value) {
                Ok(entry) => sink.entry(entry.record, entry.content)?,
                Err(err) => {
                    warn!("Skipping malformed file object: {err}");
                }
            }
        }
        Ok(())
    }
}
