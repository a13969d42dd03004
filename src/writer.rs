//! Atomic archive output
//!
//! The encoded stream is written to a temp file in the destination's own
//! directory and renamed over the destination on [`AtomicArchiveWriter::commit`].
//! Same-directory placement keeps the rename on one filesystem, where it is
//! atomic on POSIX. If the writer is dropped without committing (error or
//! cancellation anywhere upstream), the temp file is removed.

use crate::error::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Default gzip compression level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// Writes an archive to a temp file, renaming into place only on success
pub struct AtomicArchiveWriter {
    sink: Sink,
    temp: TempPath,
    dest: PathBuf,
}

impl AtomicArchiveWriter {
    /// Open a writer targeting `dest`, optionally gzip-wrapping the stream
    ///
    /// `level` is the gzip level (1-9); ignored when `compress` is false.
    pub fn create(dest: &Path, compress: bool, level: u32) -> Result<Self> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let (file, temp) = NamedTempFile::new_in(parent)?.into_parts();
        let buffered = BufWriter::new(file);
        let sink = if compress {
            Sink::Gzip(GzEncoder::new(buffered, Compression::new(level)))
        } else {
            Sink::Plain(buffered)
        };
        Ok(AtomicArchiveWriter {
            sink,
            temp,
            dest: dest.to_path_buf(),
        })
    }

    /// Finish the stream and rename the temp file over the destination
    pub fn commit(self) -> Result<()> {
        let AtomicArchiveWriter { sink, temp, dest } = self;
        match sink {
            Sink::Plain(mut buffered) => buffered.flush()?,
            Sink::Gzip(encoder) => {
                let mut buffered = encoder.finish()?;
                buffered.flush()?;
            }
        }
        temp.persist(&dest).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Write for AtomicArchiveWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}
