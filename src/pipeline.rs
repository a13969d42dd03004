//! Read-ahead payload pipeline
//!
//! Encoding is a single logical stream with depth-1 look-ahead: while the
//! encoder writes entry *i*, the read of entry *i+1* is already in flight on
//! a dedicated reader thread. A rendezvous channel is exactly that contract:
//! the reader finishes the next payload and then blocks handing it over, so
//! at most two payloads are ever outstanding (one being written, one waiting
//! in the reader) and entries can never reorder because there is one reader
//! and one consumer.
//!
//! Per-file read failures are counted and dropped; the stream continues.
//! Cancellation stops the reader from issuing new reads; the consumer drains
//! whatever is buffered and the operation reports [`ArchiveError::Cancelled`].

use crate::content::read_payload;
use crate::error::{ArchiveError, Result};
use crate::types::{CancellationToken, FileRecord};
use crossbeam_channel::bounded;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::warn;

/// A scanned file waiting to have its payload read
#[derive(Debug, Clone)]
pub struct PendingFile {
    /// Absolute path to read the content from
    pub abs_path: PathBuf,
    /// Metadata collected by the scanner
    pub record: FileRecord,
}

/// Stream `(record, payload)` pairs to `consume` with depth-1 read-ahead
///
/// `consume` receives an iterator yielding entries in exactly the order of
/// `files`. Files that fail to read are skipped and counted in `errors`.
pub fn stream_payloads<F>(
    files: Vec<PendingFile>,
    cancel: &CancellationToken,
    errors: &AtomicUsize,
    consume: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Iterator<Item = (FileRecord, Vec<u8>)>) -> Result<()>,
{
    thread::scope(|scope| {
        // Capacity zero: the reader blocks on the handoff of entry i+1, so
        // it never starts reading entry i+2 while i is still being written.
        let (tx, rx) = bounded::<(FileRecord, Vec<u8>)>(0);
        let reader_cancel = cancel.clone();

        scope.spawn(move || {
            for file in files {
                if reader_cancel.is_cancelled() {
                    break;
                }
                let mut record = file.record;
                match read_payload(&file.abs_path, &mut record) {
                    Ok(payload) => {
                        // A send error means the consumer is gone; stop.
                        if tx.send((record, payload)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!("Failed to read {}: {err}", file.abs_path.display());
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        let mut entries = rx.into_iter();
        consume(&mut entries)?;

        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        Ok(())
    })
}
