use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;

use crate::error::Error;

/// Append-only destination for log records.
pub trait Sink: Send {
    fn append(&mut self, text: &str) -> std::io::Result<()>;

    /// Flushes anything buffered. Called once when the logger stops.
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Log file on disk. Existing content is never truncated, new sessions are
/// appended after it. Records end in '\n', so the LineWriter hands each
/// record to the OS as soon as it is complete.
pub struct FileSink {
    writer: LineWriter<File>,
}

impl FileSink {
    pub fn open(path: &Path) -> crate::Result<FileSink> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| Error::OpenLog {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "logging to file");
        Ok(FileSink {
            writer: LineWriter::new(file),
        })
    }
}

impl Sink for FileSink {
    fn append(&mut self, text: &str) -> std::io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
