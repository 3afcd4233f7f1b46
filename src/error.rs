use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single transport operation. The workers never propagate
/// these: a failed read or write turns into a no-op for that iteration.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The device reported end-of-stream, which usually means it was unplugged.
    #[error("transport closed by device")]
    Closed,
}

/// Errors that end (or prevent) a session.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to open serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("unable to open log file {}: {source}", path.display())]
    OpenLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Appending to the log failed. Logging is the point of a session, so this
    /// is fatal rather than skipped like a transport failure.
    #[error("writing to log failed: {0}")]
    Sink(#[source] std::io::Error),
    #[error("terminal input unavailable: {0}")]
    Terminal(#[source] std::io::Error),
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
