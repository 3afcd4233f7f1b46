//! Serial thermometer logger.
//!
//! A session runs two threads against one device: the logger appends every
//! line the device prints to a log file, and the commander turns key presses
//! into single-byte device commands. Both run until the shared [`Shutdown`]
//! signal is cleared, either from the keyboard or by the caller.

mod commander;
pub mod config;
pub mod error;
#[cfg(test)]
mod fake;
pub mod input;
mod logger;
pub mod protocol;
pub mod shutdown;
pub mod sink;
pub mod transport;

use std::sync::Arc;
use std::thread;

pub use config::SessionConfig;
pub use error::{Error, Result, TransportError};
pub use protocol::Command;
pub use shutdown::{Shutdown, StopReason};

use commander::Commander;
use input::KeySource;
use logger::Logger;
use protocol::CaptureTimestamp;
use sink::{FileSink, Sink};
use transport::{CommandWriter, LineReader};

#[derive(Clone, Debug, PartialEq)]
pub enum SessionNotification {
    /// A line was received and logged. Contains the raw line, including the
    /// device's line terminator.
    Line(String),
    /// A read returned nothing (timeout) or nothing usable.
    NoData,
    CommandSent(Command),
    CommandFailed {
        command: Command,
        error: String,
    },
    /// A read failed. The logger carries on, this is purely informational.
    TransportError(String),
    /// Both workers have finished. Always the last notification.
    Stopped(StopReason),
}

type Observer = dyn Fn(&SessionNotification) + Send + Sync;

/// Optional observer shared by both workers.
#[derive(Clone, Default)]
pub(crate) struct Notifier(Option<Arc<Observer>>);

impl Notifier {
    pub(crate) fn new(
        observer: Option<impl Fn(&SessionNotification) + Send + Sync + 'static>,
    ) -> Notifier {
        Notifier(observer.map(|observer| Arc::new(observer) as Arc<Observer>))
    }

    pub(crate) fn send(&self, notification: SessionNotification) {
        if let Some(observer) = &self.0 {
            observer(&notification);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub records_written: usize,
    pub commands_sent: usize,
    pub stop_reason: StopReason,
}

/// A running logging session. Dropping it without calling [`Session::join`]
/// detaches the workers, which keep running until something stops the
/// session.
pub struct Session {
    shutdown: Arc<Shutdown>,
    notifier: Notifier,
    logger_thread: thread::JoinHandle<Result<usize>>,
    commander_thread: thread::JoinHandle<usize>,
}

impl Session {
    /// Opens the serial port and log file described by `config` and starts
    /// both workers.
    ///
    /// The capture timestamp is taken here, before any thread is spawned, so
    /// the local UTC offset can be determined. Callers that install signal
    /// handlers (which spawn threads) should do so afterwards.
    pub fn open(
        config: &SessionConfig,
        keys: impl KeySource + 'static,
        observer: Option<impl Fn(&SessionNotification) + Send + Sync + 'static>,
    ) -> Result<Session> {
        let timestamp = CaptureTimestamp::now();
        let (reader, writer) =
            transport::open_serial(&config.port, config.baud_rate, config.read_timeout)?;
        let sink = FileSink::open(&config.output)?;
        tracing::info!(timestamp = timestamp.as_str(), "session started");
        Ok(Session::start(
            config, reader, writer, keys, sink, timestamp, observer,
        ))
    }

    /// Starts both workers on already opened collaborators.
    pub fn start(
        config: &SessionConfig,
        reader: impl LineReader + 'static,
        writer: impl CommandWriter + 'static,
        keys: impl KeySource + 'static,
        sink: impl Sink + 'static,
        timestamp: CaptureTimestamp,
        observer: Option<impl Fn(&SessionNotification) + Send + Sync + 'static>,
    ) -> Session {
        let shutdown = Arc::new(Shutdown::new());
        let notifier = Notifier::new(observer);

        let logger = Logger {
            reader,
            sink,
            timestamp,
            shutdown: shutdown.clone(),
            notifier: notifier.clone(),
            poll_interval: config.poll_interval,
        };
        let commander = Commander {
            writer,
            keys,
            shutdown: shutdown.clone(),
            notifier: notifier.clone(),
            debounce: config.debounce,
            poll_interval: config.poll_interval,
        };

        let logger_thread = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let _stop_on_panic = StopOnPanic(shutdown);
                logger.run()
            })
        };
        let commander_thread = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let _stop_on_panic = StopOnPanic(shutdown);
                commander.run()
            })
        };

        Session {
            shutdown,
            notifier,
            logger_thread,
            commander_thread,
        }
    }

    /// Handle for stopping the session from elsewhere, e.g. a signal handler.
    pub fn shutdown(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shutdown.is_active()
    }

    /// Returns false if the session had already been stopped.
    pub fn request_stop(&self) -> bool {
        self.shutdown.request_stop(StopReason::External)
    }

    /// Waits for both workers to finish. The log is flushed by then.
    pub fn join(self) -> Result<SessionSummary> {
        let logged = self
            .logger_thread
            .join()
            .map_err(|_| Error::WorkerPanicked("logger"));
        let commands_sent = self
            .commander_thread
            .join()
            .map_err(|_| Error::WorkerPanicked("command"));

        // Both workers only return once the session is stopped.
        let stop_reason = self.shutdown.reason().unwrap_or(StopReason::External);
        self.notifier.send(SessionNotification::Stopped(stop_reason));
        tracing::info!(?stop_reason, "session stopped");

        Ok(SessionSummary {
            records_written: logged??,
            commands_sent: commands_sent?,
            stop_reason,
        })
    }
}

/// Stops the session if a worker unwinds, so the other worker doesn't keep
/// running forever.
struct StopOnPanic(Arc<Shutdown>);

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.request_stop(StopReason::WorkerPanicked);
        }
    }
}
