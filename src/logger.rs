use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::protocol::{decode_line, CaptureTimestamp, LogRecord};
use crate::shutdown::{Shutdown, StopReason};
use crate::sink::Sink;
use crate::transport::LineReader;
use crate::{Notifier, SessionNotification};

/// Reads lines from the device and appends them to the log until the session
/// stops.
pub(crate) struct Logger<R, S> {
    pub reader: R,
    pub sink: S,
    pub timestamp: CaptureTimestamp,
    pub shutdown: Arc<Shutdown>,
    pub notifier: Notifier,
    pub poll_interval: Duration,
}

impl<R: LineReader, S: Sink> Logger<R, S> {
    /// Returns the number of records written. Transport problems are skipped
    /// over, only a failing sink ends the loop early (and stops the session).
    pub fn run(mut self) -> crate::Result<usize> {
        let mut records = 0;
        // Only the first of a run of read failures is worth a warning: an
        // unplugged device fails every single read.
        let mut failing = false;

        let result = loop {
            if !self.shutdown.is_active() {
                break Ok(records);
            }

            let raw = match self.reader.read_line() {
                Ok(raw) => {
                    failing = false;
                    raw
                }
                Err(e) => {
                    if failing {
                        tracing::debug!("reading from device failed again: {e}");
                    } else {
                        tracing::warn!("reading from device failed: {e}");
                    }
                    failing = true;
                    self.notifier
                        .send(SessionNotification::TransportError(e.to_string()));
                    self.shutdown.wait_timeout(self.poll_interval);
                    continue;
                }
            };

            let Some(line) = decode_line(&raw) else {
                if !raw.is_empty() {
                    tracing::debug!(bytes = raw.len(), "discarding line that isn't UTF-8");
                }
                self.notifier.send(SessionNotification::NoData);
                self.shutdown.wait_timeout(self.poll_interval);
                continue;
            };

            // The read may have been blocked while the session was stopped.
            if !self.shutdown.is_active() {
                tracing::debug!("session stopped during read, dropping line");
                break Ok(records);
            }

            let record = LogRecord {
                line,
                timestamp: &self.timestamp,
            };
            if let Err(e) = self.sink.append(&record.to_string()) {
                tracing::error!("writing to log failed, stopping: {e}");
                self.shutdown.request_stop(StopReason::SinkFailed);
                break Err(Error::Sink(e));
            }
            records += 1;
            self.notifier
                .send(SessionNotification::Line(line.to_string()));
            std::thread::yield_now();
        };

        tracing::debug!(records, "logger stopped");
        match (result, self.sink.close()) {
            (Ok(_), Err(e)) => Err(Error::Sink(e)),
            (result, _) => result,
        }
    }
}
