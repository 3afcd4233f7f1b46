use std::sync::Arc;
use std::time::Duration;

use crate::input::KeySource;
use crate::protocol::{Command, KEY_PRIORITY};
use crate::shutdown::{Shutdown, StopReason};
use crate::transport::CommandWriter;
use crate::{Notifier, SessionNotification};

/// Turns key presses into device commands until the session stops.
pub(crate) struct Commander<W, K> {
    pub writer: W,
    pub keys: K,
    pub shutdown: Arc<Shutdown>,
    pub notifier: Notifier,
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl<W: CommandWriter, K: KeySource> Commander<W, K> {
    /// Returns the number of commands the device accepted.
    pub fn run(mut self) -> usize {
        let mut sent = 0;
        while self.shutdown.is_active() {
            self.keys.refresh();
            if self.keys.interrupted() {
                tracing::info!("interrupted from keyboard");
                self.shutdown.request_stop(StopReason::External);
                break;
            }
            // Polling can take a while; don't act on keys once stopped.
            if !self.shutdown.is_active() {
                break;
            }

            let keys = &mut self.keys;
            let pressed = KEY_PRIORITY
                .into_iter()
                .find(|command| keys.is_pressed(command.key()));

            match pressed {
                Some(Command::Exit) => {
                    // Sent before stopping: nothing is written once the
                    // session is inactive.
                    sent += usize::from(self.send(Command::Exit));
                    if self.shutdown.request_stop(StopReason::ExitKey) {
                        tracing::info!("exit requested from keyboard");
                    }
                    break;
                }
                Some(command) => {
                    sent += usize::from(self.send(command));
                    // A held key auto-repeats; wait out the repeats even if
                    // the write failed, or a dead port floods the log.
                    self.shutdown.wait_timeout(self.debounce);
                }
                None => {
                    self.shutdown.wait_timeout(self.poll_interval);
                }
            }
        }
        tracing::debug!(sent, "command worker stopped");
        sent
    }

    fn send(&mut self, command: Command) -> bool {
        match self.writer.write(&[command.to_wire()]) {
            Ok(()) => {
                tracing::debug!(%command, "command sent");
                self.notifier.send(SessionNotification::CommandSent(command));
                true
            }
            Err(e) => {
                tracing::warn!(%command, "sending command failed: {e}");
                self.notifier.send(SessionNotification::CommandFailed {
                    command,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
