use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to start a session. Built from the command line each
/// run, nothing is persisted.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Serial device, e.g. /dev/ttyACM0 or COM3.
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound on a single line read. The logger only notices a stop
    /// request between reads, so this also bounds shutdown latency.
    pub read_timeout: Duration,
    /// Minimum time between two commands, so that a held key doesn't flood
    /// the device.
    pub debounce: Duration,
    /// Wait between key polls, and after a failed read.
    pub poll_interval: Duration,
    pub output: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: String::new(),
            // KitProg3 debug UART default.
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(2),
            debounce: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
            output: PathBuf::from("output.txt"),
        }
    }
}
