use std::fmt;

use time::format_description::BorrowedFormatItem;
use time::OffsetDateTime;

/// Commands understood by the thermistor firmware. Each command is a single
/// ASCII byte, and the firmware answers with a human readable line (e.g.
/// "time set change to 1 second"), which ends up in the log like any other
/// line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Toggle temperature reporting on/off.
    PauseResume,
    /// Report every second (firmware default).
    IntervalOneSecond,
    IntervalTwoSeconds,
    /// Ends the local session. The firmware has no handler for this byte and
    /// replies "incorrect input", which is harmless.
    Exit,
}

/// Keys are checked in this order on every poll, first match wins.
pub const KEY_PRIORITY: [Command; 4] = [
    Command::PauseResume,
    Command::IntervalOneSecond,
    Command::IntervalTwoSeconds,
    Command::Exit,
];

impl Command {
    pub fn to_wire(self) -> u8 {
        match self {
            Command::PauseResume => b's',
            Command::IntervalOneSecond => b'1',
            Command::IntervalTwoSeconds => b'2',
            Command::Exit => b'e',
        }
    }

    /// Keyboard keys use the same characters as the wire protocol.
    pub fn key(self) -> char {
        self.to_wire() as char
    }

    pub fn from_key(key: char) -> Option<Command> {
        KEY_PRIORITY.into_iter().find(|command| command.key() == key)
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::PauseResume => "pause/resume temperature reporting",
            Command::IntervalOneSecond => "report every 1 second",
            Command::IntervalTwoSeconds => "report every 2 seconds",
            Command::Exit => "stop logging and exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.key(), self.description())
    }
}

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = time::macros::format_description!(
    "[day]-[month]-[year repr:last_two] [hour]:[minute]:[second]"
);

/// The session capture timestamp. It is taken once when the session starts
/// and attached to every record, it does NOT track when a line arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureTimestamp(String);

impl CaptureTimestamp {
    pub fn at(date_time: OffsetDateTime) -> CaptureTimestamp {
        // An OffsetDateTime has every component this format needs.
        CaptureTimestamp(
            date_time
                .format(TIMESTAMP_FORMAT)
                .unwrap_or_else(|_| date_time.unix_timestamp().to_string()),
        )
    }

    /// Local time if the offset can be determined, UTC otherwise. Must be
    /// called before any worker threads exist: `time` refuses to read the
    /// local offset from a multi-threaded process on some platforms.
    pub fn now() -> CaptureTimestamp {
        let date_time =
            OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        CaptureTimestamp::at(date_time)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One log line: the raw line as received (including any line terminator the
/// device sent), directly followed by the session timestamp and a newline.
pub struct LogRecord<'a> {
    pub line: &'a str,
    pub timestamp: &'a CaptureTimestamp,
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.line, self.timestamp)
    }
}

/// Decodes one raw read. Returns None for empty reads and for anything that
/// isn't valid UTF-8, both of which are skipped without producing a record.
pub fn decode_line(raw: &[u8]) -> Option<&str> {
    match std::str::from_utf8(raw) {
        Ok("") | Err(_) => None,
        Ok(line) => Some(line),
    }
}
