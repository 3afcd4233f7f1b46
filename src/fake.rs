//! Scripted stand-ins for the serial port, keyboard and log file, used by the
//! unit tests to drive the workers without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::input::KeySource;
use crate::shutdown::{Shutdown, StopReason};
use crate::sink::Sink;
use crate::transport::{CommandWriter, LineReader};

pub enum ReadStep {
    Data(Vec<u8>),
    Fail,
    /// Stops the session (as if from another thread) while this read is in
    /// flight, then returns the data.
    StopThen(Vec<u8>),
}

impl ReadStep {
    pub fn line(line: &str) -> ReadStep {
        ReadStep::Data(line.as_bytes().to_vec())
    }
}

/// Replays `steps`, then behaves like an idle device: every further read
/// waits `idle` and times out. If a shutdown is attached, running out of
/// steps stops the session.
pub struct ScriptedReader {
    steps: VecDeque<ReadStep>,
    idle: Duration,
    shutdown: Option<Arc<Shutdown>>,
}

impl ScriptedReader {
    pub fn new(steps: Vec<ReadStep>) -> ScriptedReader {
        ScriptedReader {
            steps: steps.into(),
            idle: Duration::from_millis(5),
            shutdown: None,
        }
    }

    pub fn lines(lines: &[&str]) -> ScriptedReader {
        ScriptedReader::new(lines.iter().map(|line| ReadStep::line(line)).collect())
    }

    pub fn stop_when_done(mut self, shutdown: &Arc<Shutdown>) -> ScriptedReader {
        self.shutdown = Some(shutdown.clone());
        self
    }

    fn stop(&self) {
        if let Some(shutdown) = &self.shutdown {
            shutdown.request_stop(StopReason::External);
        }
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.steps.pop_front() {
            Some(ReadStep::Data(data)) => Ok(data),
            Some(ReadStep::Fail) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted failure",
            ))),
            Some(ReadStep::StopThen(data)) => {
                self.stop();
                Ok(data)
            }
            None => {
                self.stop();
                std::thread::sleep(self.idle);
                Ok(Vec::new())
            }
        }
    }
}

pub type WriteLog = Arc<Mutex<Vec<(Instant, Vec<u8>)>>>;

#[derive(Default)]
pub struct RecordingWriter {
    writes: WriteLog,
    fail: bool,
}

impl RecordingWriter {
    pub fn new() -> RecordingWriter {
        RecordingWriter::default()
    }

    pub fn failing() -> RecordingWriter {
        RecordingWriter {
            fail: true,
            ..RecordingWriter::default()
        }
    }

    pub fn log(&self) -> WriteLog {
        self.writes.clone()
    }
}

impl CommandWriter for RecordingWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Closed);
        }
        self.writes
            .lock()
            .unwrap()
            .push((Instant::now(), bytes.to_vec()));
        Ok(())
    }
}

pub fn written_bytes(log: &WriteLog) -> Vec<u8> {
    log.lock()
        .unwrap()
        .iter()
        .flat_map(|(_, bytes)| bytes.clone())
        .collect()
}

/// Ctrl-C in a frame.
pub const INTERRUPT: char = '\u{3}';

/// Keyboard replaying one frame of pressed keys per poll. After the frames
/// run out, `held` (if any) stays pressed until its duration has passed since
/// the first poll; after that nothing is pressed.
#[derive(Default)]
pub struct ScriptedKeys {
    frames: VecDeque<Vec<char>>,
    held: Option<(char, Duration)>,
    first_poll: Option<Instant>,
    current: Vec<char>,
    polls: Arc<Mutex<Vec<Instant>>>,
    stop_on_poll: Option<Arc<Shutdown>>,
}

impl ScriptedKeys {
    pub fn frames(frames: Vec<Vec<char>>) -> ScriptedKeys {
        ScriptedKeys {
            frames: frames.into(),
            ..ScriptedKeys::default()
        }
    }

    pub fn hold(key: char, duration: Duration) -> ScriptedKeys {
        ScriptedKeys {
            held: Some((key, duration)),
            ..ScriptedKeys::default()
        }
    }

    pub fn idle() -> ScriptedKeys {
        ScriptedKeys::default()
    }

    /// Stops the session from inside the first poll, as if another thread
    /// stopped it while the keyboard was being read.
    pub fn stop_on_poll(mut self, shutdown: &Arc<Shutdown>) -> ScriptedKeys {
        self.stop_on_poll = Some(shutdown.clone());
        self
    }

    pub fn polls(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.polls.clone()
    }
}

impl KeySource for ScriptedKeys {
    fn refresh(&mut self) {
        let now = Instant::now();
        self.polls.lock().unwrap().push(now);
        if let Some(shutdown) = self.stop_on_poll.take() {
            shutdown.request_stop(StopReason::External);
        }
        let first_poll = *self.first_poll.get_or_insert(now);
        self.current = match self.frames.pop_front() {
            Some(frame) => frame,
            None => match self.held {
                Some((key, duration)) if now.duration_since(first_poll) < duration => vec![key],
                _ => Vec::new(),
            },
        };
    }

    fn is_pressed(&mut self, key: char) -> bool {
        self.current.contains(&key)
    }

    fn interrupted(&mut self) -> bool {
        self.current.contains(&INTERRUPT)
    }
}

#[derive(Default)]
pub struct MemorySink {
    contents: Arc<Mutex<String>>,
    closed: Arc<AtomicBool>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn failing() -> MemorySink {
        MemorySink {
            fail: true,
            ..MemorySink::default()
        }
    }

    pub fn contents(&self) -> Arc<Mutex<String>> {
        self.contents.clone()
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl Sink for MemorySink {
    fn append(&mut self, text: &str) -> std::io::Result<()> {
        if self.fail {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ));
        }
        self.contents.lock().unwrap().push_str(text);
        Ok(())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
