use std::collections::HashSet;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::error::Error;
use crate::protocol::Command;

/// Polled keyboard state, queried by the command worker.
pub trait KeySource: Send {
    /// Called once at the start of every poll, before any `is_pressed`.
    fn refresh(&mut self) {}

    fn is_pressed(&mut self, key: char) -> bool;

    /// True if the operator asked to abort outright (e.g. Ctrl-C while the
    /// terminal is in raw mode and no SIGINT gets delivered).
    fn interrupted(&mut self) -> bool {
        false
    }
}

/// Keys typed into the controlling terminal.
///
/// Terminals report key presses (and auto-repeat while a key is held), not
/// key state, so a key counts as pressed if a press arrived since the
/// previous refresh. The terminal is in raw mode for as long as this exists.
pub struct TerminalKeys {
    pressed: HashSet<char>,
    interrupted: bool,
}

impl TerminalKeys {
    pub fn new() -> crate::Result<TerminalKeys> {
        terminal::enable_raw_mode().map_err(Error::Terminal)?;
        Ok(TerminalKeys {
            pressed: HashSet::new(),
            interrupted: false,
        })
    }

    fn drain_events(&mut self) -> std::io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.interrupted = true;
                }
                KeyCode::Char(c) if Command::from_key(c).is_some() => {
                    self.pressed.insert(c);
                }
                _ => (),
            }
        }
        Ok(())
    }
}

impl KeySource for TerminalKeys {
    fn refresh(&mut self) {
        self.pressed.clear();
        if let Err(e) = self.drain_events() {
            tracing::warn!("reading terminal input failed: {e}");
        }
    }

    fn is_pressed(&mut self, key: char) -> bool {
        self.pressed.contains(&key)
    }

    fn interrupted(&mut self) -> bool {
        self.interrupted
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("restoring terminal mode failed: {e}");
        }
    }
}
