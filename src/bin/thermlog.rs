use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use thermlog::input::TerminalKeys;
use thermlog::protocol::KEY_PRIORITY;
use thermlog::{transport, Session, SessionConfig, SessionNotification, StopReason};

/// Logs everything a serial thermometer prints, while letting you send it
/// commands from the keyboard.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Serial device, e.g. /dev/ttyACM0 or COM3.
    #[arg(required_unless_present = "list_ports")]
    port: Option<String>,

    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Log file. Records are appended, existing content is kept.
    #[arg(short, long, default_value = "output.txt")]
    output: PathBuf,

    /// How long a single read may block waiting for a line.
    #[arg(long, default_value_t = 2000)]
    read_timeout_ms: u64,

    /// Minimum time between two commands while a key is held.
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,

    /// Don't echo received lines or print a '.' for every empty read.
    #[arg(short, long)]
    quiet: bool,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,
}

/// stderr for when the terminal is in raw mode: raw mode disables the '\n' to
/// "\r\n" translation, so do it ourselves.
struct RawStderr;

impl Write for RawStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut stderr = std::io::stderr().lock();
        for chunk in buf.split_inclusive(|b| *b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(line) => {
                    stderr.write_all(line)?;
                    stderr.write_all(b"\r\n")?;
                }
                None => stderr.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

fn print_key_bindings() {
    eprintln!("Keys:");
    for command in KEY_PRIORITY {
        eprintln!("\t{0}\t{1}", command.key(), command.description());
    }
    eprintln!("\tCtrl-C\tstop logging without notifying the device");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thermlog=info")),
        )
        .with_writer(|| RawStderr)
        .init();

    let args = Args::parse();
    eprintln!("thermlog (v{})", env!("CARGO_PKG_VERSION"));

    if args.list_ports {
        return match transport::list_ports() {
            Ok(ports) if ports.is_empty() => {
                eprintln!("No serial ports found.");
                ExitCode::SUCCESS
            }
            Ok(ports) => {
                for port in ports {
                    println!("{port}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    }
    // clap enforces this, but don't rely on it.
    let Some(port) = args.port else {
        eprintln!("\nusage: thermlog <port>");
        return ExitCode::FAILURE;
    };

    let config = SessionConfig {
        port,
        baud_rate: args.baud,
        read_timeout: Duration::from_millis(args.read_timeout_ms),
        debounce: Duration::from_millis(args.debounce_ms),
        output: args.output,
        ..SessionConfig::default()
    };

    print_key_bindings();

    // Raw mode from here on: output needs explicit "\r\n".
    let keys = match TerminalKeys::new() {
        Ok(keys) => keys,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let quiet = args.quiet;
    let observer = move |notification: &SessionNotification| match notification {
        SessionNotification::Line(line) if !quiet => {
            print!("{}\r\n", line.trim_end());
            let _ = std::io::stdout().flush();
        }
        SessionNotification::NoData if !quiet => {
            print!(".\r\n");
            let _ = std::io::stdout().flush();
        }
        SessionNotification::CommandSent(command) => {
            eprint!("sent {command}\r\n");
        }
        _ => (),
    };

    let session = match Session::open(&config, keys, Some(observer)) {
        Ok(session) => session,
        Err(e) => {
            // `keys` was dropped inside open(), so the terminal is back to normal.
            eprintln!("Failed to start session: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Installed after Session::open, which needs a single-threaded process to
    // determine the local time.
    let shutdown = session.shutdown();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown.request_stop(StopReason::External);
    }) {
        tracing::warn!("unable to install signal handler: {e}");
    }

    match session.join() {
        Ok(summary) => {
            eprintln!(
                "Logged {0} lines to {1}, sent {2} commands.",
                summary.records_written,
                config.output.display(),
                summary.commands_sent
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Session failed: {e}");
            ExitCode::FAILURE
        }
    }
}
