use std::io::{BufRead, BufReader, Read, Write};
use std::time::Duration;

use crate::error::{Error, TransportError};

/// Read half of the device connection, owned by the logger worker.
pub trait LineReader: Send {
    /// Blocks for at most the transport's read timeout. Returns the raw bytes
    /// of one line including its terminator, or an empty Vec if no complete
    /// line arrived in time.
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Write half of the device connection, owned by the command worker.
pub trait CommandWriter: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Longest line handed out by `StreamLineReader`. Anything longer (e.g. noise
/// on a port without a device) is split into chunks of this size.
pub const MAX_LINE_LEN: usize = 4096;

/// Line reader over any byte stream with a read timeout (i.e. a serial port).
///
/// A timeout can hit in the middle of a line: whatever was received so far is
/// kept and completed by a later call, so lines up to `MAX_LINE_LEN` are
/// never split into two records.
pub struct StreamLineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> StreamLineReader<R> {
    pub fn new(inner: R) -> StreamLineReader<R> {
        StreamLineReader {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }
}

impl<R: Read + Send> LineReader for StreamLineReader<R> {
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        // Invariant: pending.len() < MAX_LINE_LEN between calls.
        let limit = (MAX_LINE_LEN - self.pending.len()) as u64;
        // read_until appends everything it consumed to `pending` even when it
        // returns an error, see std::io::BufRead::read_until.
        match (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.pending)
        {
            Ok(0) if self.pending.is_empty() => Err(TransportError::Closed),
            // Newline, limit reached, or end of stream.
            Ok(_) => Ok(std::mem::take(&mut self.pending)),
            Err(error) => match error.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted => Ok(Vec::new()),
                _ => Err(error.into()),
            },
        }
    }
}

pub struct StreamWriter<W> {
    writer: W,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(writer: W) -> StreamWriter<W> {
        StreamWriter { writer }
    }
}

impl<W: Write + Send> CommandWriter for StreamWriter<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub type SerialReader = StreamLineReader<Box<dyn serialport::SerialPort>>;
pub type SerialWriter = StreamWriter<Box<dyn serialport::SerialPort>>;

/// Opens the device and splits it into independent read and write halves.
///
/// Reads and writes must not block each other: the logger sits in read_line
/// for up to `read_timeout` while the operator may be sending commands. A
/// shared Mutex would serialise the two, so (like other serial tools) we use
/// try_clone to get a second handle to the same port instead.
pub fn open_serial(
    path: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> crate::Result<(SerialReader, SerialWriter)> {
    let serial_error = |source| Error::Serial {
        port: path.to_string(),
        source,
    };
    // The firmware uses the PSoC retarget-io defaults: 8N1, no flow control.
    let port = serialport::new(path, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(read_timeout)
        .open()
        .map_err(serial_error)?;
    let reader = port.try_clone().map_err(serial_error)?;
    tracing::info!(port = path, baud_rate, "serial port opened");
    Ok((StreamLineReader::new(reader), StreamWriter::new(port)))
}

/// Describes the serial ports found on this machine, for `--list-ports`.
pub fn list_ports() -> crate::Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|source| Error::Serial {
        port: "*".to_string(),
        source,
    })?;
    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => format!(
                "{} (USB {:04x}:{:04x}{})",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.map(|p| format!(" {p}")).unwrap_or_default()
            ),
            _ => port.port_name,
        })
        .collect())
}
