#![no_main]
use libfuzzer_sys::fuzz_target;
use thermlog::protocol::{decode_line, CaptureTimestamp, LogRecord};
use thermlog::transport::{LineReader, StreamLineReader};

fuzz_target!(|data: &[u8]| {
    let timestamp = CaptureTimestamp::at(time::OffsetDateTime::UNIX_EPOCH);
    let mut reader = StreamLineReader::new(std::io::Cursor::new(data));
    let mut total = 0;
    while let Ok(raw) = reader.read_line() {
        assert!(!raw.is_empty());
        total += raw.len();
        if let Some(line) = decode_line(&raw) {
            let record = LogRecord {
                line,
                timestamp: &timestamp,
            };
            assert!(record.to_string().ends_with("00:00:00\n"));
        }
    }
    assert_eq!(total, data.len());
});
