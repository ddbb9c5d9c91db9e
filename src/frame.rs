//! Frame assembly: turns the scanner's byte stream into discrete text frames.
//!
//! Bytes accumulate in a buffer owned by the connection worker. The buffer is
//! flushed as one frame when either
//!
//! - a line feed (0x0A) arrives, immediately and with the delimiter kept, or
//! - the stream has been quiet for longer than the read timeout while bytes
//!   are pending, for scanners configured without a terminator.
//!
//! A flush decodes the whole buffer, hands the text to the [`Sink`] and clears
//! the buffer whether or not anything was emitted.

use crate::decode::{FrameDecoder, REPLACEMENT_CHAR};
use crate::port::{PortConfiguration, PortError, SerialPortAdapter};
use crate::sink::Sink;
use encoding_rs::{Encoding, SHIFT_JIS};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Pause between loop iterations.
pub const LOOP_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on a single read request.
const MAX_READ: usize = 4096;

const DELIMITER: u8 = b'\n';

/// Settings the engine is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub baud_rate: u32,
    /// Per-read timeout; also the idle period that ends an unterminated frame.
    pub read_timeout: Duration,
    pub encoding: &'static Encoding,
    pub error_char: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            encoding: SHIFT_JIS,
            error_char: REPLACEMENT_CHAR,
        }
    }
}

impl EngineConfig {
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.encoding, self.error_char)
    }

    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            timeout: self.read_timeout,
        }
    }
}

/// Why a frame was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Delimiter,
    Idle,
}

/// What one iteration of the read loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing arrived and no frame was due.
    Waiting,
    /// Bytes were buffered without completing a frame.
    Buffered(usize),
    /// The buffer was flushed.
    Flushed(Trigger),
}

/// Buffers incoming bytes and cuts them into frames.
///
/// Owned by exactly one worker for the lifetime of a connection.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    last_activity: Instant,
    idle_timeout: Duration,
    decoder: FrameDecoder,
    scratch: Vec<u8>,
}

impl FrameAssembler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            buffer: Vec::new(),
            last_activity: Instant::now(),
            idle_timeout: config.read_timeout,
            decoder: config.decoder(),
            scratch: vec![0; MAX_READ],
        }
    }

    /// Bytes buffered since the last flush.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Append freshly read bytes. Returns the frame if they complete one.
    pub fn push(&mut self, bytes: &[u8], now: Instant) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        self.buffer.extend_from_slice(bytes);
        self.last_activity = now;

        // The buffer never holds a delimiter between calls, so only the new
        // bytes need checking.
        memchr::memchr(DELIMITER, bytes).map(|_| self.take_frame())
    }

    /// Flush pending bytes if the stream has been quiet longer than the
    /// idle timeout.
    pub fn poll_idle(&mut self, now: Instant) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_activity) > self.idle_timeout {
            Some(self.take_frame())
        } else {
            None
        }
    }

    /// Decode and clear the buffer.
    fn take_frame(&mut self) -> String {
        let text = self.decoder.decode(&self.buffer);
        self.buffer.clear();
        text
    }

    /// Run one read-and-maybe-flush iteration against `port`.
    ///
    /// Read errors are returned to the caller; sink errors are logged and
    /// swallowed.
    pub fn step(
        &mut self,
        port: &mut dyn SerialPortAdapter,
        sink: &Mutex<dyn Sink>,
    ) -> Result<StepOutcome, PortError> {
        let wanted = port
            .bytes_to_read()
            .filter(|&n| n > 0)
            .unwrap_or(1)
            .min(MAX_READ);
        let n = port.read_bytes(&mut self.scratch[..wanted])?.min(wanted);
        let now = Instant::now();

        if n > 0 {
            let scratch = std::mem::take(&mut self.scratch);
            let frame = self.push(&scratch[..n], now);
            self.scratch = scratch;
            match frame {
                Some(text) => {
                    dispatch(sink, &text);
                    Ok(StepOutcome::Flushed(Trigger::Delimiter))
                }
                None => Ok(StepOutcome::Buffered(n)),
            }
        } else {
            match self.poll_idle(now) {
                Some(text) => {
                    dispatch(sink, &text);
                    Ok(StepOutcome::Flushed(Trigger::Idle))
                }
                None => Ok(StepOutcome::Waiting),
            }
        }
    }

    /// Loop until `stop` is raised or the transport fails.
    ///
    /// Returns the read error that ended the loop, if any.
    pub fn run(
        &mut self,
        port: &mut dyn SerialPortAdapter,
        sink: &Mutex<dyn Sink>,
        stop: &AtomicBool,
    ) -> Option<PortError> {
        info!(port = %port.name(), "Serial reading loop started");
        while !stop.load(Ordering::Acquire) {
            if let Err(e) = self.step(port, sink) {
                error!(port = %port.name(), error = %e, "Error in serial reading loop");
                return Some(e);
            }
            std::thread::sleep(LOOP_INTERVAL);
        }
        info!(port = %port.name(), "Serial reading loop stopped");
        None
    }
}

/// Hand a frame to the sink. Empty frames are dropped; failures are logged.
fn dispatch(sink: &Mutex<dyn Sink>, text: &str) {
    if text.is_empty() {
        return;
    }
    debug!(text = %text.escape_debug(), "Decoded text");
    if let Err(e) = sink.lock().emit(text) {
        error!(error = %e, "Error emitting frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;
    use crate::sink::{shared, RecordingSink};
    use pretty_assertions::assert_eq;

    fn assembler(timeout_ms: u64) -> FrameAssembler {
        FrameAssembler::new(&EngineConfig {
            read_timeout: Duration::from_millis(timeout_ms),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_delimiter_flushes_with_newline_kept() {
        let mut asm = assembler(50);
        let t0 = Instant::now();
        assert_eq!(asm.push(b"HEL", t0), None);
        assert_eq!(asm.push(b"LO\n", t0), Some("HELLO\n".to_string()));
        assert!(asm.pending().is_empty());
    }

    #[test]
    fn test_delimiter_mid_chunk_flushes_everything() {
        let mut asm = assembler(50);
        let frame = asm.push(b"AB\nCD", Instant::now());
        assert_eq!(frame, Some("AB\nCD".to_string()));
        assert!(asm.pending().is_empty());
    }

    #[test]
    fn test_idle_flush_only_after_timeout() {
        let mut asm = assembler(50);
        let t0 = Instant::now();
        asm.push(b"HI", t0);

        assert_eq!(asm.poll_idle(t0 + Duration::from_millis(50)), None);
        assert_eq!(
            asm.poll_idle(t0 + Duration::from_millis(51)),
            Some("HI".to_string())
        );
        assert_eq!(asm.poll_idle(t0 + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_activity_restarts_idle_clock() {
        let mut asm = assembler(50);
        let t0 = Instant::now();
        asm.push(b"HI", t0);
        assert_eq!(asm.poll_idle(t0 + Duration::from_millis(30)), None);
        asm.push(b"THERE", t0 + Duration::from_millis(40));
        assert_eq!(asm.poll_idle(t0 + Duration::from_millis(80)), None);
        assert_eq!(
            asm.push(b"\n", t0 + Duration::from_millis(85)),
            Some("HITHERE\n".to_string())
        );
    }

    #[test]
    fn test_empty_push_is_ignored() {
        let mut asm = assembler(50);
        let t0 = Instant::now();
        asm.push(b"X", t0);
        assert_eq!(asm.push(b"", t0 + Duration::from_millis(60)), None);
        // The empty read did not count as activity.
        assert_eq!(
            asm.poll_idle(t0 + Duration::from_millis(60)),
            Some("X".to_string())
        );
    }

    #[test]
    fn test_step_emits_on_delimiter() {
        let recorder = RecordingSink::new();
        let sink = shared(recorder.clone());
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_chunk(b"HELLO");
        port.enqueue_chunk(b"\n");

        let mut asm = assembler(50);
        assert_eq!(asm.step(&mut port, &sink).unwrap(), StepOutcome::Buffered(5));
        assert_eq!(
            asm.step(&mut port, &sink).unwrap(),
            StepOutcome::Flushed(Trigger::Delimiter)
        );
        assert_eq!(recorder.frames(), vec!["HELLO\n".to_string()]);
    }

    #[test]
    fn test_step_emits_on_idle() {
        let recorder = RecordingSink::new();
        let sink = shared(recorder.clone());
        let mut port = MockSerialPort::new("MOCK0");
        port.set_timeout(Duration::from_millis(10)).unwrap();
        port.enqueue_chunk(b"HI");

        let mut asm = assembler(10);
        assert_eq!(asm.step(&mut port, &sink).unwrap(), StepOutcome::Buffered(2));
        // First empty read sleeps the full timeout, so the frame is due
        // once the next empty read returns.
        let mut outcome = StepOutcome::Waiting;
        for _ in 0..3 {
            outcome = asm.step(&mut port, &sink).unwrap();
            if outcome != StepOutcome::Waiting {
                break;
            }
        }
        assert_eq!(outcome, StepOutcome::Flushed(Trigger::Idle));
        assert_eq!(recorder.frames(), vec!["HI".to_string()]);
    }

    #[test]
    fn test_sink_failure_still_clears_buffer() {
        let recorder = RecordingSink::new();
        recorder.fail_next(1);
        let sink = shared(recorder.clone());
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_chunk(b"LOST\n");
        port.enqueue_chunk(b"KEPT\n");

        let mut asm = assembler(50);
        asm.step(&mut port, &sink).unwrap();
        assert!(asm.pending().is_empty());
        asm.step(&mut port, &sink).unwrap();
        assert_eq!(recorder.frames(), vec!["KEPT\n".to_string()]);
    }

    #[test]
    fn test_step_propagates_read_error() {
        let sink = shared(RecordingSink::new());
        let mut port = MockSerialPort::new("MOCK0");
        port.fail_next_read(std::io::ErrorKind::BrokenPipe);

        let mut asm = assembler(50);
        assert!(matches!(asm.step(&mut port, &sink), Err(PortError::Io(_))));
    }

    #[test]
    fn test_run_stops_on_flag() {
        let sink = shared(RecordingSink::new());
        let mut port = MockSerialPort::new("MOCK0");
        let stop = AtomicBool::new(true);

        let mut asm = assembler(50);
        assert!(asm.run(&mut port, &sink, &stop).is_none());
        assert_eq!(port.read_count(), 0);
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
        assert_eq!(config.encoding, SHIFT_JIS);
        assert_eq!(config.error_char, '\u{FFFD}');
        assert_eq!(config.port_configuration().timeout, config.read_timeout);
    }
}
