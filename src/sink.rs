//! Output side of the bridge.
//!
//! A [`Sink`] receives every decoded frame. The bridge only needs it to
//! return once the text has been delivered; what delivery means (keystroke
//! emulation, a file, a test recorder) is up to the implementation.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

/// A sink shared between the connection manager and its worker.
pub type SharedSink = Arc<Mutex<dyn Sink>>;

/// Wrap a sink for use by a [`ConnectionManager`](crate::ConnectionManager).
pub fn shared(sink: impl Sink + 'static) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Single keys a sink may be asked to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    Enter,
    Tab,
    Escape,
    Backspace,
}

impl ControlKey {
    /// The character this key produces in a plain text stream, if any.
    pub fn as_char(self) -> Option<char> {
        match self {
            Self::Enter => Some('\n'),
            Self::Tab => Some('\t'),
            Self::Backspace => Some('\u{8}'),
            Self::Escape => None,
        }
    }
}

/// Errors reported by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error while emitting: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink does not support control key {0:?}")]
    UnsupportedKey(ControlKey),

    #[error("Emission failed: {0}")]
    Failed(String),
}

/// Receives decoded frames.
pub trait Sink: Send {
    /// Deliver one frame of text.
    fn emit(&mut self, text: &str) -> Result<(), SinkError>;

    /// Press a single control key.
    fn emit_control(&mut self, key: ControlKey) -> Result<(), SinkError> {
        Err(SinkError::UnsupportedKey(key))
    }
}

/// Writes frames verbatim to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&mut self, text: &str) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn emit_control(&mut self, key: ControlKey) -> Result<(), SinkError> {
        match key.as_char() {
            Some(c) => self.emit(c.encode_utf8(&mut [0u8; 4])),
            None => Err(SinkError::UnsupportedKey(key)),
        }
    }
}

/// Adapts a keystroke-style sink that cannot type a raw newline.
///
/// Each line of a frame is emitted as text, with an `Enter` press between
/// lines, so `"A\nB\n"` becomes `emit("A")`, `Enter`, `emit("B")`, `Enter`.
/// A `"\r\n"` terminator is split on the `'\n'` only.
#[derive(Debug, Default)]
pub struct LineSink<S> {
    inner: S,
}

impl<S: Sink> LineSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Sink> Sink for LineSink<S> {
    fn emit(&mut self, text: &str) -> Result<(), SinkError> {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                self.inner.emit(line)?;
            }
            if lines.peek().is_some() {
                self.inner.emit_control(ControlKey::Enter)?;
            }
        }
        Ok(())
    }

    fn emit_control(&mut self, key: ControlKey) -> Result<(), SinkError> {
        self.inner.emit_control(key)
    }
}

/// Something a [`RecordingSink`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Text(String),
    Key(ControlKey),
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<Emitted>,
    fail_remaining: usize,
}

/// Records everything it is given. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` emissions fail without being recorded.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().fail_remaining = count;
    }

    /// Every text frame emitted so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Emitted::Text(t) => Some(t.clone()),
                Emitted::Key(_) => None,
            })
            .collect()
    }

    /// Every emission, text and keys, in order.
    pub fn events(&self) -> Vec<Emitted> {
        self.inner.lock().events.clone()
    }

    fn record(&self, event: Emitted) -> Result<(), SinkError> {
        let mut rec = self.inner.lock();
        if rec.fail_remaining > 0 {
            rec.fail_remaining -= 1;
            return Err(SinkError::Failed("simulated sink failure".to_string()));
        }
        rec.events.push(event);
        Ok(())
    }
}

impl Sink for RecordingSink {
    fn emit(&mut self, text: &str) -> Result<(), SinkError> {
        self.record(Emitted::Text(text.to_string()))
    }

    fn emit_control(&mut self, key: ControlKey) -> Result<(), SinkError> {
        self.record(Emitted::Key(key))
    }
}
