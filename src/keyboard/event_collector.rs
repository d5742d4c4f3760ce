use std::collections::HashSet;
use std::io::{ErrorKind, Read};
use std::thread;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::key_code::KeyCode;

const READER_PIPE_CAPACITY: usize = 4096;

// Raw key transition with the monotonic time it was collected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: KeyCode,
    pub pressed: bool,
    pub timestamp: Instant,
}

impl RawKeyEvent {
    pub fn pressed(key: KeyCode, timestamp: Instant) -> Self {
        Self {
            key,
            pressed: true,
            timestamp,
        }
    }

    pub fn released(key: KeyCode, timestamp: Instant) -> Self {
        Self {
            key,
            pressed: false,
            timestamp,
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Invalid key event line {line:?}: {reason}")]
    ParseError { line: String, reason: String },

    #[error("Failed to read key events: {0}")]
    ReadError(#[from] std::io::Error),
}

/// Drops transitions a real keyboard should never deliver twice in a row
///
/// A press for a key already held, or a release for a key that is not held,
/// is a duplicate. Usages outside the keyboard range never pass.
#[derive(Debug, Default)]
pub struct KeyStateFilter {
    pressed_keys: HashSet<KeyCode>,
}

impl KeyStateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the transition should be forwarded
    pub fn accept(&mut self, key: KeyCode, pressed: bool) -> bool {
        if !key.is_keyboard_usage() {
            debug!("Ignoring usage outside keyboard range: {}", key);
            return false;
        }

        if pressed {
            self.pressed_keys.insert(key)
        } else {
            self.pressed_keys.remove(&key)
        }
    }

    pub fn held_keys(&self) -> usize {
        self.pressed_keys.len()
    }

    pub fn clear(&mut self) {
        self.pressed_keys.clear();
    }
}

/// Parses one line of the text key-event format
///
/// `<usage> <down|up>` where usage is `0x..` hex or decimal. Blank lines and
/// `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<(KeyCode, bool)>, CollectorError> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }

    let parse_error = |reason: &str| CollectorError::ParseError {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = content.split_whitespace();
    let (Some(usage), Some(state), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(parse_error("expected `<usage> <down|up>`"));
    };

    let usage = match usage
        .strip_prefix("0x")
        .or_else(|| usage.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => usage.parse::<u16>(),
    }
    .map_err(|e| parse_error(&format!("bad usage: {}", e)))?;

    let pressed = match state.to_ascii_lowercase().as_str() {
        "down" | "press" | "pressed" | "1" => true,
        "up" | "release" | "released" | "0" => false,
        _ => return Err(parse_error("state must be `down` or `up`")),
    };

    Ok(Some((KeyCode(usage), pressed)))
}

// Public interface for spawning a line-oriented key collector
pub struct CollectorHandle {
    task_handle: JoinHandle<Result<(), CollectorError>>,
}

impl CollectorHandle {
    /// Reads key events from `reader` and forwards filtered ones to `sender`
    ///
    /// Runs until EOF, until `token` is cancelled, or until the receiving side
    /// is gone. Malformed lines are logged and skipped.
    pub fn spawn<R>(
        reader: R,
        sender: mpsc::UnboundedSender<RawKeyEvent>,
        token: CancellationToken,
    ) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        info!("Spawning key event collector");
        let task_handle = tokio::spawn(async move {
            let result = run_collection_loop(reader, sender, token).await;
            match &result {
                Ok(()) => info!("Key event collector finished"),
                Err(e) => error!("Key event collector terminated with error: {}", e),
            }
            result
        });

        Self { task_handle }
    }

    /// Waits for the collector task; a panic is reported as an I/O error
    pub async fn join(self) -> Result<(), CollectorError> {
        match self.task_handle.await {
            Ok(result) => result,
            Err(e) => Err(CollectorError::ReadError(std::io::Error::other(format!(
                "collector task failed: {}",
                e
            )))),
        }
    }
}

async fn run_collection_loop<R>(
    mut reader: R,
    sender: mpsc::UnboundedSender<RawKeyEvent>,
    token: CancellationToken,
) -> Result<(), CollectorError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut filter = KeyStateFilter::new();
    let mut forwarded = 0usize;

    loop {
        buffer.clear();
        let read = tokio::select! {
            _ = token.cancelled() => {
                info!("Collector cancelled after forwarding {} events", forwarded);
                return Ok(());
            }
            read = reader.read_until(b'\n', &mut buffer) => read?,
        };

        if read == 0 {
            info!("Key event input closed after forwarding {} events", forwarded);
            return Ok(());
        }

        let Ok(line) = std::str::from_utf8(&buffer) else {
            warn!("Skipping key event line that is not valid UTF-8: {:?}", buffer);
            continue;
        };

        let (key, pressed) = match parse_line(line.trim_end_matches(['\n', '\r'])) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        if !filter.accept(key, pressed) {
            debug!("Dropped duplicate transition: {} pressed={}", key, pressed);
            continue;
        }

        let event = RawKeyEvent {
            key,
            pressed,
            timestamp: Instant::now(),
        };
        if sender.send(event).is_err() {
            warn!("Key event receiver dropped, stopping collector");
            return Ok(());
        }
        forwarded += 1;
    }
}

/// Moves a blocking byte source onto its own OS thread
///
/// The returned stream yields everything `source` produces and reaches EOF
/// when it does. A read blocked on the thread never holds up runtime
/// shutdown, so this is the way to feed a terminal's stdin to
/// [`CollectorHandle::spawn`].
pub fn spawn_blocking_reader<S>(source: S, name: &str) -> Result<DuplexStream, CollectorError>
where
    S: Read + Send + 'static,
{
    let runtime = Handle::try_current().map_err(std::io::Error::other)?;
    let (mut writer, reader) = tokio::io::duplex(READER_PIPE_CAPACITY);
    let thread_name = format!("{}-reader", name);

    thread::Builder::new().name(thread_name.clone()).spawn(move || {
        let mut source = source;
        let mut chunk = [0u8; 1024];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("{} failed: {}", thread_name, e);
                    break;
                }
            };
            if runtime.block_on(writer.write_all(&chunk[..n])).is_err() {
                debug!("{} has no consumer left", thread_name);
                break;
            }
        }
        debug!("{} finished", thread_name);
    })?;

    Ok(reader)
}
