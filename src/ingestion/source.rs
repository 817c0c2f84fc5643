//! Source stream: wait for the uploaded file, then read it line by line.

use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Fired by the upload side once the file is fully written.
pub struct ReadyTrigger {
    tx: oneshot::Sender<()>,
}

/// Awaited by the ingestion side before the file is opened.
pub struct ReadySignal {
    rx: oneshot::Receiver<()>,
}

pub fn ready_signal() -> (ReadyTrigger, ReadySignal) {
    let (tx, rx) = oneshot::channel();
    (ReadyTrigger { tx }, ReadySignal { rx })
}

impl ReadyTrigger {
    pub fn fire(self) {
        // The receiver may already be gone if ingestion was abandoned.
        let _ = self.tx.send(());
    }
}

/// Wait until `path` can be opened.
///
/// The readiness signal is the primary mechanism. Without one, or if its trigger is dropped
/// unfired, the file's existence is polled every `poll_interval` with no timeout.
pub async fn await_source(path: &Path, signal: Option<ReadySignal>, poll_interval: Duration) {
    if let Some(signal) = signal {
        if signal.rx.await.is_err() {
            warn!(
                "Readiness signal for {} dropped, falling back to polling",
                path.display()
            );
        }
    }

    while !source_available(path).await {
        tokio::time::sleep(poll_interval).await;
    }
}

/// One existence probe. A failed check is logged and treated as not yet available.
async fn source_available(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(true) => true,
        Ok(false) => {
            debug!("Waiting for file to be available: {}", path.display());
            false
        }
        Err(e) => {
            warn!("Cannot check {} yet: {}", path.display(), e);
            false
        }
    }
}

/// Line stream over raw bytes. Invalid UTF-8 is replaced with U+FFFD instead of ending the
/// stream; only real I/O errors surface.
pub struct SourceLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> SourceLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next line without its `\n` or `\r\n` terminator, `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Open `path` as an async stream of lines.
pub async fn open_lines(path: &Path) -> Result<SourceLines<BufReader<File>>> {
    let file = File::open(path).await?;
    Ok(SourceLines::new(BufReader::new(file)))
}
