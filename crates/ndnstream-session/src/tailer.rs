//! Statistics file tailer and overlay renderer.
//!
//! [`StatTailer`] follows an append-only file on a background task, polling
//! for new bytes every `poll_interval`, and hands each complete line to a
//! [`LineHandler`]. [`OverlayRenderer`] is the handler a publishing session
//! uses: it turns a statistics line into the player's overlay text.
//!
//! The file may not exist when the tailer starts; the publisher creates it
//! some time after launch. A file that shrinks or is replaced is read again
//! from the beginning.

use std::collections::HashSet;
use std::io::{self, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ndnstream_core::{render_overlay, ParseWarning, PublishingPrefix, StatRecord};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::atomic::write_atomic_async;

/// Default delay between polls of the statistics file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Line handling
// ============================================================================

/// Receives each complete line of a tailed file exactly once.
#[async_trait]
pub trait LineHandler: Send + 'static {
    async fn handle_line(&mut self, line: &str);
}

#[async_trait]
impl<F> LineHandler for F
where
    F: FnMut(&str) + Send + 'static,
{
    async fn handle_line(&mut self, line: &str) {
        self(line)
    }
}

/// Splits appended bytes into complete lines.
///
/// Bytes after the last `\n` stay pending until their delimiter arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Read position within a tailed file.
#[derive(Debug, Default)]
struct FileCursor {
    offset: u64,
    inode: Option<u64>,
    buffer: LineBuffer,
}

impl FileCursor {
    fn reset(&mut self) {
        self.offset = 0;
        self.buffer.clear();
    }

    /// Reads whatever was appended since the last call.
    ///
    /// A missing file yields no lines.
    async fn poll(&mut self, path: &Path) -> io::Result<Vec<String>> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %path.display(), "Stat file not present yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let inode = meta.ino();
        if self.inode.is_some_and(|known| known != inode) {
            debug!(path = %path.display(), "Stat file replaced, reading from start");
            self.reset();
        } else if meta.len() < self.offset {
            debug!(
                path = %path.display(),
                offset = self.offset,
                len = meta.len(),
                "Stat file truncated, reading from start"
            );
            self.reset();
        }
        self.inode = Some(inode);

        if meta.len() == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        self.offset += bytes.len() as u64;

        Ok(self.buffer.push(&bytes))
    }
}

// ============================================================================
// Tailer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Background follower of an append-only text file.
pub struct StatTailer {
    poll_interval: Duration,
    state: TailerState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StatTailer {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            state: TailerState::Idle,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn state(&self) -> TailerState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Starts following `path` on a background task.
    ///
    /// Returns immediately. Only an idle tailer can start; otherwise the
    /// call is ignored and returns false. Must be called within a tokio
    /// runtime.
    pub fn start<H: LineHandler>(&mut self, path: PathBuf, handler: H) -> bool {
        if self.state != TailerState::Idle {
            debug!(state = ?self.state, "Tailer start ignored");
            return false;
        }

        let cancel = self.cancel.clone();
        let interval = self.poll_interval;
        debug!(path = %path.display(), interval_ms = interval.as_millis() as u64, "Starting stat tailer");
        self.handle = Some(tokio::spawn(follow(path, interval, cancel, handler)));
        self.state = TailerState::Running;
        true
    }

    /// Stops the background task and waits for it to finish.
    ///
    /// No-op unless running.
    pub async fn stop(&mut self) {
        if self.state != TailerState::Running {
            return;
        }
        self.state = TailerState::Stopping;
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Stat tailer task failed");
            }
        }
        self.state = TailerState::Stopped;
        debug!("Stat tailer stopped");
    }
}

impl Default for StatTailer {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Drop for StatTailer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn follow<H: LineHandler>(path: PathBuf, interval: Duration, cancel: CancellationToken, mut handler: H) {
    let mut cursor = FileCursor::default();
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failing = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = tick.tick() => {
                match cursor.poll(&path).await {
                    Ok(lines) => {
                        failing = false;
                        for line in lines {
                            handler.handle_line(&line).await;
                        }
                    }
                    Err(e) if !failing => {
                        failing = true;
                        warn!(path = %path.display(), error = %e, "Failed to read stat file");
                    }
                    Err(e) => {
                        trace!(path = %path.display(), error = %e, "Stat file still unreadable");
                    }
                }
            }
        }
    }

    trace!(path = %path.display(), "Stat tailer loop exited");
}

// ============================================================================
// Overlay renderer
// ============================================================================

/// Renders statistics lines into the player's overlay file.
pub struct OverlayRenderer {
    prefix: String,
    statistics: Vec<String>,
    overlay_path: PathBuf,
    reported: HashSet<String>,
}

impl OverlayRenderer {
    /// `statistics` is the declared statistic order of the publisher config.
    pub fn new(prefix: &PublishingPrefix, statistics: Vec<String>, overlay_path: PathBuf) -> Self {
        Self {
            prefix: prefix.to_string(),
            statistics,
            overlay_path,
            reported: HashSet::new(),
        }
    }

    pub fn overlay_path(&self) -> &Path {
        &self.overlay_path
    }

    /// Overlay shown before the first statistics line arrives.
    pub fn initial_text(&self) -> String {
        render_overlay(&self.prefix, &StatRecord::default()).0
    }

    /// Builds the overlay for one line, logging anything that was skipped.
    pub fn render_line(&mut self, line: &str) -> String {
        let (record, mut warnings) = StatRecord::parse(line, &self.statistics);
        let (text, render_warnings) = render_overlay(&self.prefix, &record);
        warnings.extend(render_warnings);

        for warning in warnings {
            self.report(warning);
        }
        text
    }

    /// Writes the initial overlay so the player has a file to load.
    pub async fn write_initial(&self) -> io::Result<()> {
        write_atomic_async(&self.overlay_path, self.initial_text().into_bytes()).await
    }

    fn report(&mut self, warning: ParseWarning) {
        let message = warning.to_string();
        if self.reported.insert(message.clone()) {
            warn!(warning = %message, "Skipping statistic");
        } else {
            trace!(warning = %message, "Skipping statistic");
        }
    }
}

#[async_trait]
impl LineHandler for OverlayRenderer {
    async fn handle_line(&mut self, line: &str) {
        let text = self.render_line(line);
        match write_atomic_async(&self.overlay_path, text.into_bytes()).await {
            Ok(()) => trace!(path = %self.overlay_path.display(), "Overlay updated"),
            Err(e) => warn!(path = %self.overlay_path.display(), error = %e, "Failed to write overlay"),
        }
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("prefix", &self.prefix)
            .field("statistics", &self.statistics)
            .field("overlay_path", &self.overlay_path)
            .finish()
    }
}
