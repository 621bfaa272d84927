//! Pose sources feeding frames to sessions and calibrations.
//!
//! A source wraps whatever produces landmark frames: a camera-backed pose
//! estimator in production, a recorded JSON Lines stream or an in-memory
//! channel elsewhere.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

use rehab_core::{Error, PoseFrame, Result};

/// Trait for pose frame producers
#[async_trait]
pub trait PoseSource: Send + Sync {
    /// Acquire the underlying device or stream
    async fn open(&mut self) -> Result<()>;

    /// Next frame, `None` once the stream has ended
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>>;

    /// Release the underlying device or stream
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// In-memory frame sequence, optionally paced
pub struct ReplaySource {
    frames: VecDeque<PoseFrame>,
    frame_delay: Option<Duration>,
    is_open: bool,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = PoseFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            frame_delay: None,
            is_open: false,
        }
    }

    /// Wait `delay` before delivering each frame
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl PoseSource for ReplaySource {
    async fn open(&mut self) -> Result<()> {
        self.is_open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        if !self.is_open {
            return Err(Error::SourceRead("replay source is not open".into()));
        }
        if let Some(delay) = self.frame_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.frames.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.is_open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn describe(&self) -> String {
        format!("replay ({} frames)", self.frames.len())
    }
}

/// Recorded stream, one JSON-encoded [`PoseFrame`] per line.
///
/// Blank lines are ignored. A malformed line is a read error.
pub struct JsonLinesSource {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
}

impl JsonLinesSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines: None,
            line_no: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PoseSource for JsonLinesSource {
    async fn open(&mut self) -> Result<()> {
        if self.lines.is_some() {
            return Ok(());
        }

        let file = File::open(&self.path).await.map_err(|e| {
            Error::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        self.lines = Some(BufReader::new(file).lines());
        self.line_no = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| Error::SourceRead(format!("{} is not open", self.path.display())))?;

        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| Error::SourceRead(format!("{}: {}", self.path.display(), e)))?;
            self.line_no += 1;

            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            return serde_json::from_str(&line).map(Some).map_err(|e| {
                Error::SourceRead(format!(
                    "{}:{}: invalid frame: {}",
                    self.path.display(),
                    self.line_no,
                    e
                ))
            });
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.lines = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    fn describe(&self) -> String {
        format!("jsonl {}", self.path.display())
    }
}

/// Frames pushed by another task, e.g. a live pose estimator
pub struct ChannelSource {
    rx: mpsc::Receiver<PoseFrame>,
    is_open: bool,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<PoseFrame>) -> Self {
        Self { rx, is_open: false }
    }

    /// Bounded channel plus the source reading from it
    pub fn pair(capacity: usize) -> (mpsc::Sender<PoseFrame>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl PoseSource for ChannelSource {
    async fn open(&mut self) -> Result<()> {
        self.is_open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        // All senders dropped ends the stream
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        self.is_open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}
