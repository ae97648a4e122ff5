use std::io;

use bytes::BytesMut;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncRead, AsyncSeek};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cursor::FileCursor;
use crate::deadline::{DeadlineRead, DeadlineWrite, IoOutcome};
use crate::digest::{Digest, RollingHasher};
use crate::error::TransferError;
use crate::schedule::{Schedule, TransferWindow};

/// Per-process tallies. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub iterations: u64,
    pub bytes: u64,
    pub timeouts: u64,
}

/// What one sender iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendStep {
    pub read: usize,
    pub written: usize,
    pub eof: bool,
    pub rewound: u64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveStep {
    pub received: usize,
    pub closed: bool,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SendSummary {
    pub stats: TransferStats,
    pub digest: Digest,
}

#[derive(Debug, Clone, Copy)]
pub struct ReceiveSummary {
    pub stats: TransferStats,
    pub digest: Digest,
}

pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

pub struct SendSession<F> {
    cursor: FileCursor<F>,
    hasher: RollingHasher,
    stats: TransferStats,
    buffer: BytesMut,
    done: bool,
    progress: Option<ProgressBar>,
}

impl<F> SendSession<F>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    pub fn new(source: F) -> Self {
        Self {
            cursor: FileCursor::new(source),
            hasher: RollingHasher::new(),
            stats: TransferStats::default(),
            buffer: BytesMut::new(),
            done: false,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Runs one iteration: read up to `window.size` bytes from the file, offer
    /// them to the connection before the deadline, rewind whatever was refused.
    pub async fn step<C>(&mut self, conn: &mut C, window: TransferWindow) -> Result<SendStep, TransferError>
    where
        C: DeadlineWrite + ?Sized,
    {
        // armed before the file read, as with a socket write deadline
        let deadline = Instant::now() + window.deadline;

        self.buffer.clear();
        self.buffer.resize(window.size, 0);
        let (read, eof) = self.cursor.fill(&mut self.buffer[..]).await?;

        self.stats.iterations += 1;
        let sent = conn.write_until(&self.buffer[..read], deadline).await;
        let written = sent.bytes;
        self.hasher.update(&self.buffer[..written]);
        self.stats.bytes += written as u64;
        if let Some(pb) = &self.progress {
            pb.inc(written as u64);
        }

        let timed_out = match sent.outcome {
            IoOutcome::Complete => false,
            IoOutcome::TimedOut => {
                self.stats.timeouts += 1;
                true
            }
            IoOutcome::Closed => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed the connection").into());
            }
            IoOutcome::Failed(e) => return Err(e.into()),
        };
        if written > 0 && written < read {
            debug!("wrote {} bytes, wanted to write {} bytes, timed out", written, read);
        }

        let deficit = (read - written) as u64;
        if deficit > 0 {
            self.cursor.rewind(deficit).await?;
            // unsent bytes remain, so end-of-file in this window does not count
            self.done = false;
        } else {
            self.done = eof;
        }

        Ok(SendStep {
            read,
            written,
            eof,
            rewound: deficit,
            timed_out,
        })
    }

    /// Steps until the whole file has been accepted, then closes the write side.
    pub async fn run<C, S>(mut self, conn: &mut C, mut schedule: S) -> Result<SendSummary, TransferError>
    where
        C: DeadlineWrite + ?Sized,
        S: Schedule,
    {
        while !self.done {
            let window = schedule.next_window();
            self.step(conn, window).await?;
        }
        conn.close().await?;

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!(
            "{} writes, {} bytes, {} timeouts.",
            self.stats.iterations, self.stats.bytes, self.stats.timeouts
        );
        Ok(SendSummary {
            stats: self.stats,
            digest: self.hasher.finalize(),
        })
    }
}

#[derive(Default)]
pub struct ReceiveSession {
    hasher: RollingHasher,
    stats: TransferStats,
    buffer: BytesMut,
    done: bool,
    progress: Option<ProgressBar>,
}

impl ReceiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Runs one iteration. Whatever arrived before the deadline is kept; the
    /// peer closing the stream is the only thing that ends the session.
    pub async fn step<C>(&mut self, conn: &mut C, window: TransferWindow) -> Result<ReceiveStep, TransferError>
    where
        C: DeadlineRead + ?Sized,
    {
        let deadline = Instant::now() + window.deadline;

        self.buffer.clear();
        self.buffer.resize(window.size, 0);

        self.stats.iterations += 1;
        let got = conn.read_until(&mut self.buffer[..], deadline).await;
        let received = got.bytes;
        self.hasher.update(&self.buffer[..received]);
        self.stats.bytes += received as u64;
        if let Some(pb) = &self.progress {
            pb.inc(received as u64);
        }

        let mut step = ReceiveStep {
            received,
            closed: false,
            timed_out: false,
        };
        match got.outcome {
            IoOutcome::Complete => {}
            IoOutcome::TimedOut => {
                self.stats.timeouts += 1;
                step.timed_out = true;
            }
            IoOutcome::Closed => {
                self.done = true;
                step.closed = true;
            }
            IoOutcome::Failed(e) => return Err(e.into()),
        }
        if received > 0 && received < window.size {
            debug!(
                "read {} bytes, wanted to read {}, {}",
                received,
                window.size,
                if step.closed { "end of stream" } else { "timed out" }
            );
        }

        Ok(step)
    }

    pub async fn run<C, S>(mut self, conn: &mut C, mut schedule: S) -> Result<ReceiveSummary, TransferError>
    where
        C: DeadlineRead + ?Sized,
        S: Schedule,
    {
        while !self.done {
            let window = schedule.next_window();
            self.step(conn, window).await?;
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!(
            "{} reads, {} bytes, {} timeouts.",
            self.stats.iterations, self.stats.bytes, self.stats.timeouts
        );
        Ok(ReceiveSummary {
            stats: self.stats,
            digest: self.hasher.finalize(),
        })
    }
}
