use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

#[derive(Debug)]
pub enum IoOutcome {
    /// The whole buffer was transferred.
    Complete,
    /// The deadline passed first.
    TimedOut,
    /// The peer closed the stream (reads only).
    Closed,
    Failed(io::Error),
}

/// Result of one deadline-bounded operation.
#[derive(Debug)]
pub struct Transferred {
    pub bytes: usize,
    pub outcome: IoOutcome,
}

impl Transferred {
    fn new(bytes: usize, outcome: IoOutcome) -> Self {
        Self { bytes, outcome }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, IoOutcome::TimedOut)
    }

    pub fn closed(&self) -> bool {
        matches!(self.outcome, IoOutcome::Closed)
    }
}

#[async_trait]
pub trait DeadlineWrite {
    /// Writes as much of `buf` as the connection accepts before `deadline`.
    async fn write_until(&mut self, buf: &[u8], deadline: Instant) -> Transferred;

    /// Signals end-of-stream to the peer.
    async fn close(&mut self) -> io::Result<()>;
}

#[async_trait]
pub trait DeadlineRead {
    /// Fills `buf` until it is full, the deadline passes or the peer closes.
    async fn read_until(&mut self, buf: &mut [u8], deadline: Instant) -> Transferred;
}

/// OS-level timeouts are treated the same as our own deadline expiring.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn classify(err: io::Error) -> IoOutcome {
    if is_timeout(&err) {
        IoOutcome::TimedOut
    } else {
        IoOutcome::Failed(err)
    }
}

#[async_trait]
impl<T> DeadlineWrite for T
where
    T: AsyncWrite + Unpin + Send,
{
    async fn write_until(&mut self, buf: &[u8], deadline: Instant) -> Transferred {
        let mut written = 0;
        while written < buf.len() {
            // a single `write` is cancel safe: on expiry nothing was accepted
            match timeout_at(deadline, self.write(&buf[written..])).await {
                Err(_) => return Transferred::new(written, IoOutcome::TimedOut),
                Ok(Ok(0)) => {
                    let err = io::Error::new(io::ErrorKind::WriteZero, "connection accepted zero bytes");
                    return Transferred::new(written, IoOutcome::Failed(err));
                }
                Ok(Ok(n)) => written += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Transferred::new(written, classify(e)),
            }
        }
        Transferred::new(written, IoOutcome::Complete)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }
}

#[async_trait]
impl<T> DeadlineRead for T
where
    T: AsyncRead + Unpin + Send,
{
    async fn read_until(&mut self, buf: &mut [u8], deadline: Instant) -> Transferred {
        let mut filled = 0;
        while filled < buf.len() {
            match timeout_at(deadline, self.read(&mut buf[filled..])).await {
                Err(_) => return Transferred::new(filled, IoOutcome::TimedOut),
                Ok(Ok(0)) => return Transferred::new(filled, IoOutcome::Closed),
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Transferred::new(filled, classify(e)),
            }
        }
        Transferred::new(filled, IoOutcome::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    fn later(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn test_write_completes_within_capacity() {
        let (mut writer, mut reader) = duplex(64);

        let result = writer.write_until(b"hello", later(100)).await;
        assert_eq!(result.bytes, 5);
        assert!(matches!(result.outcome, IoOutcome::Complete));

        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_write_times_out_with_partial_count() {
        let (mut writer, _reader) = duplex(8);

        let result = writer.write_until(&[7u8; 20], later(5)).await;
        assert_eq!(result.bytes, 8);
        assert!(result.timed_out());
    }

    #[tokio::test]
    async fn test_write_times_out_with_nothing_accepted() {
        let (mut writer, _reader) = duplex(4);
        writer.write_all(&[0u8; 4]).await.unwrap();

        let result = writer.write_until(b"more", Instant::now()).await;
        assert_eq!(result.bytes, 0);
        assert!(result.timed_out());
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_fails() {
        let (mut writer, reader) = duplex(8);
        drop(reader);

        let result = writer.write_until(b"data", later(100)).await;
        assert_eq!(result.bytes, 0);
        assert!(matches!(result.outcome, IoOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_empty_buffers_complete_immediately() {
        let (mut a, mut b) = duplex(8);

        let wrote = a.write_until(&[], Instant::now()).await;
        assert_eq!(wrote.bytes, 0);
        assert!(matches!(wrote.outcome, IoOutcome::Complete));

        let read = b.read_until(&mut [], Instant::now()).await;
        assert_eq!(read.bytes, 0);
        assert!(matches!(read.outcome, IoOutcome::Complete));
    }

    #[tokio::test]
    async fn test_read_keeps_partial_bytes_on_timeout() {
        let (mut writer, mut reader) = duplex(64);
        writer.write_all(b"abc").await.unwrap();

        let mut buf = [0u8; 10];
        let result = reader.read_until(&mut buf, later(5)).await;
        assert_eq!(result.bytes, 3);
        assert!(result.timed_out());
        assert_eq!(&buf[..3], b"abc");
    }

    #[tokio::test]
    async fn test_read_reports_close_mid_fill() {
        let (mut writer, mut reader) = duplex(64);
        writer.write_all(b"tail").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut buf = [0u8; 10];
        let result = reader.read_until(&mut buf, later(100)).await;
        assert_eq!(result.bytes, 4);
        assert!(result.closed());
        assert_eq!(&buf[..4], b"tail");
    }

    #[tokio::test]
    async fn test_close_signals_end_of_stream() {
        let (mut writer, mut reader) = duplex(64);
        writer.write_until(b"last", later(100)).await;
        writer.close().await.unwrap();

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"last");
    }

    #[test]
    fn test_timeout_classification() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(matches!(classify(io::Error::from(io::ErrorKind::BrokenPipe)), IoOutcome::Failed(_)));
    }
}
