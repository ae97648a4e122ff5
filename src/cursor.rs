use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Sequential reader over the source file that can step backwards.
///
/// Bytes read by [`fill`](Self::fill) but not accepted by the connection are
/// handed back with [`rewind`](Self::rewind), so the next fill starts with them.
pub struct FileCursor<F> {
    inner: F,
    position: u64,
}

impl<F> FileCursor<F>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    pub fn new(inner: F) -> Self {
        Self { inner, position: 0 }
    }

    /// Reads until `buf` is full or end-of-file. Returns the count and whether
    /// end-of-file was hit before the buffer filled up.
    ///
    /// A read that fills the buffer exactly does not report end-of-file, and an
    /// empty buffer never does.
    pub async fn fill(&mut self, buf: &mut [u8]) -> io::Result<(usize, bool)> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]).await {
                Ok(0) => {
                    self.position += filled as u64;
                    return Ok((filled, true));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.position += filled as u64;
        Ok((filled, false))
    }

    /// Moves the cursor back by `by` bytes.
    pub async fn rewind(&mut self, by: u64) -> io::Result<()> {
        if by == 0 {
            return Ok(());
        }
        if by > self.position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Rewind position before start of file",
            ));
        }
        let offset = i64::try_from(by)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Rewind distance too large"))?;
        self.position = self.inner.seek(SeekFrom::Current(-offset)).await?;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}
