use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::SessionError;
use crate::reply::Reply;

pub const DEFAULT_MAX_LINE: usize = 4096;

/// Splits an inbound byte stream into protocol lines.
pub struct LineReader<R> {
    inner: BufReader<R>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            limit,
        }
    }

    /// Next line without its terminator, or `None` once the peer has closed.
    ///
    /// Accepts CRLF and bare LF. Fails as soon as the buffered line grows past
    /// the limit, without waiting for the terminator.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let mut line = Vec::new();
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                // A partial line cut by EOF is never handed to the protocol.
                return Ok(None);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    if line.len() + pos > self.limit + 1 {
                        return Err(SessionError::LineTooLong { limit: self.limit });
                    }
                    line.extend_from_slice(&buf[..pos]);
                    self.inner.consume(pos + 1);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.len() > self.limit {
                        return Err(SessionError::LineTooLong { limit: self.limit });
                    }
                    return Ok(Some(line));
                }
                None => {
                    let len = buf.len();
                    if line.len() + len > self.limit + 1 {
                        return Err(SessionError::LineTooLong { limit: self.limit });
                    }
                    line.extend_from_slice(buf);
                    self.inner.consume(len);
                }
            }
        }
    }
}

/// Writes replies, one flush per reply.
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    pub async fn write_reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        self.inner.write_all(reply.to_wire().as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
