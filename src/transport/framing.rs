//! Record-paced reads for the raw connection
//!
//! When a handshake attempt fails, whatever the TLS engine has already read
//! from the socket is lost with it. During a simultaneous connect the bytes
//! right behind the offending ClientHello belong to the next attempt (the
//! peer's alert, then its retry ClientHello), so the engine must not read
//! past the record it is currently processing. [`RecordPaced`] enforces that
//! by never returning more than the rest of the current TLS record.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// TLS record header: content type, legacy version, big-endian length
const HEADER_LEN: usize = 5;

#[derive(Debug, Default)]
struct RecordCursor {
    header: [u8; HEADER_LEN],
    header_filled: usize,
    body_remaining: usize,
}

impl RecordCursor {
    /// Bytes that may be read before the next record boundary
    fn limit(&self) -> usize {
        if self.body_remaining > 0 {
            self.body_remaining
        } else {
            HEADER_LEN - self.header_filled
        }
    }

    /// Account for bytes handed to the reader; `bytes.len() <= self.limit()`
    fn advance(&mut self, bytes: &[u8]) {
        if self.body_remaining > 0 {
            self.body_remaining -= bytes.len();
            return;
        }

        let end = self.header_filled + bytes.len();
        self.header[self.header_filled..end].copy_from_slice(bytes);
        self.header_filled = end;
        if self.header_filled == HEADER_LEN {
            self.body_remaining = u16::from_be_bytes([self.header[3], self.header[4]]) as usize;
            self.header_filled = 0;
        }
    }
}

/// A raw connection that is read one TLS record at a time
#[derive(Debug)]
pub struct RecordPaced<S> {
    inner: S,
    cursor: RecordCursor,
}

impl<S> RecordPaced<S> {
    /// Wrap a raw connection positioned at a record boundary
    pub fn new(inner: S) -> Self {
        RecordPaced {
            inner,
            cursor: RecordCursor::default(),
        }
    }

    /// The wrapped connection
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for RecordPaced<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let want = this.cursor.limit().min(buf.remaining());
        if want == 0 {
            return Poll::Ready(Ok(()));
        }

        let start = buf.filled().len();
        let read = {
            let mut limited = ReadBuf::new(buf.initialize_unfilled_to(want));
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut limited))?;
            limited.filled().len()
        };
        buf.advance(read);
        this.cursor.advance(&buf.filled()[start..]);
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for RecordPaced<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn record(content_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![content_type, 0x03, 0x03];
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn test_reads_stop_at_record_boundary() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let first = record(0x16, &[1u8; 40]);
        let second = record(0x15, &[2, 10]);
        tx.write_all(&[first.clone(), second.clone()].concat())
            .await
            .unwrap();

        let mut paced = RecordPaced::new(rx);
        let mut buf = [0u8; 512];

        let mut got = Vec::new();
        while got.len() < first.len() {
            let n = paced.read(&mut buf).await.unwrap();
            assert!(got.len() + n <= first.len(), "read crossed a record boundary");
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, first);

        // The second record is read on its own, byte for byte.
        let n = paced.read(&mut buf).await.unwrap();
        assert!(n <= 5, "header read crossed into the body");
        let mut rest = buf[..n].to_vec();
        let mut tail = vec![0u8; second.len() - n];
        paced.read_exact(&mut tail).await.unwrap();
        rest.extend_from_slice(&tail);
        assert_eq!(rest, second);
    }

    #[tokio::test]
    async fn test_reads_append_after_existing_data() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let first = record(0x16, &[3u8; 4]);
        tx.write_all(&[first.clone(), record(0x15, &[2, 10])].concat())
            .await
            .unwrap();

        let mut paced = RecordPaced::new(rx);
        let mut storage = [0u8; 64];
        let mut buf = ReadBuf::new(&mut storage);
        buf.put_slice(b"xy");

        while buf.filled().len() < 2 + first.len() {
            std::future::poll_fn(|cx| Pin::new(&mut paced).poll_read(cx, &mut buf))
                .await
                .unwrap();
        }
        assert_eq!(&buf.filled()[..2], b"xy");
        assert_eq!(&buf.filled()[2..], &first[..]);
        assert_eq!(paced.cursor.limit(), HEADER_LEN);
    }

    #[tokio::test]
    async fn test_eof_passes_through() {
        let (tx, rx) = tokio::io::duplex(64);
        drop(tx);

        let mut paced = RecordPaced::new(rx);
        let mut buf = [0u8; 16];
        assert_eq!(paced.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn test_cursor_handles_split_header() {
        let mut cursor = RecordCursor::default();
        assert_eq!(cursor.limit(), 5);

        cursor.advance(&[0x17, 0x03]);
        assert_eq!(cursor.limit(), 3);

        cursor.advance(&[0x03, 0x01, 0x00]);
        assert_eq!(cursor.limit(), 256);

        cursor.advance(&[0u8; 256]);
        assert_eq!(cursor.limit(), 5);
    }

    #[tokio::test]
    async fn test_writes_pass_through() {
        let (tx, mut rx) = tokio::io::duplex(64);
        let mut paced = RecordPaced::new(tx);
        paced.write_all(b"hello").await.unwrap();

        let mut buf = [0u8; 5];
        rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }
}
