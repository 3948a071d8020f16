#![forbid(unsafe_code)]

//! Secure record layer.
//!
//! A [`SecureSocket`] is only ever produced by a successful
//! [`crate::handshake()`]. Outbound bytes are cut into records of at most
//! [`MAX_RECORD_PLAINTEXT`] bytes, sealed under the transmit counter and
//! written with a 2-byte length prefix. Inbound records are opened strictly in
//! order under the receive counter; any decrypted bytes that do not fit the
//! caller's buffer are kept for the next read, so record boundaries never show
//! through the byte-stream interface.
//!
//! Reads and writes share no state. [`SecureSocket::into_split`] hands out a
//! [`SecureReader`] and a [`SecureWriter`] that can be driven from two tasks.
//! All three types implement [`AsyncRead`] / [`AsyncWrite`], so they plug into
//! `tokio::io::copy` and friends. Through those traits empty records are
//! skipped and a clean close on a record boundary reads as EOF.
//!
//! Failure handling differs per direction: the first failed read is cached and
//! returned by every later read without touching the transport again, while a
//! failed write is returned as-is. After a failed write the transmit counter
//! has already advanced and the channel must be discarded.
//!
//! Transport addresses and deadlines are not forwarded. Read addresses off the
//! transport before the handshake, bound operations with `tokio::time`, or
//! take the transport back with [`SecureSocket::into_inner`].

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use miniss_crypto::{DirectionalCiphers, PublicKey, RecordOpener, RecordSealer, StaticKeyPair};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tracing::{debug, trace, warn};

use crate::errors::{ChannelError, ChannelResult};
use crate::frame::{encode_record, RecordDecoder, MAX_RECORD_PLAINTEXT};

/// Plaintext length of the record exchanged by the liveness check.
pub const LIVENESS_PROBE_LEN: usize = 16;

/// Channel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Handshaking,
    Verifying,
    Open,
    /// A read failed; the error is cached.
    Errored,
}

/// Inbound half of a secure channel.
pub struct SecureReader<R> {
    inner: R,
    opener: RecordOpener,
    decoder: RecordDecoder,
    spill: BytesMut,
    error: Option<ChannelError>,
}

impl<R> SecureReader<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(inner: R, opener: RecordOpener) -> Self {
        Self { inner, opener, decoder: RecordDecoder::new(), spill: BytesMut::new(), error: None }
    }

    /// Read decrypted bytes into `buf`, returning how many were written.
    ///
    /// Buffered plaintext from an earlier record is served first. Otherwise a
    /// cached error is returned, or exactly one record is read and opened.
    /// A record carrying no plaintext yields `Ok(0)`.
    pub async fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        poll_fn(|cx| self.poll_read_plain(cx, buf)).await
    }

    /// Fill `buf` completely, reading as many records as needed.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> ChannelResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..]).await?;
        }
        Ok(())
    }

    /// Number of decrypted bytes held back from earlier records.
    pub fn buffered(&self) -> usize {
        self.spill.len()
    }

    /// The cached read error, if a read has failed.
    pub fn error(&self) -> Option<&ChannelError> {
        self.error.as_ref()
    }

    /// Poll form of [`SecureReader::read`].
    pub fn poll_read_plain(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<ChannelResult<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if !self.spill.is_empty() {
            return Poll::Ready(Ok(self.drain_spill(buf)));
        }

        let record = ready!(self.poll_record(cx))?;
        let n = record.len().min(buf.len());
        buf[..n].copy_from_slice(&record[..n]);
        if n < record.len() {
            self.spill.extend_from_slice(&record[n..]);
        }
        Poll::Ready(Ok(n))
    }

    fn drain_spill(&mut self, buf: &mut [u8]) -> usize {
        let n = self.spill.len().min(buf.len());
        buf[..n].copy_from_slice(&self.spill[..n]);
        self.spill.advance(n);
        n
    }

    /// Read and open exactly one record, caching any failure.
    pub(crate) async fn read_record(&mut self) -> ChannelResult<Bytes> {
        poll_fn(|cx| self.poll_record(cx)).await
    }

    fn poll_record(&mut self, cx: &mut Context<'_>) -> Poll<ChannelResult<Bytes>> {
        if let Some(err) = &self.error {
            return Poll::Ready(Err(err.clone()));
        }
        let result = ready!(self.decoder.poll_record(&mut self.inner, cx)).and_then(|ciphertext| {
            let counter = self.opener.counter();
            let plaintext = self.opener.open(&ciphertext)?;
            trace!(counter, len = plaintext.len(), "opened record");
            Ok(Bytes::from(plaintext))
        });
        if let Err(err) = &result {
            if !err.is_clean_close() {
                warn!(error = %err, counter = self.opener.counter(), "secure read failed");
            }
            self.error = Some(err.clone());
        }
        Poll::Ready(result)
    }
}

impl<R> AsyncRead for SecureReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            match ready!(this.poll_read_plain(cx, buf.initialize_unfilled())) {
                // Empty record: zero bytes here would read as EOF.
                Ok(0) => continue,
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(e) if e.is_clean_close() => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }
    }
}

/// Outbound half of a secure channel.
pub struct SecureWriter<W> {
    inner: W,
    sealer: RecordSealer,
    /// Sealed frame bytes accepted but not yet handed to the transport.
    pending: BytesMut,
}

impl<W> SecureWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(inner: W, sealer: RecordSealer) -> Self {
        Self { inner, sealer, pending: BytesMut::new() }
    }

    /// Seal and send `data`, returning `data.len()` on success.
    ///
    /// Inputs longer than [`MAX_RECORD_PLAINTEXT`] go out as several records,
    /// in order, each flushed before the next is sealed. An empty input still
    /// produces one (tag-only) record.
    ///
    /// A failure part-way through returns only the error: records already
    /// sent are not counted, and the channel must be discarded.
    pub async fn write(&mut self, data: &[u8]) -> ChannelResult<usize> {
        if data.is_empty() {
            self.write_record(data).await?;
            return Ok(0);
        }
        for chunk in data.chunks(MAX_RECORD_PLAINTEXT) {
            self.write_record(chunk).await?;
        }
        Ok(data.len())
    }

    /// Send any buffered records, then shut down the write side of the transport.
    pub async fn shutdown(&mut self) -> ChannelResult<()> {
        poll_fn(|cx| self.poll_close(cx)).await.map_err(ChannelError::transport)
    }

    async fn write_record(&mut self, chunk: &[u8]) -> ChannelResult<()> {
        poll_fn(|cx| self.poll_drain(cx)).await.map_err(ChannelError::transport)?;
        self.queue_record(chunk)?;
        poll_fn(|cx| self.poll_drain_and_flush(cx)).await.map_err(ChannelError::transport)
    }

    /// Seal `chunk` under the next transmit counter and append the frame to `pending`.
    fn queue_record(&mut self, chunk: &[u8]) -> ChannelResult<()> {
        let counter = self.sealer.counter();
        let sealed = self.sealer.seal(chunk)?;
        self.pending.extend_from_slice(&encode_record(&sealed));
        trace!(counter, len = chunk.len(), "sealed record");
        Ok(())
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.pending.is_empty() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending.advance(n);
        }
        Poll::Ready(Ok(()))
    }

    fn poll_drain_and_flush(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain_and_flush(cx))?;
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<W> AsyncWrite for SecureWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Accepts at most one record's worth of `buf` per call. Whatever part of
    /// the sealed frame the transport does not take at once is sent on the
    /// next write, flush or shutdown. An empty `buf` writes nothing.
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let chunk = &buf[..buf.len().min(MAX_RECORD_PLAINTEXT)];
        this.queue_record(chunk)?;
        // Hand the frame over now if the transport has room.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(chunk.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_drain_and_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_close(cx)
    }
}

/// Established secure channel over transport `T`.
pub struct SecureSocket<T> {
    reader: SecureReader<ReadHalf<T>>,
    writer: SecureWriter<WriteHalf<T>>,
    local_static: StaticKeyPair,
    remote_static: PublicKey,
}

impl<T> SecureSocket<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Bind the derived ciphers to the transport halves and run the liveness check.
    pub(crate) async fn establish(
        read_half: ReadHalf<T>,
        write_half: WriteHalf<T>,
        local_static: StaticKeyPair,
        remote_static: PublicKey,
        ciphers: DirectionalCiphers,
    ) -> ChannelResult<Self> {
        let mut socket = Self {
            reader: SecureReader::new(read_half, ciphers.opener),
            writer: SecureWriter::new(write_half, ciphers.sealer),
            local_static,
            remote_static,
        };
        debug!(state = ?ChannelState::Verifying, "running liveness check");
        socket.verify_liveness().await?;
        debug!(state = ?ChannelState::Open, "secure channel open");
        Ok(socket)
    }

    /// Exchange one all-zero probe record in each direction.
    async fn verify_liveness(&mut self) -> ChannelResult<()> {
        let probe = [0u8; LIVENESS_PROBE_LEN];
        let (sent, received) = tokio::join!(self.writer.write(&probe), self.reader.read_record());

        let echoed = received.map_err(|e| ChannelError::LivenessCheckFailure(Box::new(e)))?;
        sent?;
        if !bool::from(echoed[..].ct_eq(&probe[..])) {
            return Err(ChannelError::LivenessCheckFailure(Box::new(ChannelError::ProtocolViolation(
                "unexpected liveness probe contents".to_string(),
            ))));
        }
        Ok(())
    }

    /// Long-term public key presented by the peer. Callers verify it out of band.
    pub fn remote_pk(&self) -> PublicKey {
        self.remote_static
    }

    /// Local long-term key pair this channel was established with.
    pub fn local_static(&self) -> &StaticKeyPair {
        &self.local_static
    }

    pub fn local_pk(&self) -> PublicKey {
        self.local_static.public()
    }

    pub fn state(&self) -> ChannelState {
        if self.reader.error().is_some() {
            ChannelState::Errored
        } else {
            ChannelState::Open
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        self.reader.read(buf).await
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> ChannelResult<()> {
        self.reader.read_exact(buf).await
    }

    pub async fn write(&mut self, data: &[u8]) -> ChannelResult<usize> {
        self.writer.write(data).await
    }

    pub async fn shutdown(&mut self) -> ChannelResult<()> {
        self.writer.shutdown().await
    }

    /// Split into independently usable read and write halves.
    pub fn into_split(self) -> (SecureReader<ReadHalf<T>>, SecureWriter<WriteHalf<T>>) {
        (self.reader, self.writer)
    }

    /// Give back the raw transport, e.g. to query its addresses or close it.
    ///
    /// Buffered plaintext, unsent records and both ciphers are discarded.
    pub fn into_inner(self) -> T
    where
        T: Unpin,
    {
        self.reader.inner.unsplit(self.writer.inner)
    }
}

impl<T> AsyncRead for SecureSocket<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl<T> AsyncWrite for SecureSocket<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}

impl<T> std::fmt::Debug for SecureSocket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSocket")
            .field("remote_static", &self.remote_static)
            .field("tx_counter", &self.writer.sealer.counter())
            .field("rx_counter", &self.reader.opener.counter())
            .finish_non_exhaustive()
    }
}
