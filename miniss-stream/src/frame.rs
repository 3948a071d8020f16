#![forbid(unsafe_code)]

//! Record framing.
//!
//! A record on the wire is a 2-byte big-endian ciphertext length followed by
//! that many bytes of sealed ciphertext (plaintext + 16-byte tag).

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{BufMut, BytesMut};
use miniss_crypto::aead::TAG_LEN;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::errors::{ChannelError, ChannelResult, Field};

/// Largest plaintext sealed into a single record.
pub const MAX_RECORD_PLAINTEXT: usize = 32768;

/// Size of the record length prefix.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest ciphertext a record produced by this crate can carry.
pub const MAX_RECORD_CIPHERTEXT: usize = MAX_RECORD_PLAINTEXT + TAG_LEN;

/// Prefix `ciphertext` with its length.
///
/// Callers guarantee `ciphertext.len() <= u16::MAX`, which holds for every
/// record sealed from at most [`MAX_RECORD_PLAINTEXT`] bytes.
pub fn encode_record(ciphertext: &[u8]) -> BytesMut {
    debug_assert!(ciphertext.len() <= u16::MAX as usize);
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + ciphertext.len());
    frame.put_u16(ciphertext.len() as u16);
    frame.extend_from_slice(ciphertext);
    frame
}

/// Fill `buf` completely from `reader`.
///
/// End of stream before `buf` is full is reported as a [`ChannelError::Truncation`]
/// on `field`, carrying how many bytes did arrive.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8], field: Field) -> ChannelResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => {
                return Err(ChannelError::Truncation { field, expected: buf.len(), received: filled });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChannelError::transport(e)),
        }
    }
    Ok(())
}

/// Incremental record reader.
///
/// Keeps partially received prefix and body bytes between polls, so a pending
/// read can be dropped and resumed without losing stream position.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    prefix: [u8; LENGTH_PREFIX_LEN],
    prefix_filled: usize,
    body: Vec<u8>,
    body_filled: usize,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `reader` until one complete record body is available.
    pub fn poll_record<R>(&mut self, reader: &mut R, cx: &mut Context<'_>) -> Poll<ChannelResult<Vec<u8>>>
    where
        R: AsyncRead + Unpin,
    {
        while self.prefix_filled < LENGTH_PREFIX_LEN {
            let n = ready!(poll_some(reader, cx, &mut self.prefix[self.prefix_filled..]))?;
            if n == 0 {
                return Poll::Ready(Err(ChannelError::Truncation {
                    field: Field::LengthPrefix,
                    expected: LENGTH_PREFIX_LEN,
                    received: self.prefix_filled,
                }));
            }
            self.prefix_filled += n;
            if self.prefix_filled == LENGTH_PREFIX_LEN {
                self.body = vec![0u8; u16::from_be_bytes(self.prefix) as usize];
            }
        }

        while self.body_filled < self.body.len() {
            let n = ready!(poll_some(reader, cx, &mut self.body[self.body_filled..]))?;
            if n == 0 {
                return Poll::Ready(Err(ChannelError::Truncation {
                    field: Field::RecordBody,
                    expected: self.body.len(),
                    received: self.body_filled,
                }));
            }
            self.body_filled += n;
        }

        self.prefix_filled = 0;
        self.body_filled = 0;
        Poll::Ready(Ok(std::mem::take(&mut self.body)))
    }
}

fn poll_some<R>(reader: &mut R, cx: &mut Context<'_>, dst: &mut [u8]) -> Poll<ChannelResult<usize>>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = ReadBuf::new(dst);
        match ready!(Pin::new(&mut *reader).poll_read(cx, &mut buf)) {
            Ok(()) => return Poll::Ready(Ok(buf.filled().len())),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Poll::Ready(Err(ChannelError::transport(e))),
        }
    }
}

/// Read one length-prefixed record body.
pub async fn read_record_body<R>(reader: &mut R) -> ChannelResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = RecordDecoder::new();
    std::future::poll_fn(|cx| decoder.poll_record(reader, cx)).await
}
