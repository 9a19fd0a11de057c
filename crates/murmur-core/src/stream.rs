//! Chunked streaming encryption over byte streams.
//!
//! [`StreamCodec`] drives a [`StreamCipher`] over any `Read`/`Write` pair.
//!
//! ## Wire Format
//!
//! ```text
//! [header: HEADER_SIZE][chunk: <= buffer_size + ABYTES]*
//! ```
//!
//! Every chunk but the last seals exactly `buffer_size` plaintext bytes; the
//! last one is tagged `Final` and may be shorter (empty only for empty input).
//! The decrypting side must use the same `buffer_size`.

use std::io::{self, ErrorKind, Read, Write};
use std::marker::PhantomData;

use murmur_crypto::stream::{SecretStream, StreamCipher, StreamTag};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::StreamConfig;
use crate::error::StreamError;

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streaming encryptor/decryptor for inputs of unbounded length.
#[derive(Debug, Clone, Copy)]
pub struct StreamCodec<C: StreamCipher = SecretStream> {
    buffer_size: usize,
    _cipher: PhantomData<C>,
}

impl<C: StreamCipher> StreamCodec<C> {
    /// Create a codec sealing `buffer_size` plaintext bytes per chunk.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is zero.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "stream buffer size must be non-zero");
        Self {
            buffer_size,
            _cipher: PhantomData,
        }
    }

    /// Create a codec from a [`StreamConfig`].
    #[must_use]
    pub fn with_config(config: &StreamConfig) -> Self {
        Self::new(config.buffer_size)
    }

    /// Plaintext bytes per chunk.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Upper bound of a sealed chunk.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.buffer_size + C::ABYTES
    }

    /// Encrypt all of `input` into `output`.
    ///
    /// Returns the total number of bytes written (header included).
    ///
    /// # Errors
    ///
    /// Returns `ReadError`/`WriteError` for I/O failures and
    /// `EncryptionFailed` if the primitive refuses to seal a chunk.
    pub fn encrypt<R: Read, W: Write>(
        &self,
        key: &C::Key,
        mut input: R,
        mut output: W,
    ) -> Result<u64, StreamError> {
        let (mut state, header) = C::init_push(key).map_err(StreamError::EncryptionFailed)?;
        output.write_all(&header).map_err(StreamError::WriteError)?;
        let mut written = header.len() as u64;

        let mut current = Zeroizing::new(vec![0u8; self.buffer_size]);
        let mut next = Zeroizing::new(vec![0u8; self.buffer_size]);
        let mut current_len = read_full(&mut input, &mut current).map_err(StreamError::ReadError)?;
        let mut chunks = 0u64;

        loop {
            // A short read means the input is exhausted; a full one needs a
            // look-ahead to know whether this chunk is the last.
            let next_len = if current_len == self.buffer_size {
                read_full(&mut input, &mut next).map_err(StreamError::ReadError)?
            } else {
                0
            };
            let tag = if next_len == 0 {
                StreamTag::Final
            } else {
                StreamTag::More
            };

            let sealed = C::push(&mut state, &current[..current_len], tag)
                .map_err(StreamError::EncryptionFailed)?;
            output.write_all(&sealed).map_err(StreamError::WriteError)?;
            written += sealed.len() as u64;
            chunks += 1;

            if tag == StreamTag::Final {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            current_len = next_len;
        }

        output.flush().map_err(StreamError::WriteError)?;
        debug!(chunks, bytes = written, "stream encrypted");
        Ok(written)
    }

    /// Decrypt a stream produced by [`encrypt`](Self::encrypt).
    ///
    /// Returns the number of plaintext bytes written. Plaintext of chunks
    /// that authenticated is written before the end of the stream is
    /// checked, so a caller must discard `output` on error.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` if the header is short or does not match `key`
    /// - `DecryptionFailed` if a chunk does not authenticate, data follows
    ///   the final chunk, or the stream ends without one
    /// - `ReadError`/`WriteError` for I/O failures
    pub fn decrypt<R: Read, W: Write>(
        &self,
        key: &C::Key,
        mut input: R,
        mut output: W,
    ) -> Result<u64, StreamError> {
        let mut header = vec![0u8; C::HEADER_SIZE];
        let header_len = read_full(&mut input, &mut header).map_err(StreamError::ReadError)?;
        let mut state =
            C::init_pull(key, &header[..header_len]).map_err(|_| StreamError::MalformedHeader)?;

        let mut chunk = vec![0u8; self.chunk_size()];
        let mut written = 0u64;
        let mut chunks = 0u64;
        let mut last_tag = None;

        loop {
            let len = read_full(&mut input, &mut chunk).map_err(StreamError::ReadError)?;
            if len == 0 {
                break;
            }
            if last_tag == Some(StreamTag::Final) {
                return Err(StreamError::DecryptionFailed);
            }

            let (plaintext, tag) =
                C::pull(&mut state, &chunk[..len]).map_err(|_| StreamError::DecryptionFailed)?;
            let plaintext = Zeroizing::new(plaintext);
            output.write_all(&plaintext).map_err(StreamError::WriteError)?;
            written += plaintext.len() as u64;
            chunks += 1;
            last_tag = Some(tag);
        }

        if last_tag != Some(StreamTag::Final) {
            debug!(chunks, "stream ended without a final chunk");
            return Err(StreamError::DecryptionFailed);
        }

        output.flush().map_err(StreamError::WriteError)?;
        debug!(chunks, bytes = written, "stream decrypted");
        Ok(written)
    }
}

impl Default for StreamCodec<SecretStream> {
    fn default() -> Self {
        Self::with_config(&StreamConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_crypto::stream::StreamKey;

    const BUF: usize = 64;

    fn codec() -> StreamCodec {
        StreamCodec::new(BUF)
    }

    fn key() -> StreamKey {
        StreamKey::new([0x21u8; 32])
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn seal(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let written = codec().encrypt(&key(), data, &mut out).unwrap();
        assert_eq!(written, out.len() as u64);
        out
    }

    fn open(data: &[u8]) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::new();
        codec().decrypt(&key(), data, &mut out).map(|n| {
            assert_eq!(n, out.len() as u64);
            out
        })
    }

    /// Reader that hands out one byte per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_roundtrip_boundary_sizes() {
        for len in [0, 1, BUF - 1, BUF, BUF + 1, 3 * BUF] {
            let data = payload(len);
            assert_eq!(open(&seal(&data)).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn test_chunk_layout() {
        let header = SecretStream::HEADER_SIZE;
        let overhead = SecretStream::ABYTES;

        assert_eq!(seal(&[]).len(), header + overhead);
        assert_eq!(seal(&payload(BUF)).len(), header + BUF + overhead);
        assert_eq!(
            seal(&payload(2 * BUF + 5)).len(),
            header + 2 * (BUF + overhead) + 5 + overhead
        );
    }

    #[test]
    fn test_short_reads_are_accumulated() {
        let data = payload(2 * BUF + 3);
        let sealed = seal(&data);

        let mut out = Vec::new();
        codec()
            .decrypt(&key(), Trickle(&sealed), &mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_any_flipped_byte_is_rejected() {
        let sealed = seal(&payload(BUF + 10));

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x80;
            match open(&tampered) {
                Err(StreamError::MalformedHeader) => assert!(i < SecretStream::HEADER_SIZE),
                Err(StreamError::DecryptionFailed) => assert!(i >= SecretStream::HEADER_SIZE),
                other => panic!("byte {i}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_truncated_stream_fails() {
        let sealed = seal(&payload(3 * BUF));
        let without_final = &sealed[..sealed.len() - (BUF + SecretStream::ABYTES)];

        assert!(matches!(open(without_final), Err(StreamError::DecryptionFailed)));
        assert!(matches!(
            open(&sealed[..SecretStream::HEADER_SIZE]),
            Err(StreamError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_trailing_data_after_final_fails() {
        let mut sealed = seal(&payload(10));
        sealed.extend_from_slice(&[0u8; 20]);
        assert!(matches!(open(&sealed), Err(StreamError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_key_or_short_header() {
        let sealed = seal(&payload(10));

        let mut out = Vec::new();
        let other = StreamKey::new([0x99u8; 32]);
        assert!(matches!(
            codec().decrypt(&other, sealed.as_slice(), &mut out),
            Err(StreamError::MalformedHeader)
        ));
        assert!(matches!(open(&sealed[..5]), Err(StreamError::MalformedHeader)));
        assert!(matches!(open(&[]), Err(StreamError::MalformedHeader)));
    }

    #[test]
    fn test_io_errors_are_distinguished() {
        let mut out = Vec::new();
        assert!(matches!(
            codec().encrypt(&key(), FailingReader, &mut out),
            Err(StreamError::ReadError(_))
        ));
        assert!(matches!(
            codec().encrypt(&key(), &b"data"[..], FailingWriter),
            Err(StreamError::WriteError(_))
        ));

        let sealed = seal(b"data");
        assert!(matches!(
            codec().decrypt(&key(), sealed.as_slice(), FailingWriter),
            Err(StreamError::WriteError(_))
        ));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_buffer_size_rejected() {
        let _ = StreamCodec::<SecretStream>::new(0);
    }
}
