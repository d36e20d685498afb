//! Object encryption
//!
//! Each object is encrypted with its own random 32-byte key before it is
//! slabbed. The cipher is XChaCha20 under that key with an all-zero nonce
//! (a key encrypts exactly one object). The stream cipher is seekable, so a
//! ranged download can decrypt its bytes without fetching the object prefix.

use crate::error::{RenterError, Result};
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::{Key, XChaCha20, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Largest object the keystream covers (one 32-bit block counter of 64-byte
/// blocks)
pub const MAX_OBJECT_SIZE: u64 = u32::MAX as u64 * 64;

/// Per-object encryption key
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random encryption key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// XOR `data` in place with the keystream starting at object `offset`
    ///
    /// Encryption and decryption are the same operation. Fails if the
    /// range runs past [`MAX_OBJECT_SIZE`].
    pub fn apply_keystream(&self, data: &mut [u8], offset: u64) -> Result<()> {
        Keystream::new(self, offset)?.apply(data)?;
        Ok(())
    }

    /// Wrap a reader so that everything read from it is encrypted
    ///
    /// Reading past [`MAX_OBJECT_SIZE`] bytes is an I/O error.
    pub fn encrypt<R: AsyncRead + Unpin>(&self, reader: R) -> CipherReader<R> {
        CipherReader {
            inner: reader,
            keystream: Keystream::start(self),
        }
    }

    /// Wrap a writer so that everything written to it is decrypted, the first
    /// byte written being byte `offset` of the object
    pub fn decrypt<W: AsyncWrite + Unpin>(&self, writer: W, offset: u64) -> Result<CipherWriter<W>> {
        Ok(CipherWriter {
            inner: writer,
            keystream: Keystream::new(self, offset)?,
            pending: Vec::new(),
            written: 0,
        })
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

impl fmt::Display for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", hex::encode(self.0))
    }
}

impl FromStr for EncryptionKey {
    type Err = RenterError;

    fn from_str(s: &str) -> Result<Self> {
        let hex_str = s.strip_prefix("key:").unwrap_or(s);
        let mut key = [0u8; KEY_SIZE];
        hex::decode_to_slice(hex_str, &mut key)
            .map_err(|e| RenterError::Serialization(format!("invalid encryption key: {}", e)))?;
        Ok(Self(key))
    }
}

impl Serialize for EncryptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EncryptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Seekable keystream
struct Keystream(XChaCha20);

impl Keystream {
    fn start(key: &EncryptionKey) -> Self {
        Self(XChaCha20::new(Key::from_slice(&key.0), &XNonce::default()))
    }

    fn new(key: &EncryptionKey, offset: u64) -> Result<Self> {
        let out_of_range = || RenterError::RangeOutOfBounds {
            offset,
            length: 0,
            size: MAX_OBJECT_SIZE,
        };
        if offset > MAX_OBJECT_SIZE {
            return Err(out_of_range());
        }
        let mut keystream = Self::start(key);
        keystream.0.try_seek(offset).map_err(|_| out_of_range())?;
        Ok(keystream)
    }

    fn apply(&mut self, data: &mut [u8]) -> io::Result<()> {
        self.0.try_apply_keystream(data).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("object larger than {} bytes", MAX_OBJECT_SIZE),
            )
        })
    }
}

/// Reader adapter returned by [`EncryptionKey::encrypt`]
pub struct CipherReader<R> {
    inner: R,
    keystream: Keystream,
}

impl<R: AsyncRead + Unpin> AsyncRead for CipherReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let start = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        Poll::Ready(this.keystream.apply(&mut buf.filled_mut()[start..]))
    }
}

/// Writer adapter returned by [`EncryptionKey::decrypt`]
///
/// Deciphered bytes are staged until the inner writer accepts them, so the
/// keystream position always matches the bytes handed to the adapter.
pub struct CipherWriter<W> {
    inner: W,
    keystream: Keystream,
    pending: Vec<u8>,
    written: usize,
}

impl<W> CipherWriter<W> {
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> CipherWriter<W> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.written < self.pending.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.written..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.written += n;
        }
        self.pending.clear();
        self.written = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CipherWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        ready!(this.poll_drain(cx))?;

        let start = this.pending.len();
        this.pending.extend_from_slice(buf);
        if let Err(e) = this.keystream.apply(&mut this.pending[start..]) {
            this.pending.truncate(start);
            return Poll::Ready(Err(e));
        }
        // the bytes are accepted; any remainder drains on the next call
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_key_generation() {
        let k1 = EncryptionKey::generate();
        let k2 = EncryptionKey::generate();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_key_roundtrip() {
        let key = EncryptionKey::generate();
        let s = key.to_string();
        assert!(s.starts_with("key:"));
        assert_eq!(s.parse::<EncryptionKey>().unwrap(), key);

        let json = serde_json::to_string(&key).unwrap();
        let back: EncryptionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        assert!("key:1234".parse::<EncryptionKey>().is_err());
        assert_eq!(format!("{:?}", key), "EncryptionKey([REDACTED])");
    }

    #[test]
    fn test_keystream_is_seekable() {
        let key = EncryptionKey::generate();
        let plaintext: Vec<u8> = (0..5000).map(|i| (i % 256) as u8).collect();

        let mut whole = plaintext.clone();
        key.apply_keystream(&mut whole, 0).unwrap();
        assert_ne!(whole, plaintext);

        let mut tail = plaintext[1234..].to_vec();
        key.apply_keystream(&mut tail, 1234).unwrap();
        assert_eq!(tail, whole[1234..]);

        key.apply_keystream(&mut whole, 0).unwrap();
        assert_eq!(whole, plaintext);
    }

    #[tokio::test]
    async fn test_encrypt_reader_decrypt_writer() {
        let key = EncryptionKey::generate();
        let plaintext: Vec<u8> = (0..10_000).map(|i| (i * 7 % 256) as u8).collect();

        let mut ciphertext = Vec::new();
        key.encrypt(plaintext.as_slice())
            .read_to_end(&mut ciphertext)
            .await
            .unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        assert_ne!(ciphertext, plaintext);

        let mut writer = key.decrypt(Vec::new(), 0).unwrap();
        writer.write_all(&ciphertext).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.into_inner(), plaintext);
    }

    #[tokio::test]
    async fn test_decrypt_from_offset() {
        let key = EncryptionKey::generate();
        let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut ciphertext = plaintext.clone();
        key.apply_keystream(&mut ciphertext, 0).unwrap();

        let mut writer = key.decrypt(Vec::new(), 10).unwrap();
        for chunk in ciphertext[10..25].chunks(4) {
            writer.write_all(chunk).await.unwrap();
        }
        writer.shutdown().await.unwrap();
        assert_eq!(writer.into_inner(), plaintext[10..25]);
    }

    #[test]
    fn test_keystream_is_bounded() {
        let key = EncryptionKey::generate();

        let mut near_end = [0u8; 16];
        key.apply_keystream(&mut near_end, MAX_OBJECT_SIZE / 2).unwrap();

        let mut past = [0u8; 16];
        assert!(key.apply_keystream(&mut past, MAX_OBJECT_SIZE + 1).is_err());
        assert!(matches!(
            key.decrypt(Vec::new(), 1 << 40),
            Err(RenterError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_keys_give_distinct_keystreams() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        EncryptionKey::from_bytes([1; 32]).apply_keystream(&mut a, 0).unwrap();
        EncryptionKey::from_bytes([2; 32]).apply_keystream(&mut b, 0).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, [0u8; 32]);
    }
}
