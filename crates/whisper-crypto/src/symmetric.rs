//! AES-128-CBC bulk encryption with sentinel-byte padding.
//!
//! # Padding
//!
//! Earlier implementations of this protocol had two incompatible padding
//! schemes in play: document fields appended a `|` sentinel before
//! space-padding to a block multiple (reversible), while inline note/message
//! fields space-padded with no sentinel (lossy for plaintexts that
//! legitimately end in spaces). This module implements only the sentinel
//! scheme and uses it everywhere. Ciphertext produced by the space-only
//! scheme will not round-trip through [`sentinel_unpad`] if its plaintext
//! happened to end in spaces; there is no way to recover that information
//! after the fact, so no compatibility shim is provided.
//!
//! # Security
//!
//! AES-CBC alone provides confidentiality but no integrity: a corrupted or
//! actively modified ciphertext decrypts to garbage rather than failing
//! loudly, and bit-flipping attacks against known plaintext are possible.
//! This matches the wire format of the system being reimplemented; upgrading
//! to an AEAD would break compatibility with existing encrypted notes and
//! messages, so it is left as a follow-up rather than done silently here.

use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// AES block size in bytes, and therefore also the content-key and IV
/// length used throughout this crate.
pub const CONTENT_KEY_LEN: usize = 16;

const SENTINEL: u8 = b'|';
const PAD_BYTE: u8 = b' ';

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// A symmetric content key. Zeroized on drop so key material does not
/// linger in memory past its owner's lifetime.
pub struct ContentKey([u8; CONTENT_KEY_LEN]);

impl ContentKey {
    /// The raw key bytes, for key-wrap and AES operations.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_LEN] {
        &self.0
    }

    /// Build a content key from bytes recovered via RSA unwrap, zeroizing
    /// the intermediate buffer once its contents are copied out.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if `bytes` is not exactly
    /// [`CONTENT_KEY_LEN`] bytes long.
    pub fn from_unwrapped(mut bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != CONTENT_KEY_LEN {
            bytes.zeroize();
            return Err(CryptoError::InvalidKey("unwrapped content key has wrong length".into()));
        }
        let mut key = [0u8; CONTENT_KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }
}

// Zeroize key material on drop.
impl Drop for ContentKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Generate a fresh random content key.
///
/// A content key is used to encrypt exactly one object (a note, a message,
/// or a field-wise document) and is never reused.
#[must_use]
pub fn random_content_key() -> ContentKey {
    let mut key = [0u8; CONTENT_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    ContentKey(key)
}

/// Append a `|` sentinel and space-pad to a block multiple.
#[must_use]
pub fn sentinel_pad(plaintext: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(plaintext.len() + CONTENT_KEY_LEN);
    padded.extend_from_slice(plaintext);
    padded.push(SENTINEL);
    let remainder = padded.len() % CONTENT_KEY_LEN;
    if remainder != 0 {
        padded.resize(padded.len() + (CONTENT_KEY_LEN - remainder), PAD_BYTE);
    }
    padded
}

/// Strip sentinel padding applied by [`sentinel_pad`].
///
/// # Errors
///
/// Returns [`CryptoError::MalformedPadding`] if no sentinel byte is found,
/// which indicates the plaintext was padded with the older space-only
/// scheme or the ciphertext is corrupt.
pub fn sentinel_unpad(padded: &[u8]) -> Result<Vec<u8>, CryptoError> {
    for i in (0..padded.len()).rev() {
        if padded[i] == SENTINEL {
            return Ok(padded[..i].to_vec());
        }
    }
    Err(CryptoError::MalformedPadding)
}

/// Encrypt `plaintext` under `key`, returning `IV || ciphertext`.
///
/// A fresh random IV is sampled for every call; the same content key may
/// therefore be used to encrypt more than one field of the same document
/// without IV reuse.
#[must_use]
pub fn sym_encrypt(key: &ContentKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; CONTENT_KEY_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut buf = sentinel_pad(plaintext);
    let len = buf.len();
    // The buffer is already block-aligned by sentinel_pad, so NoPadding
    // never needs extra room.
    let encryptor = Aes128CbcEnc::new(key.as_bytes().into(), &iv.into());
    encryptor
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .expect("sentinel_pad always produces a block-aligned buffer");

    let mut out = Vec::with_capacity(CONTENT_KEY_LEN + buf.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&buf);
    out
}

/// Decrypt a blob produced by [`sym_encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if `blob` is shorter than one
/// block, or [`CryptoError::MalformedPadding`] if the decrypted plaintext
/// has no sentinel byte.
pub fn sym_decrypt(key: &ContentKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < CONTENT_KEY_LEN || (blob.len() - CONTENT_KEY_LEN) % CONTENT_KEY_LEN != 0 {
        return Err(CryptoError::CiphertextTooShort);
    }
    let (iv, ciphertext) = blob.split_at(CONTENT_KEY_LEN);
    let mut buf = ciphertext.to_vec();

    let iv_array: [u8; CONTENT_KEY_LEN] =
        iv.try_into().expect("split_at(CONTENT_KEY_LEN) guarantees this length");
    let decryptor = Aes128CbcDec::new(key.as_bytes().into(), &iv_array.into());
    decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| CryptoError::CiphertextTooShort)?;

    sentinel_unpad(&buf)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trip_empty() {
        let key = random_content_key();
        let ct = sym_encrypt(&key, b"");
        assert_eq!(sym_decrypt(&key, &ct).unwrap(), b"");
    }

    #[test]
    fn round_trip_trailing_spaces() {
        // this is exactly the case the old space-only padding lost.
        let key = random_content_key();
        let plaintext = b"hello   ".to_vec();
        let ct = sym_encrypt(&key, &plaintext);
        assert_eq!(sym_decrypt(&key, &ct).unwrap(), plaintext);
    }

    #[test]
    fn fresh_iv_each_call() {
        let key = random_content_key();
        let a = sym_encrypt(&key, b"same plaintext");
        let b = sym_encrypt(&key, b"same plaintext");
        assert_ne!(a, b, "IV reuse would make identical plaintexts produce identical ciphertext");
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = random_content_key();
            let ct = sym_encrypt(&key, &plaintext);
            prop_assert_eq!(sym_decrypt(&key, &ct).unwrap(), plaintext);
        }
    }
}
