//! RSA key-wrap (PKCS#1 v1.5) for per-object content keys.

use rand::rngs::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::CryptoError;

/// Encrypt a content key under a recipient's public key.
///
/// # Errors
///
/// Returns [`CryptoError::KeyWrap`] if the content key is too large for the
/// recipient's modulus (never the case for our fixed 16-byte content keys
/// at any supported key size) or the underlying RSA operation fails.
pub fn wrap_key(public_key: &RsaPublicKey, content_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, content_key)
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))
}

/// Decrypt a content key that was wrapped with [`wrap_key`].
///
/// # Errors
///
/// Returns [`CryptoError::KeyUnwrap`] if `ciphertext` was not produced for
/// this private key, is malformed, or padding validation fails.
pub fn unwrap_key(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    private_key
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|e| CryptoError::KeyUnwrap(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use crate::symmetric::random_content_key;

    #[test]
    fn round_trip() {
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();
        let content_key = random_content_key();

        let wrapped = wrap_key(&public, content_key.as_bytes()).unwrap();
        let unwrapped = unwrap_key(&private, &wrapped).unwrap();
        assert_eq!(unwrapped, content_key.as_bytes().to_vec());
    }

    #[test]
    fn wrong_key_fails() {
        let alice = generate_keypair(512).unwrap();
        let bob = generate_keypair(512).unwrap();
        let content_key = random_content_key();

        let wrapped = wrap_key(&alice.to_public_key(), content_key.as_bytes()).unwrap();
        assert!(unwrap_key(&bob, &wrapped).is_err());
    }
}
