//! RSA key generation and the on-wire / on-disk key representations.
//!
//! Key *loading from disk* is out of scope for this crate: these types only
//! know how to convert between [`rsa`] key types and the plain-JSON shapes
//! that cross the wire or sit in a key file. The CLI binary owns the actual
//! file I/O.

use rand::rngs::OsRng;
use rsa::BigUint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Default RSA modulus size used by `generate`.
///
/// 4096 bits is the default for the `generate` subcommand, but programmatic
/// key generation accepts any size `>= 2048`.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Minimum RSA modulus size accepted for production use.
pub const MIN_KEY_BITS: usize = 2048;

/// A public key as it appears on the wire (directory lookups, auth binding)
/// and in a standalone public-key file.
///
/// Both the modulus and exponent are carried as base-10 strings: a 2048+ bit
/// modulus does not fit in any JSON-native number type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// RSA modulus, base-10.
    pub n: String,
    /// RSA public exponent, base-10.
    pub e: String,
}

/// A private key as it appears in a key file (`whisper generate`,
/// `whisper_key` by default).
///
/// Mirrors the field set called out in the external-interfaces section:
/// modulus, exponent, private exponent, and the prime factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    /// RSA modulus, base-10.
    pub n: String,
    /// RSA public exponent, base-10.
    pub e: String,
    /// RSA private exponent, base-10.
    pub d: String,
    /// Prime factors of the modulus, base-10.
    pub primes: Vec<String>,
}

impl PublicKeyInfo {
    /// Two public keys are "the same key" for auth-binding purposes iff
    /// both the modulus and exponent match.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.n == other.n && self.e == other.e
    }
}

impl From<&rsa::RsaPublicKey> for PublicKeyInfo {
    fn from(key: &rsa::RsaPublicKey) -> Self {
        Self { n: key.n().to_str_radix(10), e: key.e().to_str_radix(10) }
    }
}

impl TryFrom<&PublicKeyInfo> for rsa::RsaPublicKey {
    type Error = CryptoError;

    fn try_from(info: &PublicKeyInfo) -> Result<Self, Self::Error> {
        let n = BigUint::parse_bytes(info.n.as_bytes(), 10)
            .ok_or_else(|| CryptoError::InvalidKey("modulus is not a base-10 integer".into()))?;
        let e = BigUint::parse_bytes(info.e.as_bytes(), 10)
            .ok_or_else(|| CryptoError::InvalidKey("exponent is not a base-10 integer".into()))?;
        rsa::RsaPublicKey::new(n, e).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl From<&rsa::RsaPrivateKey> for KeyFile {
    fn from(key: &rsa::RsaPrivateKey) -> Self {
        let primes = key.primes().iter().map(|p| p.to_str_radix(10)).collect();
        Self {
            n: key.n().to_str_radix(10),
            e: key.e().to_str_radix(10),
            d: key.d().to_str_radix(10),
            primes,
        }
    }
}

impl TryFrom<&KeyFile> for rsa::RsaPrivateKey {
    type Error = CryptoError;

    fn try_from(file: &KeyFile) -> Result<Self, Self::Error> {
        let parse = |s: &str, what: &str| {
            BigUint::parse_bytes(s.as_bytes(), 10)
                .ok_or_else(|| CryptoError::InvalidKey(format!("{what} is not a base-10 integer")))
        };
        let n = parse(&file.n, "modulus")?;
        let e = parse(&file.e, "exponent")?;
        let d = parse(&file.d, "private exponent")?;
        let primes =
            file.primes.iter().map(|p| parse(p, "prime factor")).collect::<Result<Vec<_>, _>>()?;
        rsa::RsaPrivateKey::from_components(n, e, d, primes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl KeyFile {
    /// Public half of this key file, for `get-public`.
    pub fn public(&self) -> Result<PublicKeyInfo, CryptoError> {
        let private = rsa::RsaPrivateKey::try_from(self)?;
        Ok(PublicKeyInfo::from(&private.to_public_key()))
    }
}

/// Generate a fresh RSA keypair.
///
/// # Errors
///
/// Returns [`CryptoError::KeyGen`] if `bits` is too small for the
/// underlying RSA implementation to find suitable primes, or on any other
/// RNG/primality failure.
pub fn generate_keypair(bits: usize) -> Result<rsa::RsaPrivateKey, CryptoError> {
    rsa::RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| CryptoError::KeyGen(e.to_string()))
}
