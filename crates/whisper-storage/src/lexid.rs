//! Lexicographic integer codec.
//!
//! Encodes a `u64` to a string such that byte-lexicographic ordering of the
//! encodings matches numeric ordering of the integers, so that a plain
//! ordered key-value store's natural iteration order is also numeric order.
//!
//! # Scheme
//!
//! A decimal integer's byte-lexicographic order only matches its numeric
//! order when every encoding has the same digit count (`"9" > "10"` as
//! strings, even though `9 < 10`). We fix this with a length prefix, split
//! into two bands so the length prefix itself stays order-preserving:
//!
//! - digit counts 1-9 ("short"): `'-'` + one digit-count character + digits.
//! - digit counts 10-20 ("long", the rest of `u64`'s range):
//!   `'='` + two-digit zero-padded digit-count + digits.
//!
//! `'-'` (0x2D) sorts before any ASCII digit (0x30-0x39), so within a band
//! the digit-count character orders shorter-digit-count before
//! longer-digit-count. `'='` (0x3D) sorts after every digit, so the whole
//! long band sorts after the whole short band — correct, since any 10+
//! digit number is larger than any 1-9 digit number.

use thiserror::Error;

const SHORT_MARKER: u8 = b'-';
const LONG_MARKER: u8 = b'=';
const SHORT_MAX_DIGITS: usize = 9;

/// Errors decoding a lex-id string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexIdError {
    /// The string was empty or shorter than its marker + length prefix.
    #[error("lex-id too short: {0:?}")]
    TooShort(String),

    /// The first byte was neither the short nor the long marker.
    #[error("lex-id has unknown marker byte: {0:?}")]
    UnknownMarker(String),

    /// The length prefix was not a valid decimal number.
    #[error("lex-id has malformed length prefix: {0:?}")]
    MalformedLength(String),

    /// The declared digit count did not match the number of digit bytes
    /// present, or the digits were not all ASCII decimal digits.
    #[error("lex-id digits do not match declared length: {0:?}")]
    LengthMismatch(String),

    /// The digits, though well-formed, do not fit in a `u64`.
    #[error("lex-id value overflows u64: {0:?}")]
    Overflow(String),
}

/// Encode `n` so that byte-lexicographic order matches numeric order.
#[must_use]
pub fn encode(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    if len <= SHORT_MAX_DIGITS {
        format!("{}{len}{digits}", SHORT_MARKER as char)
    } else {
        format!("{}{len:02}{digits}", LONG_MARKER as char)
    }
}

/// Decode a string produced by [`encode`].
///
/// # Errors
///
/// Returns a [`LexIdError`] variant describing exactly what was malformed;
/// see the variant docs.
pub fn decode(s: &str) -> Result<u64, LexIdError> {
    let bytes = s.as_bytes();
    let marker = *bytes.first().ok_or_else(|| LexIdError::TooShort(s.to_string()))?;

    let len_width = match marker {
        b if b == SHORT_MARKER => 1usize,
        b if b == LONG_MARKER => 2usize,
        _ => return Err(LexIdError::UnknownMarker(s.to_string())),
    };

    // Work on bytes throughout: `s` may contain multibyte chars anywhere
    // after the marker, and a byte-index split on a `&str` panics if it
    // doesn't land on a char boundary. Splitting `&[u8]` never panics.
    let rest = &bytes[1..];
    if rest.len() < len_width {
        return Err(LexIdError::TooShort(s.to_string()));
    }
    let (len_field, digits) = rest.split_at(len_width);
    if !len_field.iter().all(u8::is_ascii_digit) {
        return Err(LexIdError::MalformedLength(s.to_string()));
    }
    // ASCII-verified above, so this is always valid UTF-8.
    let declared_len: usize = std::str::from_utf8(len_field)
        .unwrap_or_default()
        .parse()
        .map_err(|_| LexIdError::MalformedLength(s.to_string()))?;

    if digits.len() != declared_len || !digits.iter().all(u8::is_ascii_digit) {
        return Err(LexIdError::LengthMismatch(s.to_string()));
    }

    let digits_str =
        std::str::from_utf8(digits).map_err(|_| LexIdError::LengthMismatch(s.to_string()))?;
    digits_str.parse::<u64>().map_err(|_| LexIdError::Overflow(s.to_string()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trip_small_values() {
        for n in [0u64, 1, 9, 10, 99, 100, 999_999_999] {
            assert_eq!(decode(&encode(n)).unwrap(), n);
        }
    }

    #[test]
    fn round_trip_large_values() {
        for n in [1_000_000_000u64, u64::MAX, u64::MAX - 1, 10_000_000_000] {
            assert_eq!(decode(&encode(n)).unwrap(), n);
        }
    }

    #[test]
    fn order_crosses_digit_count_boundary() {
        assert!(encode(9) < encode(10));
        assert!(encode(99) < encode(100));
        assert!(encode(999_999_999) < encode(1_000_000_000));
        assert!(encode(u64::MAX - 1) < encode(u64::MAX));
    }

    #[test]
    fn malformed_inputs_error() {
        assert!(decode("").is_err());
        assert!(decode("x12").is_err());
        assert!(decode("-9123").is_err()); // declares 9 digits, has 3
        assert!(decode("-1ab").is_err());
    }

    #[test]
    fn non_ascii_input_errors_instead_of_panicking() {
        assert!(decode("-é").is_err());
        assert!(decode("=é€").is_err());
        assert!(decode("é").is_err());
        assert!(decode("-1é").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(n in any::<u64>()) {
            prop_assert_eq!(decode(&encode(n)).unwrap(), n);
        }

        #[test]
        fn prop_order_preserving(a in any::<u64>(), b in any::<u64>()) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            if lo != hi {
                prop_assert!(encode(lo) < encode(hi));
            }
        }

        #[test]
        fn prop_decode_never_panics_on_arbitrary_strings(s in ".*") {
            let _ = decode(&s);
        }
    }
}
