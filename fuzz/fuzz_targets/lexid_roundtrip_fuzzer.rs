//! Fuzz target for the lexicographic integer codec.
//!
//! # Invariants
//!
//! - `decode` never panics on arbitrary input strings.
//! - `decode(encode(n)) == n` for every `u64`.
//! - Encodings order the same as the numbers they encode (checked on pairs).

#![no_main]

use libfuzzer_sys::fuzz_target;
use whisper_storage::lexid::{decode, encode};

fuzz_target!(|input: (u64, u64, String)| {
    let (a, b, junk) = input;

    let _ = decode(&junk);

    let encoded_a = encode(a);
    assert_eq!(decode(&encoded_a).unwrap(), a);

    let encoded_b = encode(b);
    match a.cmp(&b) {
        std::cmp::Ordering::Less => assert!(encoded_a < encoded_b),
        std::cmp::Ordering::Greater => assert!(encoded_a > encoded_b),
        std::cmp::Ordering::Equal => assert_eq!(encoded_a, encoded_b),
    }
});
