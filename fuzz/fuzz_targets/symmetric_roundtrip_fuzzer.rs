//! Fuzz target for the AES-CBC symmetric layer.
//!
//! # Invariants
//!
//! - `sym_decrypt` never panics on arbitrary bytes, regardless of length.
//! - `sym_decrypt(key, sym_encrypt(key, plaintext))` always recovers the
//!   original plaintext exactly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use whisper_crypto::CONTENT_KEY_LEN;
use whisper_crypto::symmetric::{ContentKey, sym_decrypt, sym_encrypt};

fuzz_target!(|input: ([u8; CONTENT_KEY_LEN], Vec<u8>, Vec<u8>)| {
    let (key_bytes, plaintext, junk) = input;
    let key = ContentKey::from_unwrapped(key_bytes.to_vec()).expect("exact-length key always valid");

    // Arbitrary bytes must never panic the decoder.
    let _ = sym_decrypt(&key, &junk);

    let ciphertext = sym_encrypt(&key, &plaintext);
    let recovered = sym_decrypt(&key, &ciphertext).expect("self-encrypted ciphertext must decrypt");
    assert_eq!(recovered, plaintext);
});
