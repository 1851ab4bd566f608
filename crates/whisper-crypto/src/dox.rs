//! Field-wise document encryption.
//!
//! A document is a flat set of named fields, each independently classified:
//!
//! - [`FieldTag::Plaintext`] — copied into the encrypted document as-is.
//! - [`FieldTag::Aes`] — encrypted under the document's content key and
//!   stored inline. Only strings and byte sequences may be tagged `aes`.
//! - [`FieldTag::Blob`] — swept into a single JSON object, encrypted once,
//!   and stored as the document's `blob`.
//!
//! Because Rust has no runtime struct-tag reflection, callers supply an
//! explicit descriptor (field name + tag) both when encrypting and when
//! decrypting, rather than inferring field shape from a target type.

use std::collections::BTreeMap;

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bytes::B64Bytes;
use crate::error::CryptoError;
use crate::keywrap::{unwrap_key, wrap_key};
use crate::symmetric::{ContentKey, random_content_key, sym_decrypt, sym_encrypt};

/// How a single field of a document should be handled during encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    /// Copied into the document verbatim; visible to anyone who can read
    /// the stored record (used for server-routable fields like a message's
    /// recipient nickname).
    Plaintext,
    /// Encrypted under the document's content key and stored inline.
    Aes,
    /// Swept into the document's single encrypted blob.
    Blob,
}

/// The value of a single field, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A UTF-8 string.
    Text(String),
    /// An arbitrary byte sequence.
    Bytes(Vec<u8>),
    /// An arbitrary JSON value; only valid for [`FieldTag::Plaintext`] and
    /// [`FieldTag::Blob`] fields.
    Json(Value),
}

/// One field of a document to encrypt: its name, how it should be handled,
/// and its value.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name, used as the map key on both sides of the wire.
    pub name: String,
    /// How this field should be encrypted (or not).
    pub tag: FieldTag,
    /// The field's plaintext value.
    pub value: FieldValue,
}

impl Field {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: FieldTag, value: FieldValue) -> Self {
        Self { name: name.into(), tag, value }
    }
}

/// An encrypted, field-wise document as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDoc {
    /// Content key, encrypted under the recipient's public key.
    pub key: B64Bytes,
    /// Plaintext and aes-encrypted fields, keyed by name.
    pub fields: BTreeMap<String, Value>,
    /// Encrypted blob of fields that were not individually classified, if
    /// any such fields existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<B64Bytes>,
}

/// Encrypt a document.
///
/// Generates a fresh content key, wraps it under `public_key`, and encrypts
/// or copies each field per its [`FieldTag`].
///
/// # Errors
///
/// Returns [`CryptoError::UnsupportedFieldType`] if a field tagged `aes`
/// carries a [`FieldValue::Json`] value (only text and bytes may be
/// aes-encrypted), and propagates key-wrap or serialization failures.
pub fn encrypt_document(
    public_key: &RsaPublicKey,
    fields: &[Field],
) -> Result<EncryptedDoc, CryptoError> {
    let content_key = random_content_key();
    let wrapped = wrap_key(public_key, content_key.as_bytes())?;

    let mut out_fields = BTreeMap::new();
    let mut blob_values = BTreeMap::new();

    for field in fields {
        match field.tag {
            FieldTag::Plaintext => {
                out_fields.insert(field.name.clone(), field_to_json(&field.value));
            },
            FieldTag::Aes => {
                let plaintext = aes_field_bytes(field)?;
                let ciphertext = sym_encrypt(&content_key, &plaintext);
                out_fields
                    .insert(field.name.clone(), serde_json::to_value(B64Bytes(ciphertext))?);
            },
            FieldTag::Blob => {
                blob_values.insert(field.name.clone(), field_to_json(&field.value));
            },
        }
    }

    let blob = if blob_values.is_empty() {
        None
    } else {
        let serialized = serde_json::to_vec(&blob_values)?;
        Some(B64Bytes(sym_encrypt(&content_key, &serialized)))
    };

    Ok(EncryptedDoc { key: B64Bytes(wrapped), fields: out_fields, blob })
}

/// Decrypt a document produced by [`encrypt_document`].
///
/// `descriptor` must list every field that was originally encrypted, with
/// the same tag used at encryption time.
///
/// # Errors
///
/// Returns [`CryptoError::MissingField`] if a descriptor names a field
/// absent from `doc` (or from its blob), [`CryptoError::UnknownFieldTag`]
/// for a tag this document has no storage for, and propagates key-unwrap,
/// symmetric-decryption, or deserialization failures.
pub fn decrypt_document(
    private_key: &RsaPrivateKey,
    doc: &EncryptedDoc,
    descriptor: &[(&str, FieldTag)],
) -> Result<Vec<Field>, CryptoError> {
    let content_key = ContentKey::from_unwrapped(unwrap_key(private_key, &doc.key.0)?)?;

    let blob_values: BTreeMap<String, Value> = match &doc.blob {
        Some(ciphertext) => {
            let plaintext = sym_decrypt(&content_key, &ciphertext.0)?;
            serde_json::from_slice(&plaintext)?
        },
        None => BTreeMap::new(),
    };

    let mut out = Vec::with_capacity(descriptor.len());
    for &(name, tag) in descriptor {
        let value = match tag {
            FieldTag::Plaintext => {
                let json = doc
                    .fields
                    .get(name)
                    .ok_or_else(|| CryptoError::MissingField(name.to_string()))?;
                FieldValue::Json(json.clone())
            },
            FieldTag::Aes => {
                let json = doc
                    .fields
                    .get(name)
                    .ok_or_else(|| CryptoError::MissingField(name.to_string()))?;
                let ciphertext: B64Bytes = serde_json::from_value(json.clone())?;
                let plaintext = sym_decrypt(&content_key, &ciphertext.0)?;
                FieldValue::Bytes(plaintext)
            },
            FieldTag::Blob => {
                let json = blob_values
                    .get(name)
                    .ok_or_else(|| CryptoError::MissingField(name.to_string()))?;
                FieldValue::Json(json.clone())
            },
        };
        out.push(Field::new(name, tag, value));
    }

    Ok(out)
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Bytes(b) => {
            serde_json::to_value(B64Bytes(b.clone())).expect("B64Bytes always serializes")
        },
        FieldValue::Json(v) => v.clone(),
    }
}

fn aes_field_bytes(field: &Field) -> Result<Vec<u8>, CryptoError> {
    match &field.value {
        FieldValue::Text(s) => Ok(s.clone().into_bytes()),
        FieldValue::Bytes(b) => Ok(b.clone()),
        FieldValue::Json(_) => Err(CryptoError::UnsupportedFieldType(field.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::keys::generate_keypair;

    fn text_field(name: &str, tag: FieldTag, value: &str) -> Field {
        Field::new(name, tag, FieldValue::Text(value.to_string()))
    }

    #[test]
    fn round_trip_plaintext_and_aes() {
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();

        let fields =
            vec![text_field("to", FieldTag::Plaintext, "bob"), text_field("text", FieldTag::Aes, "hello")];

        let doc = encrypt_document(&public, &fields).unwrap();
        assert!(doc.blob.is_none());

        let descriptor = [("to", FieldTag::Plaintext), ("text", FieldTag::Aes)];
        let decrypted = decrypt_document(&private, &doc, &descriptor).unwrap();

        assert_eq!(decrypted[0].value, FieldValue::Json(Value::String("bob".into())));
        assert_eq!(decrypted[1].value, FieldValue::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn round_trip_with_blob() {
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();

        let fields = vec![
            Field::new("count", FieldTag::Blob, FieldValue::Json(Value::from(3))),
            text_field("title", FieldTag::Aes, "groceries"),
        ];

        let doc = encrypt_document(&public, &fields).unwrap();
        assert!(doc.blob.is_some());

        let descriptor = [("count", FieldTag::Blob), ("title", FieldTag::Aes)];
        let decrypted = decrypt_document(&private, &doc, &descriptor).unwrap();
        assert_eq!(decrypted[0].value, FieldValue::Json(Value::from(3)));
        assert_eq!(decrypted[1].value, FieldValue::Bytes(b"groceries".to_vec()));
    }

    #[test]
    fn aes_field_rejects_arbitrary_json() {
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();
        let fields = vec![Field::new("n", FieldTag::Aes, FieldValue::Json(Value::from(1)))];
        assert!(matches!(
            encrypt_document(&public, &fields),
            Err(CryptoError::UnsupportedFieldType(_))
        ));
    }

    #[test]
    fn missing_field_in_descriptor_errors() {
        let private = generate_keypair(512).unwrap();
        let public = private.to_public_key();
        let doc = encrypt_document(&public, &[]).unwrap();
        let descriptor = [("ghost", FieldTag::Aes)];
        assert!(matches!(
            decrypt_document(&private, &doc, &descriptor),
            Err(CryptoError::MissingField(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(title in "[a-zA-Z0-9 ]{0,32}", body in proptest::collection::vec(any::<u8>(), 0..64)) {
            let private = generate_keypair(512).unwrap();
            let public = private.to_public_key();

            let fields = vec![
                Field::new("title", FieldTag::Aes, FieldValue::Text(title.clone())),
                Field::new("body", FieldTag::Aes, FieldValue::Bytes(body.clone())),
            ];
            let doc = encrypt_document(&public, &fields).unwrap();
            let descriptor = [("title", FieldTag::Aes), ("body", FieldTag::Aes)];
            let decrypted = decrypt_document(&private, &doc, &descriptor).unwrap();

            prop_assert_eq!(&decrypted[0].value, &FieldValue::Bytes(title.into_bytes()));
            prop_assert_eq!(&decrypted[1].value, &FieldValue::Bytes(body));
        }
    }
}
