//! Parley crypto library.
//!
//! Shared symmetric-key encryption for room messages: AES-256-CBC with
//! PKCS7 padding, a fresh random IV per message, and `base64(IV || ct)`
//! as the single boundary representation. Every member of a room holds
//! the same key; the relay stores ciphertext only.

pub mod codec;
pub mod keys;

use thiserror::Error;

/// Failures of the symmetric codec. Callers on the message path substitute
/// a sentinel value and keep the connection alive rather than propagating
/// these to the client.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed base64 payload")]
    Encoding,
    #[error("key must be {} bytes", codec::KEY_LEN)]
    KeyLength,
    #[error("ciphertext too short or not block-aligned")]
    Malformed,
    #[error("bad padding after decryption")]
    Padding,
    #[error("decrypted bytes are not valid UTF-8")]
    Utf8,
}
