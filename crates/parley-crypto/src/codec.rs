use aes::Aes256;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

use crate::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Encrypt a plaintext message under a room key.
///
/// A fresh random IV is drawn on every call — reusing an IV under the same
/// key leaks plaintext relationships, so the IV is never a parameter.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &str) -> String {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    BASE64.encode(blob)
}

/// Decrypt a `base64(IV || ct)` blob back to text.
pub fn decrypt(key: &[u8; KEY_LEN], blob: &str) -> Result<String, CryptoError> {
    let raw = BASE64.decode(blob).map_err(|_| CryptoError::Encoding)?;
    if raw.len() <= IV_LEN || (raw.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(CryptoError::Malformed);
    }

    let (iv, ciphertext) = raw.split_at(IV_LEN);
    let plaintext = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::KeyLength)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Padding)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_room_key;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_room_key();
        let message = "hello from parley";

        let blob = encrypt(&key, message);
        assert_ne!(blob, message);
        assert_eq!(decrypt(&key, &blob).unwrap(), message);
    }

    #[test]
    fn fresh_iv_per_call() {
        let key = generate_room_key();
        let message = "same plaintext twice";

        let first = encrypt(&key, message);
        let second = encrypt(&key, message);
        assert_ne!(first, second);
        assert_eq!(decrypt(&key, &first).unwrap(), message);
        assert_eq!(decrypt(&key, &second).unwrap(), message);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = generate_room_key();
        let blob = encrypt(&key, "");
        assert_eq!(decrypt(&key, &blob).unwrap(), "");
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let key1 = generate_room_key();
        let key2 = generate_room_key();
        let message = "secret message with enough length to matter";

        let blob = encrypt(&key1, message);
        // CBC is unauthenticated: a wrong key yields either a codec error or
        // garbage, never the original text.
        match decrypt(&key2, &blob) {
            Ok(recovered) => assert_ne!(recovered, message),
            Err(_) => {}
        }
    }

    #[test]
    fn malformed_base64_rejected() {
        let key = generate_room_key();
        assert!(matches!(
            decrypt(&key, "%%% not base64 %%%"),
            Err(CryptoError::Encoding)
        ));
    }

    #[test]
    fn truncated_blob_rejected() {
        let key = generate_room_key();
        let short = BASE64.encode([0u8; 10]);
        assert!(matches!(decrypt(&key, &short), Err(CryptoError::Malformed)));

        // IV present but no ciphertext blocks at all.
        let iv_only = BASE64.encode([0u8; IV_LEN]);
        assert!(matches!(
            decrypt(&key, &iv_only),
            Err(CryptoError::Malformed)
        ));
    }

    #[test]
    fn unaligned_ciphertext_rejected() {
        let key = generate_room_key();
        let ragged = BASE64.encode([0u8; IV_LEN + 21]);
        assert!(matches!(decrypt(&key, &ragged), Err(CryptoError::Malformed)));
    }
}
