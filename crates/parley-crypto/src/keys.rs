use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

use crate::CryptoError;
use crate::codec::KEY_LEN;

/// Generate a random 256-bit room key.
pub fn generate_room_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Encode a key to base64 for storage and the key endpoint.
pub fn key_to_base64(key: &[u8; KEY_LEN]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key, enforcing the fixed length.
pub fn key_from_base64(encoded: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    let bytes = BASE64.decode(encoded).map_err(|_| CryptoError::Encoding)?;
    bytes.try_into().map_err(|_| CryptoError::KeyLength)
}
