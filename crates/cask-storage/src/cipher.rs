//! AES-256-GCM envelope for the credential file.
//!
//! Layout: `nonce (12 bytes) || ciphertext + tag (16 bytes)`. No header or
//! version; a fresh random nonce is drawn for every seal.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use cask_core::StoreError;

use crate::key_provider::KeyMaterial;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub fn build_cipher(material: &KeyMaterial) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&material.bytes))
}

/// Encrypt `plaintext` and prepend the nonce.
pub fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| StoreError::EncryptionFailed {
            reason: e.to_string(),
        })?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Split off the nonce, authenticate and decrypt.
pub fn unseal(cipher: &Aes256Gcm, data: &[u8]) -> Result<Vec<u8>, StoreError> {
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(StoreError::DecryptionFailed {
            reason: format!(
                "ciphertext is {} bytes, shorter than nonce and tag",
                data.len()
            ),
        });
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| StoreError::DecryptionFailed {
            reason: "authentication failed (wrong key or tampered data)".to_string(),
        })
}
