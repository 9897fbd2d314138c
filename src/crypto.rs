//! Credential codec: authenticated encryption for tenant secrets at rest.
//!
//! SMS provider auth tokens are stored encrypted with AES-256-GCM. The key
//! is derived by hashing the configured secret to a fixed 32 bytes, so
//! operators can supply a secret of any length. Ciphertext is serialized as
//! three colon-separated base64 segments: nonce, authentication tag,
//! encrypted payload.
//!
//! Decrypt is deliberately forgiving. Rows written before encryption was
//! introduced hold plaintext; any input that does not match the 3-segment
//! shape is returned unchanged. A value in the right shape that fails to
//! decrypt (key rotated incompatibly, corrupted tag) is also returned
//! as-is with a warning; callers must tolerate getting the raw stored
//! value back.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric codec for tenant credential fields.
#[derive(Clone)]
pub struct CredentialCodec {
    key: [u8; 32],
}

impl CredentialCodec {
    /// Derive the AES key from an operator-supplied secret of any length.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a plaintext secret. Empty input passes through unchanged.
    ///
    /// A fresh random nonce is used per call, so encrypting the same value
    /// twice yields different ciphertexts.
    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }

        let cipher = match Aes256Gcm::new_from_slice(&self.key) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "failed to initialize cipher, storing value unencrypted");
                return plaintext.to_string();
            }
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = match cipher.encrypt(nonce, plaintext.as_bytes()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "encryption failed, storing value unencrypted");
                return plaintext.to_string();
            }
        };

        // The AEAD output is ciphertext with the tag appended; the stored
        // format keeps them as separate segments.
        let (payload, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        format!(
            "{}:{}:{}",
            general_purpose::STANDARD.encode(nonce_bytes),
            general_purpose::STANDARD.encode(tag),
            general_purpose::STANDARD.encode(payload),
        )
    }

    /// Decrypt a stored secret. Anything that is not a 3-segment base64
    /// value is treated as legacy plaintext and returned unchanged.
    pub fn decrypt(&self, stored: &str) -> String {
        if stored.is_empty() {
            return String::new();
        }

        let segments: Vec<&str> = stored.split(':').collect();
        if segments.len() != 3 {
            return stored.to_string();
        }

        let decoded: Option<Vec<Vec<u8>>> = segments
            .iter()
            .map(|s| general_purpose::STANDARD.decode(s).ok())
            .collect();
        let Some(parts) = decoded else {
            return stored.to_string();
        };
        let (nonce_bytes, tag, payload) = (&parts[0], &parts[1], &parts[2]);
        if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return stored.to_string();
        }

        let cipher = match Aes256Gcm::new_from_slice(&self.key) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "failed to initialize cipher for decryption");
                return stored.to_string();
            }
        };

        let mut sealed = payload.clone();
        sealed.extend_from_slice(tag);

        match cipher.decrypt(Nonce::from_slice(nonce_bytes), sealed.as_slice()) {
            Ok(plain) => String::from_utf8(plain).unwrap_or_else(|_| stored.to_string()),
            Err(_) => {
                tracing::warn!("failed to decrypt stored credential, returning raw value");
                stored.to_string()
            }
        }
    }
}
