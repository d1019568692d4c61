// libs/messaging-cell/src/services/codec.rs
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::CodecError;

/// Shown in place of any field that fails to decrypt.
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[unable to decrypt message]";

/// Encrypts message payload fields with one process-wide secret.
///
/// AES-256-GCM with the key derived as SHA-256 of the secret and a fresh
/// random nonce per call. Output is `base64(nonce || ciphertext || tag)`, so
/// the same plaintext never encrypts to the same string twice.
#[derive(Clone)]
pub struct TextCodec {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl TextCodec {
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        if secret.trim().is_empty() {
            return Err(CodecError::MissingSecret);
        }

        let digest: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let unbound = UnboundKey::new(&AES_256_GCM, &digest).map_err(|_| CodecError::Encrypt)?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CodecError> {
        let secret = config
            .message_encryption_secret
            .as_deref()
            .ok_or(CodecError::MissingSecret)?;
        Self::new(secret)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CodecError::Encrypt)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| CodecError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let sealed = general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CodecError::Decrypt)?;
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CodecError::Decrypt);
        }

        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CodecError::Decrypt)?;

        let mut in_out = body.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CodecError::Decrypt)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CodecError::Decrypt)
    }

    /// Read-path decrypt: a bad field becomes the placeholder instead of an
    /// error so one corrupt message cannot hide the rest of a thread.
    pub fn decrypt_or_placeholder(&self, message_id: Uuid, ciphertext: &str) -> String {
        self.decrypt(ciphertext).unwrap_or_else(|e| {
            warn!("Message {} has an undecryptable field: {}", message_id, e);
            UNDECRYPTABLE_PLACEHOLDER.to_string()
        })
    }
}

impl std::fmt::Debug for TextCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trips_text() {
        let codec = TextCodec::new("secret").unwrap();

        for plaintext in ["hello", "", "émoji 🚑 and spaces", "https://x.test/a b.pdf"] {
            let sealed = codec.encrypt(plaintext).unwrap();
            assert_ne!(sealed, plaintext);
            assert_eq!(codec.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn fresh_nonce_each_time() {
        let codec = TextCodec::new("secret").unwrap();
        assert_ne!(codec.encrypt("same").unwrap(), codec.encrypt("same").unwrap());
    }

    #[test]
    fn missing_secret_fails_fast() {
        assert_matches!(TextCodec::new("  "), Err(CodecError::MissingSecret));

        let config = AppConfig::default();
        assert_matches!(TextCodec::from_config(&config), Err(CodecError::MissingSecret));
    }

    #[test]
    fn garbage_and_foreign_ciphertext_are_rejected() {
        let codec = TextCodec::new("secret").unwrap();
        let other = TextCodec::new("other-secret").unwrap();

        assert_matches!(codec.decrypt("not base64!"), Err(CodecError::Decrypt));
        assert_matches!(codec.decrypt("aGVsbG8="), Err(CodecError::Decrypt));
        assert_matches!(codec.decrypt(&other.encrypt("hello").unwrap()), Err(CodecError::Decrypt));
    }

    #[test]
    fn tampering_is_detected() {
        let codec = TextCodec::new("secret").unwrap();
        let mut raw = general_purpose::STANDARD.decode(codec.encrypt("hello").unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        assert_matches!(
            codec.decrypt(&general_purpose::STANDARD.encode(raw)),
            Err(CodecError::Decrypt)
        );
    }

    #[test]
    fn placeholder_on_read_path() {
        let codec = TextCodec::new("secret").unwrap();
        assert_eq!(codec.decrypt_or_placeholder(Uuid::new_v4(), "%%%"), UNDECRYPTABLE_PLACEHOLDER);
    }
}
