// Credential encryption at rest: ChaCha20-Poly1305 under a key derived from configured material.
// Stored form is base64(nonce || ciphertext).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    Encrypt,

    #[error("stored secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("stored secret is too short")]
    Truncated,

    #[error("decryption failed (wrong key or tampered secret)")]
    Decrypt,

    #[error("decrypted secret is not valid UTF-8")]
    Utf8,
}

pub struct CredentialCipher {
    cipher: ChaCha20Poly1305,
}

impl CredentialCipher {
    /// Key = SHA-256(salt || password). Both come from configuration, never the environment.
    pub fn new(password: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        let key = Key::clone_from_slice(&hasher.finalize());
        Self {
            cipher: ChaCha20Poly1305::new(&key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let data = STANDARD.decode(stored)?;
        if data.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_same_material() {
        let c = CredentialCipher::new("hunter2", "pepper");
        let stored = c.encrypt("AKIAEXAMPLE").unwrap();
        assert_ne!(stored, "AKIAEXAMPLE");
        assert_eq!(c.decrypt(&stored).unwrap(), "AKIAEXAMPLE");
    }

    #[test]
    fn nonce_is_fresh_per_encryption() {
        let c = CredentialCipher::new("hunter2", "pepper");
        assert_ne!(c.encrypt("same").unwrap(), c.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = CredentialCipher::new("hunter2", "pepper")
            .encrypt("secret")
            .unwrap();
        let other = CredentialCipher::new("hunter2", "salt");
        assert!(matches!(other.decrypt(&stored), Err(CipherError::Decrypt)));
    }

    #[test]
    fn garbage_is_rejected() {
        let c = CredentialCipher::new("p", "s");
        assert!(matches!(c.decrypt("!!"), Err(CipherError::Encoding(_))));
        assert!(matches!(c.decrypt("AAAA"), Err(CipherError::Truncated)));
    }
}
