//! Encrypted credentials store
//!
//! Persists the credentials bundle as a JSON file with both password fields
//! encrypted (AES-256-GCM, fresh random nonce per encryption, stored as
//! base64(nonce || ciphertext)). Anything wrong with the stored data —
//! missing file aside, that's the normal empty state — degrades to
//! "not configured" so the service asks for setup instead of failing.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use podpipe_common::{Error, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::models::CredentialsBundle;

pub struct SecretStore {
    path: PathBuf,
    cipher: Aes256Gcm,
}

impl SecretStore {
    /// Create a store backed by `path`, keyed by a 32-byte key
    pub fn new(path: PathBuf, key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key).expect("32-byte key is valid for AES-256");
        Self { path, cipher }
    }

    /// Cheap existence check; does not validate the stored data
    pub fn is_configured(&self) -> bool {
        self.path.exists()
    }

    /// Persist the bundle with password fields encrypted
    pub fn save(&self, bundle: &CredentialsBundle) -> Result<()> {
        let mut stored = bundle.clone();
        stored.remote_storage.password = self.encrypt(&bundle.remote_storage.password)?;
        stored.cms.password = self.encrypt(&bundle.cms.password)?;

        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::Internal(format!("Serialize credentials failed: {}", e)))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Load the bundle with passwords decrypted.
    ///
    /// Returns `None` when no bundle exists or the stored data is malformed
    /// or undecryptable — the store treats corruption as "needs setup".
    pub fn load(&self) -> Option<CredentialsBundle> {
        if !self.path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read credentials file: {}", e);
                return None;
            }
        };

        let mut bundle: CredentialsBundle = match serde_json::from_str(&content) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Stored credentials are malformed, treating as not configured: {}", e);
                return None;
            }
        };

        bundle.remote_storage.password = match self.decrypt(&bundle.remote_storage.password) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!("Stored credentials are undecryptable, treating as not configured: {}", e);
                return None;
            }
        };
        bundle.cms.password = match self.decrypt(&bundle.cms.password) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!("Stored credentials are undecryptable, treating as not configured: {}", e);
                return None;
            }
        };

        Some(bundle)
    }

    /// Encrypt a plaintext value. Returns base64(nonce || ciphertext).
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(format!("Encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(12 + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt a base64(nonce || ciphertext) value. Returns plaintext.
    fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Internal(format!("Base64 decode failed: {}", e)))?;

        if combined.len() < 13 {
            return Err(Error::Internal("Encrypted value too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Internal(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| Error::Internal(format!("UTF-8 decode failed: {}", e)))
    }
}
