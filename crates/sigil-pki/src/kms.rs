//! In-process KMS backed by AES-256-GCM.
//!
//! Each key id gets its own data key, `SHA-256(master || key_id)`.
//! Blobs are `nonce(12) || ciphertext || tag`.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use sigil_core::error::{SigilError, SigilResult};
use sigil_core::kms::KeyManagementService;
use uuid::Uuid;

use crate::error::PkiError;

const NONCE_LEN: usize = 12;

/// Configuration for [`LocalKms`].
#[derive(Clone, Default)]
pub struct LocalKmsConfig {
    /// 256-bit master key. `None` leaves the KMS unconfigured.
    pub master_key: Option<[u8; 32]>,
}

impl std::fmt::Debug for LocalKmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKmsConfig")
            .field("master_key", &self.master_key.map(|_| "<redacted>"))
            .finish()
    }
}

impl LocalKmsConfig {
    /// Read a hex-encoded master key from `SIGIL_KMS_MASTER_KEY`.
    pub fn from_env() -> Result<Self, PkiError> {
        let Ok(raw) = std::env::var("SIGIL_KMS_MASTER_KEY") else {
            return Ok(Self::default());
        };
        let bytes = hex::decode(raw.trim())
            .map_err(|e| PkiError::InvalidConfig(format!("SIGIL_KMS_MASTER_KEY: {e}")))?;
        let master_key: [u8; 32] = bytes.try_into().map_err(|_| {
            PkiError::InvalidConfig("SIGIL_KMS_MASTER_KEY must be 32 bytes".into())
        })?;
        Ok(Self {
            master_key: Some(master_key),
        })
    }
}

pub struct LocalKms {
    master_key: [u8; 32],
}

impl LocalKms {
    pub fn new(config: &LocalKmsConfig) -> Result<Self, PkiError> {
        let master_key = config
            .master_key
            .ok_or_else(|| PkiError::InvalidConfig("KMS master key is not configured".into()))?;
        Ok(Self { master_key })
    }

    fn cipher(&self, key_id: &str) -> Aes256Gcm {
        let mut hasher = Sha256::new();
        hasher.update(self.master_key);
        hasher.update(key_id.as_bytes());
        let data_key = hasher.finalize();
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&data_key))
    }

    fn seal(&self, key_id: &str, plaintext: &[u8]) -> SigilResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher(key_id)
            .encrypt(nonce, plaintext)
            .map_err(|e| SigilError::Kms(format!("AES-GCM encrypt: {e}")))?;

        let mut blob = nonce_bytes.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn open(&self, key_id: &str, blob: &[u8]) -> SigilResult<Vec<u8>> {
        if blob.len() <= NONCE_LEN {
            return Err(SigilError::Kms("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        self.cipher(key_id)
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| SigilError::Kms(format!("AES-GCM decrypt under '{key_id}': {e}")))
    }
}

impl KeyManagementService for LocalKms {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> SigilResult<Vec<u8>> {
        self.seal(key_id, plaintext)
    }

    async fn decrypt(&self, key_id: &str, ciphertext: &[u8]) -> SigilResult<Vec<u8>> {
        self.open(key_id, ciphertext)
    }

    async fn certificate_key_id(&self, project_id: Uuid) -> SigilResult<String> {
        Ok(format!("cert-manager:{project_id}"))
    }
}
