//! Key-management collaborator.
//!
//! The engine never sees KMS key material. It only asks for envelope
//! encryption and decryption under a named key.

use uuid::Uuid;

use crate::error::SigilResult;

pub trait KeyManagementService: Send + Sync {
    fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
    ) -> impl Future<Output = SigilResult<Vec<u8>>> + Send;

    fn decrypt(
        &self,
        key_id: &str,
        ciphertext: &[u8],
    ) -> impl Future<Output = SigilResult<Vec<u8>>> + Send;

    /// Identifier of the project's certificate-manager key.
    fn certificate_key_id(&self, project_id: Uuid) -> impl Future<Output = SigilResult<String>> + Send;
}
