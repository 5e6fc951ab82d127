// Token entropy and symmetric encryption primitives.
//
// Hex tokens back the email-verification and password-reset flows: 32
// random bytes rendered as 64 lowercase hex chars, stored plain because
// they are already unguessable. The credential cipher seals provider
// secrets at rest with AES-256-GCM; the key is derived from the
// deployment secret via SHA-256 and the random 96-bit nonce is prepended
// to the ciphertext.

use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Number of random bytes behind a hex token
const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Ciphertext too short")]
    CiphertextTooShort,

    #[error("Credential secret is not configured")]
    MissingSecret,
}

/// Generate a one-shot token: 64 lowercase hex characters from 32 random
/// bytes.
pub fn generate_hex_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time equality for token strings of equal length.
/// Length mismatch short-circuits to false, which leaks only the length
/// of a public format.
pub fn tokens_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// AES-256-GCM cipher for provider credentials at rest
pub struct CredentialCipher {
    key_bytes: [u8; 32],
}

impl CredentialCipher {
    /// Derive the sealing key from the deployment secret.
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::MissingSecret);
        }
        let digest = Sha256::digest(secret.as_bytes());
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&digest);
        Ok(Self { key_bytes })
    }

    fn key(&self) -> Result<LessSafeKey, CryptoError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypt a plaintext credential. Output layout: nonce || ciphertext+tag.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&in_out);
        Ok(output)
    }

    /// Decrypt a sealed credential produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() <= NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }

        let key = self.key()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = sealed[NONCE_LEN..].to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        Ok(plaintext.to_vec())
    }
}
