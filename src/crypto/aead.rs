//! Secure Kit - AEAD Encryption
//!
//! AES-256-GCM for the transport envelope, XChaCha20-Poly1305 for local
//! entries and the masked-key cipher. Callers decide which error kind an
//! [`AeadError`] becomes, since the same failure means different things on
//! different paths.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::keys::{generate_nonce, generate_xchacha_nonce, KitKey, NONCE_LEN, TAG_LEN, XCHACHA_NONCE_LEN};

type HmacSha256 = Hmac<Sha256>;

/// Low-level AEAD failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AeadError {
    #[error("invalid key length")]
    InvalidKey,

    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonce { expected: usize, actual: usize },

    #[error("data too short")]
    Truncated,

    #[error("encryption failed")]
    Encrypt,

    #[error("authentication failed")]
    Authentication,
}

/// Encrypted data: nonce plus ciphertext with authentication tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes (AES-GCM layout)
    pub fn from_bytes_aes(data: &[u8]) -> Result<Self, AeadError> {
        Self::split(data, NONCE_LEN)
    }

    /// Deserialize from bytes (XChaCha20 layout)
    pub fn from_bytes_xchacha(data: &[u8]) -> Result<Self, AeadError> {
        Self::split(data, XCHACHA_NONCE_LEN)
    }

    fn split(data: &[u8], nonce_len: usize) -> Result<Self, AeadError> {
        if data.len() < nonce_len + TAG_LEN {
            return Err(AeadError::Truncated);
        }

        Ok(Self {
            nonce: data[..nonce_len].to_vec(),
            ciphertext: data[nonce_len..].to_vec(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AES-256-GCM
// ═══════════════════════════════════════════════════════════════════════════

pub fn encrypt_aes_gcm(key: &KitKey, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedData, AeadError> {
    let cipher = Aes256Gcm::new_from_slice(key.expose()).map_err(|_| AeadError::InvalidKey)?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| AeadError::Encrypt)?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

pub fn decrypt_aes_gcm(key: &KitKey, encrypted: &EncryptedData, aad: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = Aes256Gcm::new_from_slice(key.expose()).map_err(|_| AeadError::InvalidKey)?;

    if encrypted.nonce.len() != NONCE_LEN {
        return Err(AeadError::InvalidNonce {
            expected: NONCE_LEN,
            actual: encrypted.nonce.len(),
        });
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: encrypted.ciphertext.as_slice(),
                aad,
            },
        )
        .map_err(|_| AeadError::Authentication)
}

// ═══════════════════════════════════════════════════════════════════════════
// XChaCha20-Poly1305
// ═══════════════════════════════════════════════════════════════════════════

pub fn encrypt_xchacha(key: &KitKey, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedData, AeadError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose()).map_err(|_| AeadError::InvalidKey)?;

    let nonce_bytes = generate_xchacha_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| AeadError::Encrypt)?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

pub fn decrypt_xchacha(key: &KitKey, encrypted: &EncryptedData, aad: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose()).map_err(|_| AeadError::InvalidKey)?;

    if encrypted.nonce.len() != XCHACHA_NONCE_LEN {
        return Err(AeadError::InvalidNonce {
            expected: XCHACHA_NONCE_LEN,
            actual: encrypted.nonce.len(),
        });
    }

    let nonce = XNonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: encrypted.ciphertext.as_slice(),
                aad,
            },
        )
        .map_err(|_| AeadError::Authentication)
}

// ═══════════════════════════════════════════════════════════════════════════
// HMAC
// ═══════════════════════════════════════════════════════════════════════════

/// Compute HMAC-SHA256
pub fn compute_hmac(key: &KitKey, data: &[u8]) -> Result<[u8; 32], AeadError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.expose()).map_err(|_| AeadError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
