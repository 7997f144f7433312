//! Secure Kit - Masked-Key Cipher (white-box path)
//!
//! Independently keyed from the transport envelope. The key is held only as
//! two masked shares plus a checksum over both; each call verifies the
//! checksum and recombines the key into a zeroizing buffer for the length
//! of the call. This hides the key from a casual memory scan and detects
//! corruption of the shares. It is not a white-box AES construction.
//!
//! Envelope (base64, standard alphabet):
//! ```text
//! [VERSION 1B][0x57]
//! [NONCE 24B][random per call]
//! [CIPHERTEXT variable][XChaCha20-Poly1305, AAD = VERSION || bundle id]
//! [TAG 16B]
//! ```

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{
    contexts, decrypt_xchacha, derive_key, encrypt_xchacha, EncryptedData, KitKey, KEY_LEN, TAG_LEN,
    XCHACHA_NONCE_LEN,
};
use crate::error::{KitError, KitResult};

/// Current envelope version
pub const WHITEBOX_VERSION: u8 = 0x57;

const MIN_ENVELOPE_LEN: usize = 1 + XCHACHA_NONCE_LEN + TAG_LEN;

pub struct WhiteBoxCipher {
    masked: Zeroizing<[u8; KEY_LEN]>,
    mask: Zeroizing<[u8; KEY_LEN]>,
    checksum: [u8; 32],
    aad: Vec<u8>,
}

impl WhiteBoxCipher {
    pub fn new(app_key: &KitKey, bundle_id: &str) -> KitResult<Self> {
        if bundle_id.is_empty() {
            return Err(KitError::InvalidParameter("bundle_id is empty".into()));
        }

        let key = derive_key(app_key.expose(), bundle_id.as_bytes(), contexts::WHITEBOX)?;

        let mut mask = Zeroizing::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut mask[..]);

        let mut masked = Zeroizing::new([0u8; KEY_LEN]);
        for (out, (k, m)) in masked.iter_mut().zip(key.expose().iter().zip(mask.iter())) {
            *out = k ^ m;
        }

        let checksum = share_checksum(&masked, &mask);
        let mut aad = vec![WHITEBOX_VERSION];
        aad.extend_from_slice(bundle_id.as_bytes());

        Ok(Self {
            masked,
            mask,
            checksum,
            aad,
        })
    }

    /// Verify the shares and recombine the key
    fn unmask(&self) -> Option<KitKey> {
        if share_checksum(&self.masked, &self.mask) != self.checksum {
            log::warn!("white-box key shares failed checksum");
            return None;
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        for (out, (a, b)) in key.iter_mut().zip(self.masked.iter().zip(self.mask.iter())) {
            *out = a ^ b;
        }
        Some(KitKey::new(*key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> KitResult<String> {
        let key = self
            .unmask()
            .ok_or_else(|| KitError::WhiteBoxEncrypt("key tables corrupted".into()))?;

        let encrypted = encrypt_xchacha(&key, plaintext, &self.aad)
            .map_err(|e| KitError::WhiteBoxEncrypt(e.to_string()))?;

        let mut raw = Vec::with_capacity(1 + encrypted.nonce.len() + encrypted.ciphertext.len());
        raw.push(WHITEBOX_VERSION);
        raw.extend_from_slice(&encrypted.to_bytes());

        Ok(general_purpose::STANDARD.encode(raw))
    }

    pub fn decrypt(&self, envelope: &str) -> KitResult<Vec<u8>> {
        let envelope = envelope.trim();
        if envelope.is_empty() {
            return Err(KitError::InvalidParameter("envelope is empty".into()));
        }

        let raw = general_purpose::STANDARD
            .decode(envelope)
            .map_err(|e| KitError::WhiteBoxDecrypt(format!("not base64: {}", e)))?;

        if raw.len() < MIN_ENVELOPE_LEN || raw[0] != WHITEBOX_VERSION {
            return Err(KitError::WhiteBoxDecrypt("malformed envelope".into()));
        }

        let encrypted = EncryptedData::from_bytes_xchacha(&raw[1..])
            .map_err(|e| KitError::WhiteBoxDecrypt(e.to_string()))?;

        let key = self
            .unmask()
            .ok_or_else(|| KitError::WhiteBoxDecrypt("key tables corrupted".into()))?;

        decrypt_xchacha(&key, &encrypted, &self.aad).map_err(|e| KitError::WhiteBoxDecrypt(e.to_string()))
    }

    pub fn encrypt_str(&self, plaintext: &str) -> KitResult<String> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_str(&self, envelope: &str) -> KitResult<String> {
        let bytes = self.decrypt(envelope)?;
        String::from_utf8(bytes).map_err(|_| KitError::WhiteBoxDecrypt("decrypted data is not UTF-8".into()))
    }
}

fn share_checksum(masked: &[u8; KEY_LEN], mask: &[u8; KEY_LEN]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(masked);
    hasher.update(mask);
    hasher.finalize().into()
}
