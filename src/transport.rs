//! Secure Kit - Transport Envelope
//!
//! Ciphertext exchanged with the server. Both sides hold the app key, so
//! the server builds the same [`TransportCipher`] to read client envelopes
//! and produce its own.
//!
//! Envelope (base64, standard alphabet):
//! ```text
//! [VERSION 1B][0x01]
//! [NONCE 12B][random per call]
//! [CIPHERTEXT variable][AES-256-GCM, AAD = VERSION || bundle id]
//! [TAG 16B]
//! ```

use base64::{engine::general_purpose, Engine as _};

use crate::crypto::{
    contexts, decrypt_aes_gcm, derive_key, encrypt_aes_gcm, AeadError, EncryptedData, KitKey, NONCE_LEN, TAG_LEN,
};
use crate::error::{KitError, KitResult};

/// Current envelope version
pub const TRANSPORT_VERSION: u8 = 0x01;

/// Smallest decodable envelope: version + nonce + tag
const MIN_ENVELOPE_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

/// Encrypts toward and decrypts from the server
pub struct TransportCipher {
    key: KitKey,
    aad: Vec<u8>,
}

impl TransportCipher {
    /// Derive the transport key for an application
    pub fn new(app_key: &KitKey, bundle_id: &str) -> KitResult<Self> {
        if bundle_id.is_empty() {
            return Err(KitError::InvalidParameter("bundle_id is empty".into()));
        }

        let key = derive_key(app_key.expose(), bundle_id.as_bytes(), contexts::TRANSPORT)?;
        let mut aad = vec![TRANSPORT_VERSION];
        aad.extend_from_slice(bundle_id.as_bytes());

        Ok(Self { key, aad })
    }

    /// Encrypt bytes into a base64 envelope
    pub fn encrypt(&self, plaintext: &[u8]) -> KitResult<String> {
        let encrypted = encrypt_aes_gcm(&self.key, plaintext, &self.aad).map_err(|e| match e {
            AeadError::InvalidKey => KitError::Key("transport key unusable".into()),
            other => KitError::Unknown(format!("transport encrypt: {}", other)),
        })?;

        let mut raw = Vec::with_capacity(1 + encrypted.nonce.len() + encrypted.ciphertext.len());
        raw.push(TRANSPORT_VERSION);
        raw.extend_from_slice(&encrypted.to_bytes());

        Ok(general_purpose::STANDARD.encode(raw))
    }

    /// Decrypt a base64 envelope back into bytes
    pub fn decrypt(&self, envelope: &str) -> KitResult<Vec<u8>> {
        let envelope = envelope.trim();
        if envelope.is_empty() {
            return Err(KitError::InvalidParameter("envelope is empty".into()));
        }

        let raw = general_purpose::STANDARD
            .decode(envelope)
            .map_err(|e| KitError::Protocol(format!("envelope is not base64: {}", e)))?;

        if raw.len() < MIN_ENVELOPE_LEN {
            return Err(KitError::Protocol(format!(
                "envelope too short: {} bytes",
                raw.len()
            )));
        }
        if raw[0] != TRANSPORT_VERSION {
            return Err(KitError::Protocol(format!(
                "unsupported envelope version 0x{:02x}",
                raw[0]
            )));
        }

        let encrypted = EncryptedData::from_bytes_aes(&raw[1..])
            .map_err(|e| KitError::Protocol(format!("envelope: {}", e)))?;

        decrypt_aes_gcm(&self.key, &encrypted, &self.aad).map_err(|e| match e {
            AeadError::Authentication => {
                log::warn!("transport envelope failed authentication");
                KitError::InvalidServerData
            }
            AeadError::InvalidKey => KitError::Key("transport key unusable".into()),
            other => KitError::Protocol(format!("envelope: {}", other)),
        })
    }

    pub fn encrypt_str(&self, plaintext: &str) -> KitResult<String> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_str(&self, envelope: &str) -> KitResult<String> {
        let bytes = self.decrypt(envelope)?;
        String::from_utf8(bytes).map_err(|_| KitError::Protocol("decrypted data is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn pair() -> (TransportCipher, TransportCipher) {
        let app = KitKey::generate();
        let client = TransportCipher::new(&app, "com.example.app").unwrap();
        let server = TransportCipher::new(&app, "com.example.app").unwrap();
        (client, server)
    }

    #[test]
    fn test_client_to_server_and_back() {
        let (client, server) = pair();

        let up = client.encrypt_str("login=alice").unwrap();
        assert_eq!(server.decrypt_str(&up).unwrap(), "login=alice");

        let down = server.encrypt(&[0, 1, 2, 255]).unwrap();
        assert_eq!(client.decrypt(&down).unwrap(), vec![0, 1, 2, 255]);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let (client, _) = pair();
        let envelope = client.encrypt_str("").unwrap();
        assert_eq!(client.decrypt_str(&envelope).unwrap(), "");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let (client, _) = pair();
        let a = client.encrypt_str("same").unwrap();
        let b = client.encrypt_str("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_every_flipped_byte_detected() {
        let (client, server) = pair();
        let envelope = server.encrypt_str("balance=100").unwrap();
        let raw = general_purpose::STANDARD.decode(&envelope).unwrap();

        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let encoded = general_purpose::STANDARD.encode(&tampered);
            let err = client.decrypt_str(&encoded).unwrap_err();
            if i == 0 {
                assert_eq!(err.kind(), ErrorKind::Protocol);
            } else {
                assert_eq!(err.kind(), ErrorKind::InvalidServerData, "byte {}", i);
            }
        }
    }

    #[test]
    fn test_other_bundle_cannot_decrypt() {
        let app = KitKey::generate();
        let a = TransportCipher::new(&app, "com.example.a").unwrap();
        let b = TransportCipher::new(&app, "com.example.b").unwrap();

        let envelope = a.encrypt_str("secret").unwrap();
        assert_eq!(b.decrypt_str(&envelope).unwrap_err().kind(), ErrorKind::InvalidServerData);
    }

    #[test]
    fn test_malformed_input() {
        let (client, _) = pair();
        assert_eq!(client.decrypt("").unwrap_err().kind(), ErrorKind::InvalidParameter);
        assert_eq!(client.decrypt("%%%").unwrap_err().kind(), ErrorKind::Protocol);

        let short = general_purpose::STANDARD.encode([TRANSPORT_VERSION; 8]);
        assert_eq!(client.decrypt(&short).unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_binary_payload_not_utf8() {
        let (client, _) = pair();
        let envelope = client.encrypt(&[0xff, 0xfe]).unwrap();
        assert_eq!(client.decrypt_str(&envelope).unwrap_err().kind(), ErrorKind::Protocol);
    }
}
