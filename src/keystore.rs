//! Secure Kit - Keystore
//!
//! Persists the storage master key wrapped under an Argon2id KEK derived
//! from the app key and the device identifier.
//!
//! `keystore.json`:
//! ```text
//! { version, created_at, device_id, kdf{memory_kib,iterations,parallelism},
//!   salt(b64 16B), nonce(b64 12B), wrapped_key(b64 AES-256-GCM 32B + tag) }
//! ```

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{
    decrypt_aes_gcm, derive_kek, encrypt_aes_gcm, generate_salt, EncryptedData, KdfConfig, KitKey, KEY_LEN,
};
use crate::error::{KitError, KitResult};
use crate::secure_fs::SecureFs;

pub const KEYSTORE_FILE: &str = "keystore.json";
pub const DEVICE_ID_FILE: &str = "device.id";
pub const KEYSTORE_VERSION: u32 = 1;

const WRAP_AAD: &[u8] = b"securekit:keystore:v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeystoreDocument {
    version: u32,
    created_at: DateTime<Utc>,
    device_id: String,
    kdf: KdfConfig,
    salt: String,
    nonce: String,
    wrapped_key: String,
}

/// Resolve the device identifier: configured value, persisted value, or a new one
pub fn resolve_device_id(fs: &SecureFs, configured: Option<&str>) -> KitResult<String> {
    if let Some(id) = configured {
        return Ok(id.to_string());
    }

    if let Some(bytes) = fs.read_file(DEVICE_ID_FILE)? {
        let id = String::from_utf8(bytes)
            .map_err(|_| KitError::FileOperation("device id file is not UTF-8".into()))?;
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    let id = Uuid::new_v4().to_string();
    fs.write_file(DEVICE_ID_FILE, id.as_bytes())?;
    log::info!("generated device id for store at {}", fs.root().display());
    Ok(id)
}

/// Load the storage master key, creating the keystore on first use
pub fn load_or_create(fs: &SecureFs, app_key: &KitKey, device_id: &str, kdf: &KdfConfig) -> KitResult<KitKey> {
    match fs.read_file(KEYSTORE_FILE)? {
        Some(bytes) => unwrap_master(&bytes, app_key, device_id),
        None => create(fs, app_key, device_id, kdf),
    }
}

fn create(fs: &SecureFs, app_key: &KitKey, device_id: &str, kdf: &KdfConfig) -> KitResult<KitKey> {
    let master = KitKey::generate();
    let salt = generate_salt();
    let kek = derive_kek(app_key, device_id, &salt, kdf)?;

    let aad = wrap_aad(device_id);
    let wrapped = encrypt_aes_gcm(&kek, master.expose(), &aad)
        .map_err(|e| KitError::Key(format!("wrap storage key: {}", e)))?;

    let doc = KeystoreDocument {
        version: KEYSTORE_VERSION,
        created_at: Utc::now(),
        device_id: device_id.to_string(),
        kdf: *kdf,
        salt: general_purpose::STANDARD.encode(salt),
        nonce: general_purpose::STANDARD.encode(&wrapped.nonce),
        wrapped_key: general_purpose::STANDARD.encode(&wrapped.ciphertext),
    };

    let json = serde_json::to_vec_pretty(&doc)
        .map_err(|e| KitError::Unknown(format!("serialize keystore: {}", e)))?;
    fs.write_file(KEYSTORE_FILE, &json)?;

    log::info!("created keystore at {}", fs.root().display());
    Ok(master)
}

fn unwrap_master(bytes: &[u8], app_key: &KitKey, device_id: &str) -> KitResult<KitKey> {
    let doc: KeystoreDocument =
        serde_json::from_slice(bytes).map_err(|e| KitError::Key(format!("keystore corrupted: {}", e)))?;

    if doc.version != KEYSTORE_VERSION {
        return Err(KitError::Key(format!(
            "unsupported keystore version {}",
            doc.version
        )));
    }
    if doc.device_id != device_id {
        return Err(KitError::Key("keystore is bound to another device".into()));
    }

    // Cost parameters come from disk; bound them before deriving
    doc.kdf.check_limits()?;

    let salt = decode_field("salt", &doc.salt)?;
    let nonce = decode_field("nonce", &doc.nonce)?;
    let ciphertext = decode_field("wrapped_key", &doc.wrapped_key)?;

    let kek = derive_kek(app_key, device_id, &salt, &doc.kdf)?;
    let plaintext = Zeroizing::new(
        decrypt_aes_gcm(&kek, &EncryptedData { nonce, ciphertext }, &wrap_aad(device_id))
            .map_err(|_| KitError::Key("cannot unwrap storage key - app key changed?".into()))?,
    );

    if plaintext.len() != KEY_LEN {
        return Err(KitError::Key("unwrapped storage key has wrong length".into()));
    }

    let mut master = Zeroizing::new([0u8; KEY_LEN]);
    master.copy_from_slice(&plaintext);
    log::debug!("unwrapped storage key (created {})", doc.created_at.to_rfc3339());
    Ok(KitKey::new(*master))
}

fn decode_field(name: &str, value: &str) -> KitResult<Vec<u8>> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|e| KitError::Key(format!("keystore field {}: {}", name, e)))
}

fn wrap_aad(device_id: &str) -> Vec<u8> {
    let mut aad = WRAP_AAD.to_vec();
    aad.extend_from_slice(device_id.as_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tempfile::tempdir;

    fn cheap() -> KdfConfig {
        KdfConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_create_then_load_same_key() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        let app = KitKey::generate();

        let first = load_or_create(&fs, &app, "device-1", &cheap()).unwrap();
        assert!(fs.exists(KEYSTORE_FILE));

        let second = load_or_create(&fs, &app, "device-1", &cheap()).unwrap();
        assert_eq!(first.expose(), second.expose());
    }

    #[test]
    fn test_wrong_app_key_is_key_error() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        load_or_create(&fs, &KitKey::generate(), "device-1", &cheap()).unwrap();
        let err = load_or_create(&fs, &KitKey::generate(), "device-1", &cheap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn test_other_device_is_key_error() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        let app = KitKey::generate();

        load_or_create(&fs, &app, "device-1", &cheap()).unwrap();
        let err = load_or_create(&fs, &app, "device-2", &cheap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn test_corrupted_keystore_is_key_error() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        fs.write_file(KEYSTORE_FILE, b"{ not json").unwrap();

        let err = load_or_create(&fs, &KitKey::generate(), "device-1", &cheap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn test_device_id_persisted() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        let generated = resolve_device_id(&fs, None).unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_eq!(resolve_device_id(&fs, None).unwrap(), generated);
        assert_eq!(resolve_device_id(&fs, Some("fixed")).unwrap(), "fixed");
    }

    #[test]
    fn test_out_of_range_kdf_is_key_error() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        let app = KitKey::generate();
        load_or_create(&fs, &app, "device-1", &cheap()).unwrap();

        let raw = fs.read_file(KEYSTORE_FILE).unwrap().unwrap();
        let mut doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        doc["kdf"]["memory_kib"] = serde_json::json!(u32::MAX);
        fs.write_file(KEYSTORE_FILE, &serde_json::to_vec(&doc).unwrap()).unwrap();

        let err = load_or_create(&fs, &app, "device-1", &cheap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);

        doc["kdf"]["memory_kib"] = serde_json::json!(64);
        doc["kdf"]["iterations"] = serde_json::json!(u32::MAX);
        fs.write_file(KEYSTORE_FILE, &serde_json::to_vec(&doc).unwrap()).unwrap();

        let err = load_or_create(&fs, &app, "device-1", &cheap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Key);
    }
}
