//! Secure Kit - Unified Public API
//!
//! Single entry point for transport encryption, the local store, the
//! white-box path and device diagnostics.

use std::fs;

use crate::config::KitConfig;
use crate::crypto::StorageKeys;
use crate::error::{KitError, KitResult};
use crate::integrity::{JailbreakDetector, JailbreakReport};
use crate::keystore;
use crate::secure_fs::SecureFs;
use crate::store::{EntryKind, LocalStore, StoredEntry};
use crate::transport::TransportCipher;
use crate::whitebox::WhiteBoxCipher;

/// Secure Kit context
///
/// Owns the key material and the on-disk store. A value of this type is
/// the initialized state; share it by reference or `Arc` across threads.
///
/// # Example
///
/// ```rust,ignore
/// use secure_kit::{KitConfig, SecureStore};
///
/// let store = SecureStore::open(KitConfig::load("securekit.json")?)?;
///
/// store.put_string("hello", "greeting")?;
/// assert_eq!(store.get_string("greeting")?, "hello");
///
/// let envelope = store.encrypt_string_to_server("login=alice")?;
/// ```
pub struct SecureStore {
    config: KitConfig,
    transport: TransportCipher,
    whitebox: WhiteBoxCipher,
    store: LocalStore,
    detector: JailbreakDetector,
}

impl SecureStore {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Validate the configuration, unlock the keystore and open the store
    pub fn open(config: KitConfig) -> KitResult<Self> {
        let app_key = config.validate()?;

        let transport = TransportCipher::new(&app_key, &config.bundle_id)?;
        let whitebox = WhiteBoxCipher::new(&app_key, &config.bundle_id)?;

        fs::create_dir_all(&config.store_dir)
            .map_err(|e| KitError::FileOperation(format!("{}: {}", config.store_dir.display(), e)))?;
        let fs = SecureFs::new(&config.store_dir);

        let device_id = keystore::resolve_device_id(&fs, config.device_id.as_deref())?;
        let master = keystore::load_or_create(&fs, &app_key, &device_id, &config.kdf)?;
        let store = LocalStore::new(fs, StorageKeys::from_master(&master)?);

        log::info!(
            "secure store opened for {} at {}",
            config.bundle_id,
            config.store_dir.display()
        );

        Ok(Self {
            config,
            transport,
            whitebox,
            store,
            detector: JailbreakDetector::default(),
        })
    }

    /// Replace the jailbreak detector
    pub fn with_detector(mut self, detector: JailbreakDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    fn ensure_licensed(&self) -> KitResult<()> {
        self.config.check_license()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRANSPORT
    // ═══════════════════════════════════════════════════════════════════════

    pub fn encrypt_string_to_server(&self, plaintext: &str) -> KitResult<String> {
        self.ensure_licensed()?;
        self.transport.encrypt_str(plaintext)
    }

    pub fn decrypt_string_from_server(&self, envelope: &str) -> KitResult<String> {
        self.ensure_licensed()?;
        self.transport.decrypt_str(envelope)
    }

    pub fn encrypt_binary_to_server(&self, plaintext: &[u8]) -> KitResult<String> {
        self.ensure_licensed()?;
        self.transport.encrypt(plaintext)
    }

    pub fn decrypt_binary_from_server(&self, envelope: &str) -> KitResult<Vec<u8>> {
        self.ensure_licensed()?;
        self.transport.decrypt(envelope)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LOCAL STORE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn put_string(&self, value: &str, key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.put(key, value.as_bytes(), EntryKind::String)
    }

    pub fn put_binary(&self, value: &[u8], key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.put(key, value, EntryKind::Binary)
    }

    /// Read an entry as text; binary entries succeed only if they are UTF-8
    pub fn get_string(&self, key: &str) -> KitResult<String> {
        let entry = self.get_entry(key)?;
        String::from_utf8(entry.value)
            .map_err(|_| KitError::DataEncryptDecrypt(format!("entry {} is not UTF-8", key)))
    }

    pub fn get_binary(&self, key: &str) -> KitResult<Vec<u8>> {
        Ok(self.get_entry(key)?.value)
    }

    /// Read an entry together with the kind it was stored as
    pub fn get_entry(&self, key: &str) -> KitResult<StoredEntry> {
        self.ensure_licensed()?;
        self.store.get(key)
    }

    pub fn update_string(&self, value: &str, key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.update(key, value.as_bytes(), EntryKind::String)
    }

    pub fn update_binary(&self, value: &[u8], key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.update(key, value, EntryKind::Binary)
    }

    pub fn remove_string(&self, key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.remove(key)
    }

    pub fn remove_binary(&self, key: &str) -> KitResult<()> {
        self.ensure_licensed()?;
        self.store.remove(key)
    }

    pub fn contains(&self, key: &str) -> KitResult<bool> {
        self.store.contains(key)
    }

    pub fn entry_count(&self) -> KitResult<usize> {
        self.store.entry_count()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WHITE-BOX
    // ═══════════════════════════════════════════════════════════════════════

    pub fn wb_encrypt_string(&self, plaintext: &str) -> KitResult<String> {
        self.ensure_licensed()?;
        self.whitebox.encrypt_str(plaintext)
    }

    pub fn wb_encrypt_binary(&self, plaintext: &[u8]) -> KitResult<String> {
        self.ensure_licensed()?;
        self.whitebox.encrypt(plaintext)
    }

    pub fn wb_decrypt_string(&self, envelope: &str) -> KitResult<String> {
        self.ensure_licensed()?;
        self.whitebox.decrypt_str(envelope)
    }

    pub fn wb_decrypt_binary(&self, envelope: &str) -> KitResult<Vec<u8>> {
        self.ensure_licensed()?;
        self.whitebox.decrypt(envelope)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn sdk_version(&self) -> &'static str {
        crate::VERSION
    }

    /// Advisory only; no operation consults it
    pub fn is_jailbreak(&self) -> bool {
        self.detector.is_jailbroken()
    }

    pub fn jailbreak_report(&self) -> JailbreakReport {
        self.detector.scan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LicenseConfig;
    use crate::crypto::{KdfConfig, KitKey};
    use crate::ErrorKind;
    use chrono::{Duration, Utc};
    use tempfile::{tempdir, TempDir};

    fn config(dir: &TempDir) -> KitConfig {
        KitConfig::new("com.example.app", KitKey::generate().to_base64(), dir.path().join("store"))
            .with_device_id("test-device")
            .with_kdf(KdfConfig {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            })
    }

    #[test]
    fn test_open_creates_store() {
        let dir = tempdir().unwrap();
        let store = SecureStore::open(config(&dir)).unwrap();

        assert!(dir.path().join("store").join(keystore::KEYSTORE_FILE).exists());
        assert_eq!(store.entry_count().unwrap(), 0);
        assert_eq!(store.sdk_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_string_and_binary_share_namespace() {
        let dir = tempdir().unwrap();
        let store = SecureStore::open(config(&dir)).unwrap();

        store.put_binary(&[0xff, 0xfe], "blob").unwrap();
        assert_eq!(store.put_string("x", "blob").unwrap_err().kind(), ErrorKind::KeyExists);
        assert_eq!(store.get_string("blob").unwrap_err().kind(), ErrorKind::DataEncryptDecrypt);

        store.put_binary(b"ascii", "text-bytes").unwrap();
        assert_eq!(store.get_string("text-bytes").unwrap(), "ascii");
        assert_eq!(store.get_entry("text-bytes").unwrap().kind, EntryKind::Binary);

        store.remove_string("blob").unwrap();
        assert!(!store.contains("blob").unwrap());
    }

    #[test]
    fn test_transport_and_whitebox() {
        let dir = tempdir().unwrap();
        let store = SecureStore::open(config(&dir)).unwrap();

        let envelope = store.encrypt_binary_to_server(&[1, 2, 3]).unwrap();
        assert_eq!(store.decrypt_binary_from_server(&envelope).unwrap(), vec![1, 2, 3]);

        let wb = store.wb_encrypt_binary(&[4, 5]).unwrap();
        assert_eq!(store.wb_decrypt_binary(&wb).unwrap(), vec![4, 5]);
        assert_eq!(store.wb_decrypt_string("").unwrap_err().kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_license_checked_at_open() {
        let dir = tempdir().unwrap();
        let cfg = config(&dir).with_license(LicenseConfig {
            bundle_id: "com.other.app".into(),
            not_before: None,
            not_after: None,
        });
        let err = SecureStore::open(cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::BundleIdMismatch);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_license_rechecked_per_operation() {
        let dir = tempdir().unwrap();
        let mut store = SecureStore::open(config(&dir)).unwrap();

        store.config.license = Some(LicenseConfig {
            bundle_id: "com.example.app".into(),
            not_before: None,
            not_after: Some(Utc::now() - Duration::seconds(1)),
        });

        assert_eq!(
            store.encrypt_string_to_server("x").unwrap_err().kind(),
            ErrorKind::OutOfValidPeriod
        );
        assert_eq!(store.put_string("v", "k").unwrap_err().kind(), ErrorKind::OutOfValidPeriod);
        assert_eq!(store.wb_encrypt_string("x").unwrap_err().kind(), ErrorKind::OutOfValidPeriod);
        // Diagnostics stay available
        assert!(!store.sdk_version().is_empty());
    }

    #[test]
    fn test_jailbreak_is_advisory() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("Cydia.app");
        std::fs::create_dir(&artifact).unwrap();

        let store = SecureStore::open(config(&dir))
            .unwrap()
            .with_detector(JailbreakDetector::empty().with_path(&artifact));

        assert!(store.is_jailbreak());
        assert_eq!(store.jailbreak_report().signals.len(), 1);
        store.put_string("still works", "k").unwrap();
        assert_eq!(store.get_string("k").unwrap(), "still works");
    }
}
