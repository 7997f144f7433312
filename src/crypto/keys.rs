//! Secure Kit - Key Management
//!
//! Every key used by the kit descends from one of two roots: the
//! application key shared with the server, or the storage master key
//! unwrapped from the on-device keystore.

use base64::{engine::general_purpose, Engine as _};
use hkdf::Hkdf;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::error::{KitError, KitResult};

/// Key length for AES-256 / XChaCha20
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Nonce length for XChaCha20
pub const XCHACHA_NONCE_LEN: usize = 24;

/// Authentication tag length (both ciphers)
pub const TAG_LEN: usize = 16;

/// HKDF info strings for key separation
pub mod contexts {
    /// Transport envelope key (shared with the server)
    pub const TRANSPORT: &[u8] = b"securekit:transport:v1";

    /// Masked-key cipher
    pub const WHITEBOX: &[u8] = b"securekit:whitebox:v1";

    /// Entry file name MAC key
    pub const INDEX: &[u8] = b"securekit:index:v1";

    /// Root of per-entry keys
    pub const ENTRIES: &[u8] = b"securekit:entries:v1";

    /// Per-entry key derivation
    pub const ENTRY_KEY: &[u8] = b"securekit:entry:v1";
}

/// Secret key wrapper, zeroized on drop
pub struct KitKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl KitKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = zeroize::Zeroizing::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self::new(*bytes)
    }

    /// Parse a base64-encoded 32-byte key
    pub fn from_base64(encoded: &str) -> KitResult<Self> {
        let decoded = zeroize::Zeroizing::new(
            general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| KitError::Key(format!("app key is not base64: {}", e)))?,
        );
        if decoded.len() != KEY_LEN {
            return Err(KitError::Key(format!(
                "app key must be {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }
        let mut bytes = zeroize::Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self::new(*bytes))
    }

    /// Base64 form, for provisioning
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.expose())
    }
}

impl Clone for KitKey {
    fn clone(&self) -> Self {
        Self::new(*self.expose())
    }
}

impl std::fmt::Debug for KitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KitKey([REDACTED])")
    }
}

/// Keys of the local store, derived from the storage master key
pub struct StorageKeys {
    /// MAC key for entry file names
    index_key: KitKey,

    /// Root for per-entry keys
    entries_key: KitKey,
}

impl StorageKeys {
    /// Derive the storage hierarchy from the unwrapped master key
    pub fn from_master(master: &KitKey) -> KitResult<Self> {
        let index_key = derive_key(master.expose(), b"index", contexts::INDEX)?;
        let entries_key = derive_key(master.expose(), b"entries", contexts::ENTRIES)?;

        Ok(Self {
            index_key,
            entries_key,
        })
    }

    pub fn index_key(&self) -> &KitKey {
        &self.index_key
    }

    /// Derive the key protecting one entry
    pub fn derive_entry_key(&self, entry: &str) -> KitResult<KitKey> {
        derive_key(self.entries_key.expose(), entry.as_bytes(), contexts::ENTRY_KEY)
    }
}

/// Derive a key using HKDF-SHA256
pub fn derive_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> KitResult<KitKey> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = zeroize::Zeroizing::new([0u8; KEY_LEN]);

    hk.expand(info, &mut okm[..])
        .map_err(|e| KitError::Key(format!("HKDF expand: {}", e)))?;

    Ok(KitKey::new(*okm))
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Generate a random nonce for XChaCha20
pub fn generate_xchacha_nonce() -> [u8; XCHACHA_NONCE_LEN] {
    let mut nonce = [0u8; XCHACHA_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
