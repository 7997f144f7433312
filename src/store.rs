//! Secure Kit - Local Encrypted Store
//!
//! One file per entry under `entries/`, named by the HMAC of the caller
//! key so key names never reach the disk.
//!
//! Entry file:
//! ```text
//! [MAGIC 4B]["SKE1"]
//! [KIND 1B][0x01 string | 0x02 binary]
//! [NONCE 24B][random]
//! [CIPHERTEXT variable][XChaCha20-Poly1305, AAD = MAGIC || KIND || key]
//! [TAG 16B]
//! ```
//!
//! Writers of one key are serialized by a striped `RwLock`; the existence
//! check and the write happen under the same write guard. Readers only
//! take shared guards.

use parking_lot::RwLock;

use crate::crypto::{
    compute_hmac, decrypt_xchacha, encrypt_xchacha, AeadError, EncryptedData, StorageKeys, TAG_LEN,
    XCHACHA_NONCE_LEN,
};
use crate::error::{KitError, KitResult};
use crate::secure_fs::SecureFs;

pub const ENTRIES_DIR: &str = "entries";
pub const ENTRY_EXT: &str = "ske";

const ENTRY_MAGIC: &[u8; 4] = b"SKE1";
const HEADER_LEN: usize = ENTRY_MAGIC.len() + 1;
const MIN_ENTRY_LEN: usize = HEADER_LEN + XCHACHA_NONCE_LEN + TAG_LEN;
const LOCK_STRIPES: usize = 64;

/// Type tag of a stored value; strings and binaries share one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    String = 0x01,
    Binary = 0x02,
}

impl EntryKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::String),
            0x02 => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Decrypted entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub kind: EntryKind,
    pub value: Vec<u8>,
}

pub struct LocalStore {
    fs: SecureFs,
    keys: StorageKeys,
    stripes: Vec<RwLock<()>>,
}

impl LocalStore {
    pub fn new(fs: SecureFs, keys: StorageKeys) -> Self {
        Self {
            fs,
            keys,
            stripes: (0..LOCK_STRIPES).map(|_| RwLock::new(())).collect(),
        }
    }

    /// Store a new entry; fails if the key is present
    pub fn put(&self, key: &str, value: &[u8], kind: EntryKind) -> KitResult<()> {
        let slot = self.slot(key)?;
        let _guard = self.stripes[slot.stripe].write();

        if self.fs.exists(&slot.path) {
            return Err(KitError::KeyExists(key.to_string()));
        }

        let sealed = self.seal(key, value, kind)?;
        self.fs.write_file(&slot.path, &sealed)?;
        log::debug!("put entry {}", slot.short_name());
        Ok(())
    }

    /// Read and decrypt an entry
    pub fn get(&self, key: &str) -> KitResult<StoredEntry> {
        let slot = self.slot(key)?;
        let _guard = self.stripes[slot.stripe].read();

        let data = self
            .fs
            .read_file(&slot.path)?
            .ok_or_else(|| KitError::KeyDoesNotExist(key.to_string()))?;

        self.open_sealed(key, &data)
    }

    /// Replace an existing entry; fails if the key is absent
    pub fn update(&self, key: &str, value: &[u8], kind: EntryKind) -> KitResult<()> {
        let slot = self.slot(key)?;
        let _guard = self.stripes[slot.stripe].write();

        if !self.fs.exists(&slot.path) {
            return Err(KitError::KeyDoesNotExist(key.to_string()));
        }

        let sealed = self.seal(key, value, kind)?;
        self.fs.write_file(&slot.path, &sealed)?;
        log::debug!("updated entry {}", slot.short_name());
        Ok(())
    }

    /// Delete an entry; fails if the key is absent
    pub fn remove(&self, key: &str) -> KitResult<()> {
        let slot = self.slot(key)?;
        let _guard = self.stripes[slot.stripe].write();

        if !self.fs.delete_file(&slot.path)? {
            return Err(KitError::KeyDoesNotExist(key.to_string()));
        }

        log::debug!("removed entry {}", slot.short_name());
        Ok(())
    }

    pub fn contains(&self, key: &str) -> KitResult<bool> {
        let slot = self.slot(key)?;
        let _guard = self.stripes[slot.stripe].read();
        Ok(self.fs.exists(&slot.path))
    }

    /// Number of entries on disk
    pub fn entry_count(&self) -> KitResult<usize> {
        Ok(self.fs.list_files(ENTRIES_DIR, ENTRY_EXT)?.len())
    }

    fn slot(&self, key: &str) -> KitResult<Slot> {
        if key.is_empty() {
            return Err(KitError::InvalidParameter("key is empty".into()));
        }

        let digest = compute_hmac(self.keys.index_key(), key.as_bytes())
            .map_err(|e| KitError::DataEncryptDecrypt(format!("entry name: {}", e)))?;
        let name = hex::encode(digest);

        Ok(Slot {
            stripe: digest[0] as usize % LOCK_STRIPES,
            path: format!("{}/{}.{}", ENTRIES_DIR, name, ENTRY_EXT),
            name,
        })
    }

    fn seal(&self, key: &str, value: &[u8], kind: EntryKind) -> KitResult<Vec<u8>> {
        let entry_key = self
            .keys
            .derive_entry_key(key)
            .map_err(|e| KitError::DataEncryptDecrypt(e.to_string()))?;

        let encrypted = encrypt_xchacha(&entry_key, value, &entry_aad(kind, key))
            .map_err(|e| KitError::DataEncryptDecrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(HEADER_LEN + encrypted.nonce.len() + encrypted.ciphertext.len());
        sealed.extend_from_slice(ENTRY_MAGIC);
        sealed.push(kind as u8);
        sealed.extend_from_slice(&encrypted.to_bytes());
        Ok(sealed)
    }

    fn open_sealed(&self, key: &str, data: &[u8]) -> KitResult<StoredEntry> {
        if data.len() < MIN_ENTRY_LEN {
            return Err(KitError::FileOperation("entry file truncated".into()));
        }
        if &data[..ENTRY_MAGIC.len()] != ENTRY_MAGIC {
            return Err(KitError::FileOperation("entry file has bad magic".into()));
        }
        let kind = EntryKind::from_byte(data[ENTRY_MAGIC.len()])
            .ok_or_else(|| KitError::FileOperation("entry file has unknown kind".into()))?;

        let encrypted = EncryptedData::from_bytes_xchacha(&data[HEADER_LEN..])
            .map_err(|e| KitError::FileOperation(e.to_string()))?;

        let entry_key = self
            .keys
            .derive_entry_key(key)
            .map_err(|e| KitError::DataEncryptDecrypt(e.to_string()))?;

        let value = decrypt_xchacha(&entry_key, &encrypted, &entry_aad(kind, key)).map_err(|e| {
            if e == AeadError::Authentication {
                log::warn!("entry failed authentication");
            }
            KitError::DataEncryptDecrypt(e.to_string())
        })?;

        Ok(StoredEntry { kind, value })
    }
}

struct Slot {
    stripe: usize,
    path: String,
    name: String,
}

impl Slot {
    fn short_name(&self) -> &str {
        &self.name[..8]
    }
}

fn entry_aad(kind: EntryKind, key: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(HEADER_LEN + key.len());
    aad.extend_from_slice(ENTRY_MAGIC);
    aad.push(kind as u8);
    aad.extend_from_slice(key.as_bytes());
    aad
}
