//! Argon2id derivation of the keystore key-encryption key (KEK)

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::keys::{KitKey, KEY_LEN};
use crate::error::{KitError, KitResult};

/// Salt length stored in the keystore
pub const SALT_LEN: usize = 16;

/// Upper bounds accepted for stored cost parameters
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024; // 1 GiB
pub const MAX_ITERATIONS: u32 = 16;
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Memory in KiB
    pub memory_kib: u32,
    /// Iterations (time cost)
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024, // 64 MiB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfConfig {
    /// Configuration for low-end devices
    pub fn low_memory() -> Self {
        Self {
            memory_kib: 16 * 1024, // 16 MiB
            iterations: 4,
            parallelism: 1,
        }
    }

    /// Reject costs outside what any supported device can afford
    pub fn check_limits(&self) -> KitResult<()> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(KitError::Key(format!(
                "Argon2 params out of range: m={} t={} p={}",
                self.memory_kib, self.iterations, self.parallelism
            )));
        }
        Ok(())
    }
}

/// Derive the KEK from the app key bound to a device identifier
pub fn derive_kek(app_key: &KitKey, device_id: &str, salt: &[u8], config: &KdfConfig) -> KitResult<KitKey> {
    config.check_limits()?;

    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| KitError::Key(format!("invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut input = Zeroizing::new(Vec::with_capacity(KEY_LEN + device_id.len()));
    input.extend_from_slice(app_key.expose());
    input.extend_from_slice(device_id.as_bytes());

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(&input, salt, &mut output[..])
        .map_err(|e| KitError::Key(format!("Argon2 derive: {}", e)))?;

    Ok(KitKey::new(*output))
}

/// Generate a random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfConfig {
        KdfConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_derive_kek_deterministic() {
        let app = KitKey::new([3u8; KEY_LEN]);
        let salt = [1u8; SALT_LEN];

        let k1 = derive_kek(&app, "device-a", &salt, &cheap()).unwrap();
        let k2 = derive_kek(&app, "device-a", &salt, &cheap()).unwrap();
        assert_eq!(k1.expose(), k2.expose());
    }

    #[test]
    fn test_kek_bound_to_device() {
        let app = KitKey::new([3u8; KEY_LEN]);
        let salt = generate_salt();

        let k1 = derive_kek(&app, "device-a", &salt, &cheap()).unwrap();
        let k2 = derive_kek(&app, "device-b", &salt, &cheap()).unwrap();
        assert_ne!(k1.expose(), k2.expose());
    }

    #[test]
    fn test_invalid_params_is_key_error() {
        let app = KitKey::new([3u8; KEY_LEN]);
        let bad = KdfConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        };
        let err = derive_kek(&app, "d", &[0u8; SALT_LEN], &bad).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Key);
    }

    #[test]
    fn test_limits() {
        assert!(KdfConfig::default().check_limits().is_ok());
        assert!(KdfConfig::low_memory().check_limits().is_ok());

        let huge = KdfConfig {
            memory_kib: u32::MAX,
            ..cheap()
        };
        assert_eq!(huge.check_limits().unwrap_err().kind(), crate::ErrorKind::Key);

        let slow = KdfConfig {
            iterations: MAX_ITERATIONS + 1,
            ..cheap()
        };
        let app = KitKey::new([3u8; KEY_LEN]);
        let err = derive_kek(&app, "d", &[0u8; SALT_LEN], &slow).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Key);
    }
}
