//! Secure Kit - Configuration & License
//!
//! `KitConfig` is read from JSON (or built in code) once at startup and
//! handed to [`crate::SecureStore::open`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{KdfConfig, KitKey};
use crate::error::{KitError, KitResult};

/// License restricting where and when the kit may run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Bundle identifier the license was issued for
    pub bundle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
}

impl LicenseConfig {
    /// Check the license against the running bundle at the given instant
    pub fn check(&self, bundle_id: &str, now: DateTime<Utc>) -> KitResult<()> {
        if self.bundle_id != bundle_id {
            return Err(KitError::BundleIdMismatch {
                expected: self.bundle_id.clone(),
                actual: bundle_id.to_string(),
            });
        }

        if let Some(start) = self.not_before {
            if now < start {
                return Err(KitError::OutOfValidPeriod(format!(
                    "license valid from {}",
                    start.to_rfc3339()
                )));
            }
        }

        if let Some(end) = self.not_after {
            if now > end {
                return Err(KitError::OutOfValidPeriod(format!(
                    "license expired at {}",
                    end.to_rfc3339()
                )));
            }
        }

        Ok(())
    }
}

/// Kit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitConfig {
    /// Identifier of the running application
    pub bundle_id: String,
    /// Base64 32-byte application secret shared with the server
    pub app_key: String,
    /// Directory of the local encrypted store
    pub store_dir: PathBuf,
    /// Device binding override; generated and persisted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseConfig>,
    #[serde(default)]
    pub kdf: KdfConfig,
}

impl KitConfig {
    pub fn new(bundle_id: impl Into<String>, app_key: impl Into<String>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            app_key: app_key.into(),
            store_dir: store_dir.into(),
            device_id: None,
            license: None,
            kdf: KdfConfig::default(),
        }
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> KitResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| KitError::FileOperation(format!("{}: {}", path.display(), e)))?;

        serde_json::from_slice(&data)
            .map_err(|e| KitError::InvalidParameter(format!("config {}: {}", path.display(), e)))
    }

    /// Write configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> KitResult<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| KitError::Unknown(format!("serialize config: {}", e)))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn with_license(mut self, license: LicenseConfig) -> Self {
        self.license = Some(license);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_kdf(mut self, kdf: KdfConfig) -> Self {
        self.kdf = kdf;
        self
    }

    /// Validate the license window for the current time
    pub fn check_license(&self) -> KitResult<()> {
        match &self.license {
            Some(license) => license.check(&self.bundle_id, Utc::now()),
            None => Ok(()),
        }
    }

    /// Validate the whole configuration and parse the app key
    pub fn validate(&self) -> KitResult<KitKey> {
        if self.bundle_id.trim().is_empty() {
            return Err(KitError::InvalidParameter("bundle_id is empty".into()));
        }
        if self.store_dir.as_os_str().is_empty() {
            return Err(KitError::InvalidParameter("store_dir is empty".into()));
        }
        if let Some(device_id) = &self.device_id {
            if device_id.trim().is_empty() {
                return Err(KitError::InvalidParameter("device_id is empty".into()));
            }
        }

        self.check_license()?;
        KitKey::from_base64(&self.app_key)
    }
}
