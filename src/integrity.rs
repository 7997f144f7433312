//! Secure Kit - Jailbreak Detection
//!
//! Best-effort scan for a compromised device. The result is advisory and
//! never gates store or cipher operations.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const PROBE_FILE: &str = ".securekit_probe";

#[cfg(target_os = "ios")]
const DEFAULT_PATHS: &[&str] = &[
    "/Applications/Cydia.app",
    "/Applications/Sileo.app",
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/bin/bash",
    "/usr/sbin/sshd",
    "/usr/bin/ssh",
    "/etc/apt",
    "/private/var/lib/apt",
    "/var/jb",
];

#[cfg(target_os = "ios")]
const DEFAULT_PROBE_DIR: Option<&str> = Some("/private");

#[cfg(target_os = "android")]
const DEFAULT_PATHS: &[&str] = &[
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/data/local/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/sbin/.magisk",
    "/data/adb/magisk",
];

#[cfg(target_os = "android")]
const DEFAULT_PROBE_DIR: Option<&str> = Some("/system");

#[cfg(not(any(target_os = "ios", target_os = "android")))]
const DEFAULT_PATHS: &[&str] = &[];

#[cfg(not(any(target_os = "ios", target_os = "android")))]
const DEFAULT_PROBE_DIR: Option<&str> = None;

const INJECTION_VARS: &[&str] = &["DYLD_INSERT_LIBRARIES", "LD_PRELOAD", "FRIDA_SESSION_ID"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub name: String,
    pub description: String,
    pub score: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JailbreakReport {
    pub signals: Vec<RiskSignal>,
}

impl JailbreakReport {
    pub fn is_jailbroken(&self) -> bool {
        !self.signals.is_empty()
    }

    pub fn total_score(&self) -> u32 {
        self.signals.iter().map(|s| s.score).sum()
    }
}

/// Indicators to look for
#[derive(Debug, Clone)]
pub struct JailbreakDetector {
    paths: Vec<PathBuf>,
    env_vars: Vec<String>,
    probe_dir: Option<PathBuf>,
}

impl Default for JailbreakDetector {
    /// Indicators of the target platform plus injection variables
    fn default() -> Self {
        Self {
            paths: DEFAULT_PATHS.iter().map(PathBuf::from).collect(),
            env_vars: INJECTION_VARS.iter().map(|v| v.to_string()).collect(),
            probe_dir: DEFAULT_PROBE_DIR.map(PathBuf::from),
        }
    }
}

impl JailbreakDetector {
    /// Detector with no indicators
    pub fn empty() -> Self {
        Self {
            paths: Vec::new(),
            env_vars: Vec::new(),
            probe_dir: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_vars.push(name.into());
        self
    }

    /// Directory the app sandbox should not be able to write
    pub fn with_probe_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.probe_dir = Some(dir.into());
        self
    }

    pub fn scan(&self) -> JailbreakReport {
        let mut signals = Vec::new();

        for path in &self.paths {
            if path.exists() {
                signals.push(RiskSignal {
                    name: "jailbreak_artifact".into(),
                    description: format!("Jailbreak artifact present: {}", path.display()),
                    score: 50,
                });
            }
        }

        for var in &self.env_vars {
            if std::env::var_os(var).is_some() {
                signals.push(RiskSignal {
                    name: format!("env_{}", var.to_lowercase()),
                    description: format!("Suspicious env var detected: {}", var),
                    score: 80,
                });
            }
        }

        if let Some(dir) = &self.probe_dir {
            if probe_writable(dir) {
                signals.push(RiskSignal {
                    name: "sandbox_escape".into(),
                    description: format!("Protected directory is writable: {}", dir.display()),
                    score: 60,
                });
            }
        }

        for signal in &signals {
            log::warn!("integrity signal {}: {}", signal.name, signal.description);
        }

        JailbreakReport { signals }
    }

    pub fn is_jailbroken(&self) -> bool {
        self.scan().is_jailbroken()
    }
}

fn probe_writable(dir: &Path) -> bool {
    let probe = dir.join(PROBE_FILE);
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_clean_device() {
        let dir = tempdir().unwrap();
        let detector = JailbreakDetector::empty().with_path(dir.path().join("Cydia.app"));

        let report = detector.scan();
        assert!(!report.is_jailbroken());
        assert_eq!(report.total_score(), 0);
    }

    #[test]
    fn test_artifact_detected() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("su");
        std::fs::write(&artifact, b"").unwrap();

        let detector = JailbreakDetector::empty()
            .with_path(dir.path().join("missing"))
            .with_path(&artifact);
        let report = detector.scan();

        assert!(report.is_jailbroken());
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].name, "jailbreak_artifact");
        assert!(detector.is_jailbroken());
    }

    #[test]
    fn test_writable_probe_detected() {
        let dir = tempdir().unwrap();
        let report = JailbreakDetector::empty().with_probe_dir(dir.path()).scan();

        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].name, "sandbox_escape");
        // Probe cleans up after itself
        assert!(!dir.path().join(PROBE_FILE).exists());
    }

    #[test]
    fn test_missing_probe_dir_is_clean() {
        let dir = tempdir().unwrap();
        let report = JailbreakDetector::empty()
            .with_probe_dir(dir.path().join("does-not-exist"))
            .scan();
        assert!(!report.is_jailbroken());
    }

    #[test]
    fn test_env_var_detected() {
        let var = "SECUREKIT_TEST_INJECTION_MARKER";
        std::env::set_var(var, "1");
        let report = JailbreakDetector::empty().with_env_var(var).scan();
        std::env::remove_var(var);

        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].name, "env_securekit_test_injection_marker");
        assert_eq!(report.total_score(), 80);
    }
}
