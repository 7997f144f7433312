//! Secure Kit - Error Types
//!
//! Every fallible call reports one of thirteen stable error kinds. The kinds
//! and their integer codes are a closed set: callers branch on them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for kit operations
pub type KitResult<T> = Result<T, KitError>;

/// Closed set of error kinds with stable integer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorKind {
    InvalidParameter = 1,
    BundleIdMismatch = 2,
    Protocol = 3,
    InvalidServerData = 4,
    Unknown = 5,
    KeyExists = 6,
    KeyDoesNotExist = 7,
    FileOperation = 8,
    DataEncryptDecrypt = 9,
    Key = 10,
    OutOfValidPeriod = 11,
    WhiteBoxEncrypt = 12,
    WhiteBoxDecrypt = 13,
}

impl ErrorKind {
    /// All kinds, in code order
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::InvalidParameter,
        ErrorKind::BundleIdMismatch,
        ErrorKind::Protocol,
        ErrorKind::InvalidServerData,
        ErrorKind::Unknown,
        ErrorKind::KeyExists,
        ErrorKind::KeyDoesNotExist,
        ErrorKind::FileOperation,
        ErrorKind::DataEncryptDecrypt,
        ErrorKind::Key,
        ErrorKind::OutOfValidPeriod,
        ErrorKind::WhiteBoxEncrypt,
        ErrorKind::WhiteBoxDecrypt,
    ];

    /// Stable integer code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a kind by its integer code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::BundleIdMismatch => "bundle_id_mismatch",
            Self::Protocol => "protocol",
            Self::InvalidServerData => "invalid_server_data",
            Self::Unknown => "unknown",
            Self::KeyExists => "key_exists",
            Self::KeyDoesNotExist => "key_does_not_exist",
            Self::FileOperation => "file_operation",
            Self::DataEncryptDecrypt => "data_encrypt_decrypt",
            Self::Key => "key",
            Self::OutOfValidPeriod => "out_of_valid_period",
            Self::WhiteBoxEncrypt => "white_box_encrypt",
            Self::WhiteBoxDecrypt => "white_box_decrypt",
        }
    }
}

/// Kit error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KitError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Bundle identifier mismatch: licensed for {expected}, running as {actual}")]
    BundleIdMismatch { expected: String, actual: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server data failed integrity check - tampered or corrupted")]
    InvalidServerData,

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Key does not exist: {0}")]
    KeyDoesNotExist(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),

    #[error("Data encryption/decryption failed: {0}")]
    DataEncryptDecrypt(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Outside of valid period: {0}")]
    OutOfValidPeriod(String),

    #[error("White-box encryption failed: {0}")]
    WhiteBoxEncrypt(String),

    #[error("White-box decryption failed: {0}")]
    WhiteBoxDecrypt(String),
}

impl KitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KitError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            KitError::BundleIdMismatch { .. } => ErrorKind::BundleIdMismatch,
            KitError::Protocol(_) => ErrorKind::Protocol,
            KitError::InvalidServerData => ErrorKind::InvalidServerData,
            KitError::Unknown(_) => ErrorKind::Unknown,
            KitError::KeyExists(_) => ErrorKind::KeyExists,
            KitError::KeyDoesNotExist(_) => ErrorKind::KeyDoesNotExist,
            KitError::FileOperation(_) => ErrorKind::FileOperation,
            KitError::DataEncryptDecrypt(_) => ErrorKind::DataEncryptDecrypt,
            KitError::Key(_) => ErrorKind::Key,
            KitError::OutOfValidPeriod(_) => ErrorKind::OutOfValidPeriod,
            KitError::WhiteBoxEncrypt(_) => ErrorKind::WhiteBoxEncrypt,
            KitError::WhiteBoxDecrypt(_) => ErrorKind::WhiteBoxDecrypt,
        }
    }

    /// Stable integer code of this error's kind
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Deployment/environment violations and bad input never succeed on retry
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            KitError::BundleIdMismatch { .. }
                | KitError::OutOfValidPeriod(_)
                | KitError::InvalidParameter(_)
        )
    }

    /// Check if this error indicates tampered or corrupted ciphertext
    pub fn is_tamper_signal(&self) -> bool {
        matches!(
            self,
            KitError::InvalidServerData
                | KitError::DataEncryptDecrypt(_)
                | KitError::WhiteBoxEncrypt(_)
                | KitError::WhiteBoxDecrypt(_)
        )
    }
}

impl From<std::io::Error> for KitError {
    fn from(e: std::io::Error) -> Self {
        KitError::FileOperation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_header_order() {
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.code(), i as i32 + 1);
            assert_eq!(ErrorKind::from_code(kind.code()), Some(*kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(14), None);
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(KitError::InvalidServerData.code(), 4);
        assert_eq!(KitError::KeyDoesNotExist("k".into()).kind(), ErrorKind::KeyDoesNotExist);
        assert_eq!(KitError::WhiteBoxDecrypt("x".into()).code(), 13);
    }

    #[test]
    fn test_license_errors_not_retryable() {
        let mismatch = KitError::BundleIdMismatch {
            expected: "a".into(),
            actual: "b".into(),
        };
        assert!(!mismatch.is_retryable());
        assert!(!KitError::OutOfValidPeriod("expired".into()).is_retryable());
        assert!(KitError::FileOperation("busy".into()).is_retryable());
    }

    #[test]
    fn test_io_error_maps_to_file_operation() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(KitError::from(io).kind(), ErrorKind::FileOperation);
    }
}
