//! # Secure Kit
//!
//! Client-side security toolkit for mobile applications.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       SECURE KIT                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  TRANSPORT  │  │ LOCAL STORE │  │   WHITE-BOX     │  │
//! │  │ AES-256-GCM │  │  XChaCha20  │  │ masked XChaCha  │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │     APP KEY → HKDF → K_transport / K_wb / K_store   │ │
//! │  │     KEYSTORE: Argon2id(app key ‖ device) wraps K    │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! │                                                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │   LICENSE   │  │  JAILBREAK  │  │   JNI / CLI     │  │
//! │  │ bundle+time │  │  DETECTION  │  │                 │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Server envelopes authenticated with AES-256-GCM, bound to the bundle id
//! - Per-entry keys derived via HKDF, entry names hidden behind HMAC
//! - Storage master key wrapped under an Argon2id KEK bound to the device
//! - Zero plaintext on disk
//! - RAM zeroized after use

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod keystore;
pub mod secure_fs;
pub mod store;
pub mod transport;
pub mod whitebox;

#[cfg(feature = "android")]
pub mod android;

pub use api::SecureStore;
pub use config::{KitConfig, LicenseConfig};
pub use crypto::{KdfConfig, KitKey};
pub use error::{ErrorKind, KitError, KitResult};
pub use integrity::{JailbreakDetector, JailbreakReport, RiskSignal};
pub use store::{EntryKind, StoredEntry};
pub use transport::TransportCipher;
pub use whitebox::WhiteBoxCipher;

/// Secure Kit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
