//! Secure Kit - Cryptographic Core
//!
//! AEAD ciphers, HKDF key separation and the Argon2id key-encryption key.

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::*;
pub use kdf::*;
pub use keys::*;
