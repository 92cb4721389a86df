//! Error types for cryptographic operations.

use auction_types::CipherKind;
use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid ciphertext format")]
    InvalidCiphertextFormat,

    #[error("Invalid input proof")]
    InvalidInputProof,

    #[error("Ciphertext kind mismatch. Expected: {expected:?}, Got: {got:?}")]
    KindMismatch { expected: CipherKind, got: CipherKind },

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),
}
