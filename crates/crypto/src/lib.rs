//! Sealing primitives for confidential auction values.
//!
//! This crate implements the key material and authenticated encryption behind
//! the auction engine's confidential value backend.
//!
//! # Overview
//!
//! The backend follows a sealed-coprocessor model:
//!
//! 1. **Setup**: A sealing key is derived from a seed with HKDF-SHA256. It is
//!    held only by the backend, never by the engine or its callers.
//!
//! 2. **Encryption**: Plaintexts are sealed with AES-256-GCM. The value's kind
//!    (integer, boolean, address) is bound as associated data.
//!
//! 3. **Input proofs**: Each sealed input carries an HMAC-SHA256 attestation
//!    that the engine checks before accepting the ciphertext.
//!
//! 4. **Computation**: Comparisons and selections open their inputs inside the
//!    backend and reseal the result under a fresh nonce, so outputs cannot be
//!    linked to inputs.

pub mod error;
pub mod sealing;

pub use error::CryptoError;
pub use sealing::{SealingKey, MIN_SEED_LEN};
