//! Confidential value contract and the sealed backend that implements it.
//!
//! The engine holds only ciphertexts. Every comparison and selection happens
//! behind this trait and yields a fresh ciphertext, so the engine never learns
//! which branch a selection took.
//!
//! Plaintext leaves the backend through exactly two doors, each guarded by a
//! grant type the caller cannot forge:
//! - [`ThresholdGrant`]: a boolean against a public threshold (reserve price,
//!   collateral), minted only by the bid ledger.
//! - [`DisclosureGrant`]: the final maximum and its owner, minted only by the
//!   settlement engine for an Ended auction.

use rand::rngs::OsRng;

use auction_crypto::{CryptoError, SealingKey};
use auction_types::{Address, CipherKind, Ciphertext, InputProof, Plaintext};

pub use crate::ledger::ThresholdGrant;
pub use crate::settlement::DisclosureGrant;

/// Encrypted arithmetic over opaque, kind-tagged ciphertexts.
pub trait ConfidentialValue: Send + Sync {
    /// Encrypt a plaintext and attest that it was honestly constructed.
    fn encrypt(&self, plaintext: Plaintext) -> Result<(Ciphertext, InputProof), CryptoError>;

    fn verify_proof(&self, ciphertext: &Ciphertext, proof: &InputProof) -> bool;

    /// Encrypted `a > b` over two integer ciphertexts.
    fn compare_greater(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError>;

    /// Encrypted `if cond { if_true } else { if_false }`.
    fn oblivious_select(
        &self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, CryptoError>;

    /// Disclose a boolean comparison against a public threshold.
    fn reveal_threshold(
        &self,
        grant: &ThresholdGrant,
        flag: &Ciphertext,
    ) -> Result<bool, CryptoError>;

    /// The privileged decryption used at settlement.
    fn decrypt(
        &self,
        grant: &DisclosureGrant,
        ciphertext: &Ciphertext,
    ) -> Result<Plaintext, CryptoError>;

    fn encrypt_u64(&self, value: u64) -> Result<(Ciphertext, InputProof), CryptoError> {
        self.encrypt(Plaintext::Uint64(value))
    }

    fn encrypt_address(&self, address: Address) -> Result<(Ciphertext, InputProof), CryptoError> {
        self.encrypt(Plaintext::Address(address))
    }
}

/// Sealed-coprocessor backend: one AES-GCM sealing key, never exported.
#[derive(Debug)]
pub struct SealedBackend {
    key: SealingKey,
}

impl SealedBackend {
    pub fn new(key: SealingKey) -> Self {
        Self { key }
    }

    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::new(SealingKey::derive(seed)?))
    }

    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self::new(SealingKey::generate(&mut OsRng)?))
    }

    fn seal(&self, plaintext: &Plaintext) -> Result<Ciphertext, CryptoError> {
        self.key.seal(plaintext, &mut OsRng)
    }

    fn open_u64(&self, ciphertext: &Ciphertext) -> Result<u64, CryptoError> {
        self.key
            .open_as(ciphertext, CipherKind::Uint64)?
            .as_u64()
            .ok_or(CryptoError::InvalidCiphertextFormat)
    }

    fn open_bool(&self, ciphertext: &Ciphertext) -> Result<bool, CryptoError> {
        self.key
            .open_as(ciphertext, CipherKind::Bool)?
            .as_bool()
            .ok_or(CryptoError::InvalidCiphertextFormat)
    }
}

impl ConfidentialValue for SealedBackend {
    fn encrypt(&self, plaintext: Plaintext) -> Result<(Ciphertext, InputProof), CryptoError> {
        let ciphertext = self.seal(&plaintext)?;
        let proof = self.key.attest(&ciphertext)?;
        Ok((ciphertext, proof))
    }

    fn verify_proof(&self, ciphertext: &Ciphertext, proof: &InputProof) -> bool {
        self.key.verify_attestation(ciphertext, proof).is_ok()
    }

    fn compare_greater(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let a = self.open_u64(a)?;
        let b = self.open_u64(b)?;
        self.seal(&Plaintext::Bool(a > b))
    }

    fn oblivious_select(
        &self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, CryptoError> {
        if if_true.kind != if_false.kind {
            return Err(CryptoError::KindMismatch {
                expected: if_true.kind,
                got: if_false.kind,
            });
        }
        let cond = self.open_bool(cond)?;
        // Both branches are opened so a malformed branch fails either way.
        let a = self.key.open(if_true)?;
        let b = self.key.open(if_false)?;
        self.seal(if cond { &a } else { &b })
    }

    fn reveal_threshold(
        &self,
        _grant: &ThresholdGrant,
        flag: &Ciphertext,
    ) -> Result<bool, CryptoError> {
        self.open_bool(flag)
    }

    fn decrypt(
        &self,
        _grant: &DisclosureGrant,
        ciphertext: &Ciphertext,
    ) -> Result<Plaintext, CryptoError> {
        self.key.open(ciphertext)
    }
}
