//! Authenticated sealing of kind-tagged plaintexts.
//!
//! # Sealing
//!
//! To seal a plaintext `m` of kind `k`:
//! 1. Sample a random 96-bit nonce
//! 2. Encrypt `m` with AES-256-GCM under the cipher key, binding `k`'s tag as
//!    associated data so a ciphertext cannot be reinterpreted as another kind
//! 3. Split the AEAD output into payload and tag
//!
//! # Attestation
//!
//! An input proof is HMAC-SHA256 over `domain || tag(k) || nonce || payload || tag`
//! under a separate attestation key. Only the holder of the sealing key can
//! produce one, so a verified proof shows the ciphertext came from `seal`.
//!
//! Both keys are derived from a single seed with HKDF-SHA256.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use auction_types::{CipherKind, Ciphertext, InputProof, Plaintext};

use crate::error::CryptoError;

const CIPHER_KEY_INFO: &[u8] = b"SEALED-BID-CIPHER-KEY-V1";
const ATTEST_KEY_INFO: &[u8] = b"SEALED-BID-ATTEST-KEY-V1";
const ATTEST_DOMAIN: &[u8] = b"SEALED-BID-INPUT-PROOF-V1";

type HmacSha256 = Hmac<Sha256>;

/// Minimum seed length accepted by [`SealingKey::derive`].
pub const MIN_SEED_LEN: usize = 32;

/// Symmetric key material held by a confidential value backend.
#[derive(Clone)]
pub struct SealingKey {
    cipher_key: [u8; 32],
    attest_key: [u8; 32],
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey").finish_non_exhaustive()
    }
}

impl SealingKey {
    /// Derive both keys from a seed.
    pub fn derive(seed: &[u8]) -> Result<Self, CryptoError> {
        if seed.len() < MIN_SEED_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "seed must be at least {} bytes, got {}",
                MIN_SEED_LEN,
                seed.len()
            )));
        }

        let hk = Hkdf::<Sha256>::new(None, seed);
        let mut cipher_key = [0u8; 32];
        hk.expand(CIPHER_KEY_INFO, &mut cipher_key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        let mut attest_key = [0u8; 32];
        hk.expand(ATTEST_KEY_INFO, &mut attest_key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(Self {
            cipher_key,
            attest_key,
        })
    }

    /// Generate a fresh key from a random seed.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut seed = [0u8; MIN_SEED_LEN];
        rng.fill_bytes(&mut seed);
        Self::derive(&seed)
    }

    /// Seal a plaintext under a fresh nonce.
    pub fn seal<R: RngCore + CryptoRng>(
        &self,
        plaintext: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext, CryptoError> {
        let kind = plaintext.kind();

        let mut nonce_bytes = [0u8; 12];
        rng.fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.cipher_key).map_err(|e| {
            CryptoError::EncryptionFailed(format!("Failed to create cipher: {}", e))
        })?;

        let aad = [kind.tag()];
        let msg = plaintext.to_bytes();
        let ciphertext_with_tag = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &msg,
                    aad: &aad,
                },
            )
            .map_err(|e| {
                CryptoError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e))
            })?;

        // Split ciphertext and tag
        let tag_start = ciphertext_with_tag.len() - 16;
        let payload = ciphertext_with_tag[..tag_start].to_vec();
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

        Ok(Ciphertext {
            kind,
            nonce: nonce_bytes,
            payload,
            tag,
        })
    }

    /// Open a ciphertext, checking its kind binding.
    pub fn open(&self, ciphertext: &Ciphertext) -> Result<Plaintext, CryptoError> {
        if ciphertext.payload.len() != ciphertext.kind.plaintext_len() {
            return Err(CryptoError::InvalidCiphertextFormat);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.cipher_key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        // Reconstruct ciphertext with tag for decryption
        let mut ct_with_tag = ciphertext.payload.clone();
        ct_with_tag.extend_from_slice(&ciphertext.tag);

        let aad = [ciphertext.kind.tag()];
        let bytes = cipher
            .decrypt(
                Nonce::from_slice(&ciphertext.nonce),
                Payload {
                    msg: &ct_with_tag,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        Plaintext::from_bytes(ciphertext.kind, &bytes).ok_or(CryptoError::InvalidCiphertextFormat)
    }

    /// Open a ciphertext that must be of `expected` kind.
    pub fn open_as(
        &self,
        ciphertext: &Ciphertext,
        expected: CipherKind,
    ) -> Result<Plaintext, CryptoError> {
        if ciphertext.kind != expected {
            return Err(CryptoError::KindMismatch {
                expected,
                got: ciphertext.kind,
            });
        }
        self.open(ciphertext)
    }

    /// Produce the input proof for a ciphertext.
    pub fn attest(&self, ciphertext: &Ciphertext) -> Result<InputProof, CryptoError> {
        let mac = self.attestation_mac(ciphertext)?.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac);
        Ok(InputProof(out))
    }

    /// Check an input proof in constant time.
    pub fn verify_attestation(
        &self,
        ciphertext: &Ciphertext,
        proof: &InputProof,
    ) -> Result<(), CryptoError> {
        self.attestation_mac(ciphertext)?
            .verify_slice(&proof.0)
            .map_err(|_| CryptoError::InvalidInputProof)
    }

    fn attestation_mac(&self, ciphertext: &Ciphertext) -> Result<HmacSha256, CryptoError> {
        // Both `KeyInit` and `Mac` provide `new_from_slice`
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.attest_key)
            .map_err(|e| CryptoError::InvalidKeyMaterial(e.to_string()))?;
        mac.update(ATTEST_DOMAIN);
        mac.update(&[ciphertext.kind.tag()]);
        mac.update(&ciphertext.nonce);
        mac.update(&ciphertext.payload);
        mac.update(&ciphertext.tag);
        Ok(mac)
    }
}
