//! Core type definitions for sealed-bid confidential auctions.
//!
//! This crate provides the shared data structures used across the auction system,
//! including tagged ciphertexts, auction snapshots, settlement outcomes and events.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod events;

pub use events::{AuctionEvent, SequencedEvent};

// =========================
// IDENTITIES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// The address that stands for "no bidder yet".
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Auction identifier, assigned by the registry.
pub type AuctionId = u64;

/// Reference to an asset held by an external custodian.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct AssetRef {
    /// Address of the custodian (collection) holding the asset
    pub custodian: Address,
    /// Token identifier within the custodian
    pub token_id: u64,
}

// =========================
// CONFIDENTIAL VALUES
// =========================

/// Kind tag carried by every ciphertext.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum CipherKind {
    Uint64,
    Bool,
    Address,
}

impl CipherKind {
    /// Single-byte tag bound into the ciphertext as associated data.
    pub fn tag(&self) -> u8 {
        match self {
            CipherKind::Uint64 => 0x01,
            CipherKind::Bool => 0x02,
            CipherKind::Address => 0x03,
        }
    }

    /// Width of the plaintext encoding for this kind.
    pub fn plaintext_len(&self) -> usize {
        match self {
            CipherKind::Uint64 => 8,
            CipherKind::Bool => 1,
            CipherKind::Address => 32,
        }
    }
}

/// An opaque, kind-tagged encrypted value.
///
/// The engine only moves these around and hands them back to the
/// confidential value backend; it never inspects the payload.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Ciphertext {
    pub kind: CipherKind,

    /// Nonce for AEAD
    pub nonce: [u8; 12],

    /// Encrypted payload
    pub payload: Vec<u8>,

    /// Authentication tag
    pub tag: [u8; 16],
}

impl Ciphertext {
    /// Encode for transport.
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Decode from transport bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Attestation that a ciphertext was produced honestly by the backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct InputProof(pub [u8; 32]);

/// A decrypted value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plaintext {
    Uint64(u64),
    Bool(bool),
    Address(Address),
}

impl Plaintext {
    pub fn kind(&self) -> CipherKind {
        match self {
            Plaintext::Uint64(_) => CipherKind::Uint64,
            Plaintext::Bool(_) => CipherKind::Bool,
            Plaintext::Address(_) => CipherKind::Address,
        }
    }

    /// Fixed-width little-endian encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Plaintext::Uint64(v) => v.to_le_bytes().to_vec(),
            Plaintext::Bool(b) => vec![u8::from(*b)],
            Plaintext::Address(a) => a.to_vec(),
        }
    }

    /// Decode a plaintext of the given kind. Returns `None` on a width mismatch
    /// or a non-canonical boolean byte.
    pub fn from_bytes(kind: CipherKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != kind.plaintext_len() {
            return None;
        }
        match kind {
            CipherKind::Uint64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Some(Plaintext::Uint64(u64::from_le_bytes(buf)))
            }
            CipherKind::Bool => match bytes[0] {
                0 => Some(Plaintext::Bool(false)),
                1 => Some(Plaintext::Bool(true)),
                _ => None,
            },
            CipherKind::Address => {
                let mut addr = [0u8; 32];
                addr.copy_from_slice(bytes);
                Some(Plaintext::Address(addr))
            }
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Plaintext::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Plaintext::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Plaintext::Address(a) => Some(*a),
            _ => None,
        }
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Auction lifecycle state
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionState {
    /// Accepting bids until `end_time`
    Active,
    /// Bids frozen, awaiting settlement
    Ended,
    /// Terminal
    Settled,
}

/// How an auction settled.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum SettlementOutcome {
    /// Asset transferred to `winner`, who paid `winning_bid`
    Sold { winner: Address, winning_bid: u64 },
    /// No qualifying bid; asset released back to the creator
    NoSale,
}

impl SettlementOutcome {
    pub fn winner(&self) -> Option<Address> {
        match self {
            SettlementOutcome::Sold { winner, .. } => Some(*winner),
            SettlementOutcome::NoSale => None,
        }
    }

    pub fn winning_bid(&self) -> Option<u64> {
        match self {
            SettlementOutcome::Sold { winning_bid, .. } => Some(*winning_bid),
            SettlementOutcome::NoSale => None,
        }
    }
}

/// Public, read-only snapshot of an auction.
///
/// Never carries the encrypted running maximum; those are exposed through a
/// dedicated accessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInfo {
    pub auction_id: AuctionId,
    pub asset: AssetRef,
    pub creator: Address,
    pub reserve_price: u64,
    pub state: AuctionState,

    // Timing
    pub start_time: u64,
    pub end_time: u64,
    pub ended_at: Option<u64>,
    pub settled_at: Option<u64>,

    pub bid_count: u64,

    /// Present only once Settled
    pub outcome: Option<SettlementOutcome>,
}

impl AuctionInfo {
    pub fn winner(&self) -> Option<Address> {
        self.outcome.as_ref().and_then(SettlementOutcome::winner)
    }

    pub fn winning_bid(&self) -> Option<u64> {
        self.outcome.as_ref().and_then(SettlementOutcome::winning_bid)
    }
}

/// The two encrypted fields of an unsettled auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EncryptedAuctionData {
    pub running_max: Ciphertext,
    pub running_max_owner: Ciphertext,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Derive a deterministic address from a label. Handy for fixtures and tooling.
pub fn address_from_label(label: &str) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"AUCTION_ADDRESS_V1:");
    hasher.update(label.as_bytes());
    hasher.finalize().into()
}
