//! Call message types for the auction module.

use borsh::{BorshDeserialize, BorshSerialize};

use auction_types::{AssetRef, AuctionId, Ciphertext, InputProof};

/// Call messages for the auction module.
///
/// Collateral for a bid travels as the value attached to the call, see
/// [`crate::handlers::CallContext`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Create a new auction for an asset the sender owns.
    CreateAuction {
        asset: AssetRef,
        reserve_price: u64,
        duration: u64,
    },

    /// Submit a sealed bid.
    PlaceBid {
        auction_id: AuctionId,
        encrypted_bid: Ciphertext,
        proof: InputProof,
    },

    /// Close bidding once the end time has passed (permissionless).
    EndAuction { auction_id: AuctionId },

    /// Disclose the winner and settle asset and escrow (permissionless).
    SettleAuction { auction_id: AuctionId },

    // === Funds ===
    /// Withdraw the sender's refunds and proceeds.
    Withdraw,
}

impl AuctionCall {
    pub fn encode(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}
