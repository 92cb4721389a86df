//! RPC-compatible types for the mock chain.
//!
//! These types are JSON-serializable versions of the core auction types.
//! Addresses are hex strings; ciphertexts travel as hex of their borsh encoding.

use serde::{Deserialize, Serialize};

use auction_module::AuctionSummary;
use auction_types::{
    AuctionEvent, AuctionInfo, AuctionState, Ciphertext, EncryptedAuctionData, InputProof,
    SequencedEvent, SettlementOutcome,
};

/// Parameters for creating an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    /// Token of the mock collection to auction
    pub token_id: u64,
    pub reserve_price: u64,
    /// Seconds until bidding closes
    pub duration: u64,
}

/// An encrypted bid and its input proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBidRpc {
    /// Hex-encoded borsh ciphertext
    pub ciphertext: String,
    /// Hex-encoded proof (32 bytes)
    pub proof: String,
}

impl EncryptedBidRpc {
    pub fn new(ciphertext: &Ciphertext, proof: &InputProof) -> Self {
        Self {
            ciphertext: hex::encode(ciphertext.to_bytes()),
            proof: hex::encode(proof.0),
        }
    }
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBidParams {
    pub sender: String,
    pub auction_id: u64,
    pub bid: EncryptedBidRpc,
    pub collateral: u64,
}

fn state_name(state: AuctionState) -> String {
    match state {
        AuctionState::Active => "active",
        AuctionState::Ended => "ended",
        AuctionState::Settled => "settled",
    }
    .to_string()
}

/// Auction snapshot for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionInfoRpc {
    pub auction_id: u64,
    pub custodian: String,
    pub token_id: u64,
    pub creator: String,
    pub reserve_price: u64,
    pub state: String,
    pub start_time: u64,
    pub end_time: u64,
    pub ended_at: Option<u64>,
    pub settled_at: Option<u64>,
    pub bid_count: u64,
    pub winner: Option<String>,
    pub winning_bid: Option<u64>,
}

impl From<AuctionInfo> for AuctionInfoRpc {
    fn from(a: AuctionInfo) -> Self {
        Self {
            auction_id: a.auction_id,
            custodian: hex::encode(a.asset.custodian),
            token_id: a.asset.token_id,
            creator: hex::encode(a.creator),
            reserve_price: a.reserve_price,
            state: state_name(a.state),
            start_time: a.start_time,
            end_time: a.end_time,
            ended_at: a.ended_at,
            settled_at: a.settled_at,
            bid_count: a.bid_count,
            winner: a.winner().map(hex::encode),
            winning_bid: a.winning_bid(),
        }
    }
}

/// Listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionSummaryRpc {
    pub auction_id: u64,
    pub token_id: u64,
    pub creator: String,
    pub reserve_price: u64,
    pub state: String,
    pub end_time: u64,
    pub bid_count: u64,
    pub winner: Option<String>,
}

impl From<AuctionSummary> for AuctionSummaryRpc {
    fn from(s: AuctionSummary) -> Self {
        Self {
            auction_id: s.auction_id,
            token_id: s.asset.token_id,
            creator: hex::encode(s.creator),
            reserve_price: s.reserve_price,
            state: state_name(s.state),
            end_time: s.end_time,
            bid_count: s.bid_count,
            winner: s.winner.map(hex::encode),
        }
    }
}

/// Settlement result for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRpc {
    pub auction_id: u64,
    pub sold: bool,
    pub winner: Option<String>,
    pub winning_bid: Option<u64>,
}

impl SettlementRpc {
    pub fn new(auction_id: u64, outcome: SettlementOutcome) -> Self {
        Self {
            auction_id,
            sold: matches!(outcome, SettlementOutcome::Sold { .. }),
            winner: outcome.winner().map(hex::encode),
            winning_bid: outcome.winning_bid(),
        }
    }
}

/// The still-encrypted running maximum pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedAuctionDataRpc {
    pub running_max: String,
    pub running_max_owner: String,
}

impl From<EncryptedAuctionData> for EncryptedAuctionDataRpc {
    fn from(d: EncryptedAuctionData) -> Self {
        Self {
            running_max: hex::encode(d.running_max.to_bytes()),
            running_max_owner: hex::encode(d.running_max_owner.to_bytes()),
        }
    }
}

/// Event log entry for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRpc {
    pub sequence: u64,
    pub timestamp: u64,
    pub auction_id: u64,
    /// "created", "bid_placed", "ended" or "settled"
    pub kind: String,
    /// Creator, bidder or winner, depending on `kind`
    pub account: Option<String>,
    /// Reserve price, bid count or winning bid, depending on `kind`
    pub value: Option<u64>,
}

impl From<SequencedEvent> for EventRpc {
    fn from(e: SequencedEvent) -> Self {
        let auction_id = e.event.auction_id();
        let (kind, account, value) = match e.event {
            AuctionEvent::AuctionCreated {
                creator,
                reserve_price,
                ..
            } => ("created", Some(hex::encode(creator)), Some(reserve_price)),
            AuctionEvent::BidPlaced { bidder, .. } => ("bid_placed", Some(hex::encode(bidder)), None),
            AuctionEvent::AuctionEnded { bid_count, .. } => ("ended", None, Some(bid_count)),
            AuctionEvent::AuctionSettled { outcome, .. } => (
                "settled",
                outcome.winner().map(hex::encode),
                outcome.winning_bid(),
            ),
        };
        Self {
            sequence: e.sequence,
            timestamp: e.timestamp,
            auction_id,
            kind: kind.to_string(),
            account,
            value,
        }
    }
}
