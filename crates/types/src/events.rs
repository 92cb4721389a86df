//! Events emitted by the auction engine.
//!
//! Events only ever carry public data. A bid event names the bidder but never
//! an amount; the settlement event is the first place a bid value appears.

use serde::{Deserialize, Serialize};

use crate::{Address, AssetRef, AuctionId, SettlementOutcome};

/// An auction lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionEvent {
    AuctionCreated {
        auction_id: AuctionId,
        asset: AssetRef,
        creator: Address,
        reserve_price: u64,
        end_time: u64,
    },
    BidPlaced {
        auction_id: AuctionId,
        bidder: Address,
    },
    AuctionEnded {
        auction_id: AuctionId,
        bid_count: u64,
    },
    AuctionSettled {
        auction_id: AuctionId,
        outcome: SettlementOutcome,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            AuctionEvent::AuctionCreated { auction_id, .. }
            | AuctionEvent::BidPlaced { auction_id, .. }
            | AuctionEvent::AuctionEnded { auction_id, .. }
            | AuctionEvent::AuctionSettled { auction_id, .. } => *auction_id,
        }
    }
}

/// An event with its position in the append-only log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub timestamp: u64,
    pub event: AuctionEvent,
}
