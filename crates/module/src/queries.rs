//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state. Every snapshot
//! is taken under the auction's slot lock, so the encrypted pair is never torn.

use serde::{Deserialize, Serialize};

use auction_types::{
    Address, AssetRef, AuctionId, AuctionInfo, AuctionState, EncryptedAuctionData,
    SequencedEvent,
};

use crate::engine::AuctionEngine;
use crate::handlers::HandlerResult;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: AuctionId },

    /// Whether `bidder` has a bid in the auction.
    HasBid {
        auction_id: AuctionId,
        bidder: Address,
    },

    /// Total auctions ever created.
    Counter,

    /// The still-encrypted running maximum and its owner.
    GetEncryptedAuctionData { auction_id: AuctionId },

    /// Get all auctions (paginated).
    ListAuctions { offset: u64, limit: u64 },

    /// Auctions currently accepting bids.
    ActiveAuctions,

    /// Active auctions whose end time has passed.
    PendingEnd,

    /// Ended auctions awaiting settlement.
    PendingSettlement,

    /// Get user's withdrawable balance.
    Withdrawable { address: Address },

    /// Events from a sequence number on.
    EventsSince { sequence: u64 },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    Auction(AuctionInfo),
    HasBid(bool),
    Counter(u64),
    EncryptedData(EncryptedAuctionData),
    AuctionList(Vec<AuctionSummary>),
    Withdrawable(u64),
    Events(Vec<SequencedEvent>),
}

/// Handle a query.
pub fn handle_query(
    engine: &AuctionEngine,
    query: AuctionQuery,
) -> HandlerResult<AuctionQueryResponse> {
    let response = match query {
        AuctionQuery::GetAuction { auction_id } => {
            AuctionQueryResponse::Auction(engine.get_auction(auction_id)?)
        }

        AuctionQuery::HasBid { auction_id, bidder } => {
            AuctionQueryResponse::HasBid(engine.has_bid(auction_id, &bidder)?)
        }

        AuctionQuery::Counter => AuctionQueryResponse::Counter(engine.counter()),

        AuctionQuery::GetEncryptedAuctionData { auction_id } => {
            AuctionQueryResponse::EncryptedData(engine.encrypted_auction_data(auction_id)?)
        }

        AuctionQuery::ListAuctions { offset, limit } => AuctionQueryResponse::AuctionList(
            get_auction_summaries(engine, offset as usize, limit as usize),
        ),

        AuctionQuery::ActiveAuctions => {
            AuctionQueryResponse::AuctionList(get_active_auctions(engine, engine.now()))
        }

        AuctionQuery::PendingEnd => {
            AuctionQueryResponse::AuctionList(get_pending_end(engine, engine.now()))
        }

        AuctionQuery::PendingSettlement => {
            AuctionQueryResponse::AuctionList(get_pending_settlement(engine))
        }

        AuctionQuery::Withdrawable { address } => {
            AuctionQueryResponse::Withdrawable(engine.withdrawable(&address))
        }

        AuctionQuery::EventsSince { sequence } => {
            AuctionQueryResponse::Events(engine.events_since(sequence))
        }
    };
    Ok(response)
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: AuctionId,
    pub asset: AssetRef,
    pub creator: Address,
    pub reserve_price: u64,
    pub state: AuctionState,
    pub end_time: u64,
    pub bid_count: u64,
    pub winner: Option<Address>,
}

impl AuctionSummary {
    pub fn from_info(info: &AuctionInfo) -> Self {
        Self {
            auction_id: info.auction_id,
            asset: info.asset,
            creator: info.creator,
            reserve_price: info.reserve_price,
            state: info.state,
            end_time: info.end_time,
            bid_count: info.bid_count,
            winner: info.winner(),
        }
    }
}

fn summaries(engine: &AuctionEngine, keep: impl Fn(&AuctionInfo) -> bool) -> Vec<AuctionSummary> {
    engine
        .list_auctions()
        .iter()
        .filter(|info| keep(info))
        .map(AuctionSummary::from_info)
        .collect()
}

/// Get auction summaries for listing, in ascending id order.
pub fn get_auction_summaries(
    engine: &AuctionEngine,
    offset: usize,
    limit: usize,
) -> Vec<AuctionSummary> {
    engine
        .list_auctions()
        .iter()
        .skip(offset)
        .take(limit)
        .map(AuctionSummary::from_info)
        .collect()
}

/// Get active auctions (currently accepting bids).
pub fn get_active_auctions(engine: &AuctionEngine, current_time: u64) -> Vec<AuctionSummary> {
    summaries(engine, |info| {
        info.state == AuctionState::Active && current_time < info.end_time
    })
}

/// Get auctions that have expired but not been ended.
pub fn get_pending_end(engine: &AuctionEngine, current_time: u64) -> Vec<AuctionSummary> {
    summaries(engine, |info| {
        info.state == AuctionState::Active && current_time >= info.end_time
    })
}

/// Get auctions waiting for settlement.
pub fn get_pending_settlement(engine: &AuctionEngine) -> Vec<AuctionSummary> {
    summaries(engine, |info| info.state == AuctionState::Ended)
}
