//! Call handlers for the auction module.
//!
//! These functions route a decoded [`AuctionCall`] to the engine.

use auction_types::{Address, AuctionId, SettlementOutcome};

use crate::call::AuctionCall;
use crate::engine::AuctionEngine;
use crate::error::AuctionError;

/// Context provided by the runtime for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Value attached to the call (bid collateral)
    pub value: u64,
}

impl CallContext {
    pub fn new(sender: Address) -> Self {
        Self { sender, value: 0 }
    }

    pub fn with_value(sender: Address, value: u64) -> Self {
        Self { sender, value }
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// What a successful call produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    AuctionCreated(AuctionId),
    BidPlaced,
    AuctionEnded,
    AuctionSettled(SettlementOutcome),
    Withdrawn(u64),
}

/// Route a call to the engine on behalf of `ctx.sender`.
pub fn dispatch(
    engine: &AuctionEngine,
    ctx: &CallContext,
    call: AuctionCall,
) -> HandlerResult<CallOutcome> {
    match call {
        AuctionCall::CreateAuction {
            asset,
            reserve_price,
            duration,
        } => engine
            .create_auction(ctx.sender, asset, reserve_price, duration)
            .map(CallOutcome::AuctionCreated),

        AuctionCall::PlaceBid {
            auction_id,
            encrypted_bid,
            proof,
        } => engine
            .place_bid(ctx.sender, auction_id, encrypted_bid, proof, ctx.value)
            .map(|()| CallOutcome::BidPlaced),

        AuctionCall::EndAuction { auction_id } => engine
            .end_auction(auction_id)
            .map(|()| CallOutcome::AuctionEnded),

        AuctionCall::SettleAuction { auction_id } => engine
            .settle_auction(auction_id)
            .map(CallOutcome::AuctionSettled),

        AuctionCall::Withdraw => engine.withdraw(ctx.sender).map(CallOutcome::Withdrawn),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::confidential::SealedBackend;
    use crate::custody::InMemoryCustody;
    use crate::genesis::DefaultAuctionParams;

    const CREATOR: Address = [1u8; 32];
    const BIDDER: Address = [2u8; 32];

    #[test]
    fn test_dispatch_encoded_calls() {
        let custody = Arc::new(InMemoryCustody::new([9u8; 32]));
        let clock = Arc::new(ManualClock::new(1000));
        let engine = AuctionEngine::new(
            custody.clone(),
            Arc::new(SealedBackend::from_seed(&[61u8; 32]).unwrap()),
            clock.clone(),
            DefaultAuctionParams::default(),
        );
        let asset = custody.asset(custody.mint(CREATOR, "uri"));

        let create = AuctionCall::CreateAuction {
            asset,
            reserve_price: 100,
            duration: 600,
        };
        let decoded = AuctionCall::decode(&create.encode()).unwrap();
        assert_eq!(decoded, create);

        let outcome = dispatch(&engine, &CallContext::new(CREATOR), decoded).unwrap();
        assert_eq!(outcome, CallOutcome::AuctionCreated(0));

        let (encrypted_bid, proof) = engine.confidential().encrypt_u64(120).unwrap();
        let bid = AuctionCall::PlaceBid {
            auction_id: 0,
            encrypted_bid,
            proof,
        };
        // No collateral attached
        assert!(matches!(
            dispatch(&engine, &CallContext::new(BIDDER), bid.clone()),
            Err(AuctionError::InsufficientCollateral)
        ));
        assert_eq!(
            dispatch(&engine, &CallContext::with_value(BIDDER, 130), bid).unwrap(),
            CallOutcome::BidPlaced
        );

        clock.advance(600);
        let ctx = CallContext::new([7u8; 32]);
        dispatch(&engine, &ctx, AuctionCall::EndAuction { auction_id: 0 }).unwrap();
        let settled =
            dispatch(&engine, &ctx, AuctionCall::SettleAuction { auction_id: 0 }).unwrap();
        assert_eq!(
            settled,
            CallOutcome::AuctionSettled(SettlementOutcome::Sold {
                winner: BIDDER,
                winning_bid: 120
            })
        );

        assert_eq!(
            dispatch(&engine, &CallContext::new(BIDDER), AuctionCall::Withdraw).unwrap(),
            CallOutcome::Withdrawn(10)
        );
        assert!(matches!(
            dispatch(&engine, &CallContext::new(BIDDER), AuctionCall::Withdraw),
            Err(AuctionError::NothingToWithdraw)
        ));
    }

    #[test]
    fn test_malformed_call_bytes() {
        assert!(AuctionCall::decode(&[0xff, 0x01]).is_none());
    }
}
