//! The auction engine: one registry, its collaborators and a clock.
//!
//! Every mutating operation locks the slot of the auction it touches, reads
//! the clock, runs the relevant lifecycle/ledger/settlement step and only then
//! announces the result on the event log. Operations on different auctions
//! never contend beyond the registry map itself.

use std::sync::Arc;

use tracing::{info, warn};

use auction_types::{
    Address, AssetRef, AuctionEvent, AuctionId, AuctionInfo, Ciphertext,
    EncryptedAuctionData, InputProof, SequencedEvent, SettlementOutcome,
};

use crate::clock::Clock;
use crate::confidential::ConfidentialValue;
use crate::custody::AssetCustody;
use crate::events::EventLog;
use crate::genesis::{AuctionGenesisConfig, DefaultAuctionParams, GenesisValidationError};
use crate::handlers::HandlerResult;
use crate::ledger::{self, SealedBid};
use crate::lifecycle::{self, NewAuction};
use crate::settlement;
use crate::state::{AuctionRegistry, IdAllocator, Treasury};

/// Sealed-bid auction engine.
pub struct AuctionEngine {
    registry: AuctionRegistry,
    treasury: Treasury,
    events: EventLog,
    custody: Arc<dyn AssetCustody>,
    confidential: Arc<dyn ConfidentialValue>,
    clock: Arc<dyn Clock>,
    params: DefaultAuctionParams,
}

impl std::fmt::Debug for AuctionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionEngine")
            .field("registry", &self.registry)
            .field("params", &self.params)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl AuctionEngine {
    pub fn new(
        custody: Arc<dyn AssetCustody>,
        confidential: Arc<dyn ConfidentialValue>,
        clock: Arc<dyn Clock>,
        params: DefaultAuctionParams,
    ) -> Self {
        Self {
            registry: AuctionRegistry::default(),
            treasury: Treasury::default(),
            events: EventLog::default(),
            custody,
            confidential,
            clock,
            params,
        }
    }

    /// Build an engine from validated genesis configuration.
    pub fn from_genesis(
        config: &AuctionGenesisConfig,
        custody: Arc<dyn AssetCustody>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GenesisValidationError> {
        config.validate()?;
        let backend = config.sealed_backend()?;
        Ok(Self::new(
            custody,
            Arc::new(backend),
            clock,
            config.default_params,
        ))
    }

    /// Replace the id allocator. Only meaningful before the first auction.
    pub fn with_id_allocator(mut self, ids: Box<dyn IdAllocator>) -> Self {
        self.registry = AuctionRegistry::new(ids);
        self
    }

    pub fn params(&self) -> &DefaultAuctionParams {
        &self.params
    }

    pub fn confidential(&self) -> &dyn ConfidentialValue {
        self.confidential.as_ref()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // === Mutations ===

    pub fn create_auction(
        &self,
        creator: Address,
        asset: AssetRef,
        reserve_price: u64,
        duration: u64,
    ) -> HandlerResult<AuctionId> {
        let now = self.clock.now();
        let auction_id = lifecycle::create_auction(
            &self.registry,
            self.custody.as_ref(),
            self.confidential.as_ref(),
            &self.params,
            creator,
            NewAuction {
                asset,
                reserve_price,
                duration,
            },
            now,
        )?;

        info!(
            auction_id,
            creator = %hex::encode(creator),
            token_id = asset.token_id,
            reserve_price,
            "Auction created"
        );
        self.events.emit(
            AuctionEvent::AuctionCreated {
                auction_id,
                asset,
                creator,
                reserve_price,
                end_time: now + duration,
            },
            now,
        );
        Ok(auction_id)
    }

    pub fn place_bid(
        &self,
        bidder: Address,
        auction_id: AuctionId,
        encrypted_bid: Ciphertext,
        proof: InputProof,
        collateral: u64,
    ) -> HandlerResult<()> {
        let slot = self.registry.get(auction_id)?;
        let mut slot = slot.lock();
        let now = self.clock.now();

        let result = ledger::place_bid(
            &mut slot,
            self.confidential.as_ref(),
            SealedBid {
                bidder,
                encrypted_bid,
                proof,
                collateral,
            },
            self.params.min_collateral,
            now,
        );
        if let Err(e) = result {
            warn!(auction_id, bidder = %hex::encode(bidder), error = %e, "Bid rejected");
            return Err(e);
        }

        info!(
            auction_id,
            bidder = %hex::encode(bidder),
            bid_count = slot.record.bid_count,
            "Bid placed"
        );
        self.events
            .emit(AuctionEvent::BidPlaced { auction_id, bidder }, now);
        Ok(())
    }

    pub fn end_auction(&self, auction_id: AuctionId) -> HandlerResult<()> {
        let slot = self.registry.get(auction_id)?;
        let mut slot = slot.lock();
        let now = self.clock.now();

        lifecycle::end_auction(&mut slot.record, now)?;

        let bid_count = slot.record.bid_count;
        info!(auction_id, bid_count, "Auction ended");
        self.events.emit(
            AuctionEvent::AuctionEnded {
                auction_id,
                bid_count,
            },
            now,
        );
        Ok(())
    }

    pub fn settle_auction(&self, auction_id: AuctionId) -> HandlerResult<SettlementOutcome> {
        let slot = self.registry.get(auction_id)?;
        let mut slot = slot.lock();
        let now = self.clock.now();

        let outcome = settlement::settle(
            &mut slot,
            &self.registry,
            &self.treasury,
            self.custody.as_ref(),
            self.confidential.as_ref(),
            now,
        )
        .inspect_err(|e| {
            if e.is_retryable() {
                warn!(auction_id, error = %e, "Settlement aborted, auction remains Ended");
            }
        })?;

        match &outcome {
            SettlementOutcome::Sold {
                winner,
                winning_bid,
            } => info!(
                auction_id,
                winner = %hex::encode(winner),
                winning_bid,
                "Auction settled"
            ),
            SettlementOutcome::NoSale => info!(auction_id, "Auction settled without sale"),
        }
        self.events
            .emit(AuctionEvent::AuctionSettled { auction_id, outcome }, now);
        Ok(outcome)
    }

    /// Drain the caller's withdrawable balance.
    pub fn withdraw(&self, caller: Address) -> HandlerResult<u64> {
        let amount = self.treasury.withdraw(&caller)?;
        info!(account = %hex::encode(caller), amount, "Withdrawal");
        Ok(amount)
    }

    // === Reads ===

    pub fn get_auction(&self, auction_id: AuctionId) -> HandlerResult<AuctionInfo> {
        Ok(self.registry.get(auction_id)?.lock().record.info())
    }

    pub fn has_bid(&self, auction_id: AuctionId, bidder: &Address) -> HandlerResult<bool> {
        Ok(self.registry.get(auction_id)?.lock().bids.has_bid(bidder))
    }

    pub fn counter(&self) -> u64 {
        self.registry.counter()
    }

    pub fn encrypted_auction_data(
        &self,
        auction_id: AuctionId,
    ) -> HandlerResult<EncryptedAuctionData> {
        self.registry.get(auction_id)?.lock().record.encrypted_data()
    }

    pub fn withdrawable(&self, address: &Address) -> u64 {
        self.treasury.balance(address)
    }

    pub fn events_since(&self, sequence: u64) -> Vec<SequencedEvent> {
        self.events.since(sequence)
    }

    /// Snapshots of all auctions in ascending id order.
    pub fn list_auctions(&self) -> Vec<AuctionInfo> {
        self.registry
            .slots()
            .iter()
            .map(|slot| slot.lock().record.info())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::confidential::SealedBackend;
    use crate::custody::InMemoryCustody;
    use crate::error::AuctionError;
    use auction_types::AuctionState;

    const CREATOR: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];

    fn engine() -> (AuctionEngine, Arc<InMemoryCustody>, Arc<ManualClock>) {
        let custody = Arc::new(InMemoryCustody::new([9u8; 32]));
        let clock = Arc::new(ManualClock::new(1000));
        let engine = AuctionEngine::new(
            custody.clone(),
            Arc::new(SealedBackend::from_seed(&[51u8; 32]).unwrap()),
            clock.clone(),
            DefaultAuctionParams::default(),
        );
        (engine, custody, clock)
    }

    #[test]
    fn test_engine_lifecycle_emits_events() {
        let (engine, custody, clock) = engine();
        let asset = custody.asset(custody.mint(CREATOR, "uri"));

        let id = engine.create_auction(CREATOR, asset, 100, 3600).unwrap();
        let (ct, proof) = engine.confidential().encrypt_u64(150).unwrap();
        engine.place_bid(ALICE, id, ct, proof, 150).unwrap();

        clock.set(4600);
        engine.end_auction(id).unwrap();
        let outcome = engine.settle_auction(id).unwrap();
        assert_eq!(outcome.winner(), Some(ALICE));

        let events = engine.events_since(0);
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0].event,
            AuctionEvent::AuctionCreated { end_time: 4600, .. }
        ));
        assert_eq!(
            events[1].event,
            AuctionEvent::BidPlaced {
                auction_id: id,
                bidder: ALICE
            }
        );
        assert_eq!(events[3].timestamp, 4600);

        assert_eq!(engine.withdraw(CREATOR).unwrap(), 150);
        assert!(matches!(
            engine.withdraw(CREATOR),
            Err(AuctionError::NothingToWithdraw)
        ));
    }

    #[test]
    fn test_rejected_calls_emit_nothing() {
        let (engine, custody, _) = engine();
        let asset = custody.asset(custody.mint(CREATOR, "uri"));
        let id = engine.create_auction(CREATOR, asset, 100, 3600).unwrap();

        let (ct, proof) = engine.confidential().encrypt_u64(90).unwrap();
        assert!(matches!(
            engine.place_bid(ALICE, id, ct, proof, 90),
            Err(AuctionError::BelowReserve)
        ));
        assert!(matches!(
            engine.end_auction(id),
            Err(AuctionError::AuctionNotExpired)
        ));
        assert_eq!(engine.events_since(0).len(), 1);
    }

    #[test]
    fn test_reads_on_unknown_auction() {
        let (engine, _, _) = engine();
        assert!(matches!(engine.get_auction(3), Err(AuctionError::NotFound(3))));
        assert!(matches!(
            engine.has_bid(3, &ALICE),
            Err(AuctionError::NotFound(3))
        ));
        assert_eq!(engine.counter(), 0);
        assert!(engine.list_auctions().is_empty());
    }

    /// Hands out the same id every time.
    struct FixedIds(AuctionId);

    impl IdAllocator for FixedIds {
        fn next_id(&self) -> AuctionId {
            self.0
        }
    }

    #[test]
    fn test_injected_id_allocator() {
        let (engine, custody, _) = engine();
        let engine = engine.with_id_allocator(Box::new(FixedIds(77)));

        let first = custody.asset(custody.mint(CREATOR, "uri"));
        let second = custody.asset(custody.mint(CREATOR, "uri"));

        let id = engine.create_auction(CREATOR, first, 100, 3600).unwrap();
        assert_eq!(id, 77);
        assert_eq!(engine.get_auction(77).unwrap().asset, first);

        // The allocator repeats itself: creation fails and the lock is rolled back
        assert!(matches!(
            engine.create_auction(CREATOR, second, 100, 3600),
            Err(AuctionError::DuplicateAuctionId(77))
        ));
        assert!(!custody.is_locked(&second).unwrap());
        assert!(custody.is_locked(&first).unwrap());
        assert_eq!(engine.counter(), 1);
        assert_eq!(engine.list_auctions().len(), 1);
        assert_eq!(engine.events_since(0).len(), 1);
        assert_eq!(engine.get_auction(77).unwrap().state, AuctionState::Active);
    }

    #[test]
    fn test_from_genesis() {
        let custody = Arc::new(InMemoryCustody::new([9u8; 32]));
        let clock = Arc::new(ManualClock::new(0));

        let config = AuctionGenesisConfig::with_seed(&[3u8; 32]);
        let engine = AuctionEngine::from_genesis(&config, custody.clone(), clock.clone()).unwrap();
        assert_eq!(engine.params().min_collateral, 1);

        let mut bad = AuctionGenesisConfig::default();
        bad.default_params.min_collateral = 0;
        assert!(AuctionEngine::from_genesis(&bad, custody, clock).is_err());
    }
}
