//! End-to-end integration tests for the sealed-bid auction engine.
//!
//! These tests exercise the full auction lifecycle across crates:
//! 1. Asset minting and auction creation
//! 2. Bid encryption and submission
//! 3. Ending once the clock passes the end time
//! 4. Settlement, asset transfer and escrow withdrawal

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

use auction_crypto::SealingKey;
use auction_module::{
    AssetCustody, AuctionEngine, AuctionError, CustodyError, DefaultAuctionParams, HandlerResult,
    InMemoryCustody, ManualClock, SealedBackend,
};
use auction_types::{
    Address, AssetRef, AuctionEvent, AuctionId, AuctionState, Plaintext, SettlementOutcome,
};

const START: u64 = 1_000;
const CREATOR: Address = [1u8; 32];
const ALICE: Address = [2u8; 32];
const BOB: Address = [3u8; 32];

/// Custodian wrapper whose transfers can be made to fail.
struct FlakyCustody {
    inner: InMemoryCustody,
    refuse_transfers: Mutex<Option<String>>,
}

impl AssetCustody for FlakyCustody {
    fn owner_of(&self, asset: &AssetRef) -> Result<Address, CustodyError> {
        self.inner.owner_of(asset)
    }

    fn is_locked(&self, asset: &AssetRef) -> Result<bool, CustodyError> {
        self.inner.is_locked(asset)
    }

    fn lock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
        self.inner.lock(asset)
    }

    fn unlock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
        self.inner.unlock(asset)
    }

    fn transfer(&self, asset: &AssetRef, from: &Address, to: &Address) -> Result<(), CustodyError> {
        if let Some(reason) = self.refuse_transfers.lock().clone() {
            return Err(CustodyError::Unavailable(reason));
        }
        self.inner.transfer(asset, from, to)
    }
}

struct Harness {
    engine: Arc<AuctionEngine>,
    custody: Arc<FlakyCustody>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_seed(&[42u8; 32])
    }

    fn with_seed(seed: &[u8]) -> Self {
        let custody = Arc::new(FlakyCustody {
            inner: InMemoryCustody::new([9u8; 32]),
            refuse_transfers: Mutex::new(None),
        });
        let clock = Arc::new(ManualClock::new(START));
        let engine = AuctionEngine::new(
            custody.clone(),
            Arc::new(SealedBackend::from_seed(seed).unwrap()),
            clock.clone(),
            DefaultAuctionParams::default(),
        );
        Self {
            engine: Arc::new(engine),
            custody,
            clock,
        }
    }

    fn mint(&self, owner: Address) -> AssetRef {
        let token_id = self.custody.inner.mint(owner, "ipfs://token");
        self.custody.inner.asset(token_id)
    }

    fn create(&self, reserve_price: u64, duration: u64) -> AuctionId {
        let asset = self.mint(CREATOR);
        self.engine
            .create_auction(CREATOR, asset, reserve_price, duration)
            .unwrap()
    }

    fn bid(
        &self,
        bidder: Address,
        auction_id: AuctionId,
        amount: u64,
        collateral: u64,
    ) -> HandlerResult<()> {
        let (ct, proof) = self.engine.confidential().encrypt_u64(amount).unwrap();
        self.engine
            .place_bid(bidder, auction_id, ct, proof, collateral)
    }

    fn end_and_settle(&self, auction_id: AuctionId) -> HandlerResult<SettlementOutcome> {
        let info = self.engine.get_auction(auction_id)?;
        self.clock.set(info.end_time);
        self.engine.end_auction(auction_id)?;
        self.engine.settle_auction(auction_id)
    }
}

/// The worked example: two bids, highest wins, loser refunded.
#[test]
fn test_highest_bid_wins() {
    let h = Harness::new();
    let asset = h.mint(CREATOR);
    let id = h.engine.create_auction(CREATOR, asset, 100, 3600).unwrap();
    assert!(h.custody.is_locked(&asset).unwrap());

    h.bid(ALICE, id, 150, 200).unwrap();
    h.bid(BOB, id, 120, 120).unwrap();
    assert!(h.engine.has_bid(id, &ALICE).unwrap());
    assert!(!h.engine.has_bid(id, &CREATOR).unwrap());

    h.clock.set(START + 3600);
    h.engine.end_auction(id).unwrap();
    let outcome = h.engine.settle_auction(id).unwrap();

    assert_eq!(
        outcome,
        SettlementOutcome::Sold {
            winner: ALICE,
            winning_bid: 150
        }
    );

    let info = h.engine.get_auction(id).unwrap();
    assert_eq!(info.state, AuctionState::Settled);
    assert_eq!(info.winner(), Some(ALICE));
    assert_eq!(info.winning_bid(), Some(150));
    assert_eq!(info.bid_count, 2);

    assert_eq!(h.custody.owner_of(&asset).unwrap(), ALICE);
    assert!(!h.custody.is_locked(&asset).unwrap());

    assert_eq!(h.engine.withdraw(BOB).unwrap(), 120);
    assert_eq!(h.engine.withdraw(ALICE).unwrap(), 50);
    assert_eq!(h.engine.withdraw(CREATOR).unwrap(), 150);
}

#[test]
fn test_below_reserve_rejected() {
    let h = Harness::new();
    let id = h.create(100, 3600);
    let before = h.engine.encrypted_auction_data(id).unwrap();

    assert!(matches!(
        h.bid(ALICE, id, 90, 90),
        Err(AuctionError::BelowReserve)
    ));

    assert!(!h.engine.has_bid(id, &ALICE).unwrap());
    assert_eq!(h.engine.get_auction(id).unwrap().bid_count, 0);
    assert_eq!(h.engine.encrypted_auction_data(id).unwrap(), before);
}

/// With no reserve, a bid of 0 is refused and the smallest positive bid wins.
#[test]
fn test_zero_bid_refused_at_zero_reserve() {
    let h = Harness::new();
    let id = h.create(0, 3600);
    let before = h.engine.encrypted_auction_data(id).unwrap();

    assert!(matches!(h.bid(ALICE, id, 0, 5), Err(AuctionError::ZeroBid)));
    assert!(!h.engine.has_bid(id, &ALICE).unwrap());
    assert_eq!(h.engine.get_auction(id).unwrap().bid_count, 0);
    assert_eq!(h.engine.encrypted_auction_data(id).unwrap(), before);

    h.bid(BOB, id, 1, 5).unwrap();
    assert_eq!(
        h.end_and_settle(id).unwrap(),
        SettlementOutcome::Sold {
            winner: BOB,
            winning_bid: 1
        }
    );
    assert_eq!(h.engine.withdraw(CREATOR).unwrap(), 1);
    assert_eq!(h.engine.withdraw(BOB).unwrap(), 4);
}

#[test]
fn test_end_before_end_time() {
    let h = Harness::new();
    let id = h.create(100, 3600);

    h.clock.set(START + 3599);
    assert!(matches!(
        h.engine.end_auction(id),
        Err(AuctionError::AuctionNotExpired)
    ));
    assert_eq!(h.engine.get_auction(id).unwrap().state, AuctionState::Active);
}

#[test]
fn test_duplicate_bid_leaves_state_unchanged() {
    let h = Harness::new();
    let id = h.create(100, 3600);

    h.bid(ALICE, id, 150, 150).unwrap();
    let before = h.engine.encrypted_auction_data(id).unwrap();

    assert!(matches!(
        h.bid(ALICE, id, 900, 900),
        Err(AuctionError::AlreadyBid)
    ));
    assert_eq!(h.engine.get_auction(id).unwrap().bid_count, 1);
    assert_eq!(h.engine.encrypted_auction_data(id).unwrap(), before);

    assert_eq!(h.end_and_settle(id).unwrap().winning_bid(), Some(150));
}

#[test]
fn test_lifecycle_is_monotonic() {
    let h = Harness::new();
    let id = h.create(100, 3600);
    h.bid(ALICE, id, 150, 150).unwrap();

    assert!(matches!(
        h.engine.settle_auction(id),
        Err(AuctionError::InvalidState { .. })
    ));

    h.clock.set(START + 3600);
    // Expired before anyone ended it
    assert!(matches!(
        h.bid(BOB, id, 200, 200),
        Err(AuctionError::AuctionExpired)
    ));

    h.engine.end_auction(id).unwrap();
    assert!(matches!(
        h.bid(BOB, id, 200, 200),
        Err(AuctionError::InvalidState { .. })
    ));
    assert!(matches!(
        h.engine.end_auction(id),
        Err(AuctionError::InvalidState { .. })
    ));

    h.engine.settle_auction(id).unwrap();
    assert!(matches!(
        h.engine.end_auction(id),
        Err(AuctionError::InvalidState { .. })
    ));
}

#[test]
fn test_settlement_is_idempotent() {
    let h = Harness::new();
    let id = h.create(100, 3600);
    h.bid(ALICE, id, 150, 150).unwrap();

    let first = h.end_and_settle(id).unwrap();
    let settled_at = h.engine.get_auction(id).unwrap().settled_at;

    h.clock.advance(100);
    assert!(matches!(
        h.engine.settle_auction(id),
        Err(AuctionError::AlreadySettled)
    ));

    let info = h.engine.get_auction(id).unwrap();
    assert_eq!(info.outcome, Some(first));
    assert_eq!(info.settled_at, settled_at);
    assert_eq!(h.engine.withdrawable(&CREATOR), 150);
}

#[test]
fn test_no_bids_returns_asset() {
    let h = Harness::new();
    let asset = h.mint(CREATOR);
    let id = h.engine.create_auction(CREATOR, asset, 100, 3600).unwrap();

    assert_eq!(h.end_and_settle(id).unwrap(), SettlementOutcome::NoSale);
    assert_eq!(h.custody.owner_of(&asset).unwrap(), CREATOR);
    assert!(!h.custody.is_locked(&asset).unwrap());
    assert_eq!(h.engine.get_auction(id).unwrap().winner(), None);

    // The asset can be auctioned again
    let again = h.engine.create_auction(CREATOR, asset, 100, 3600).unwrap();
    assert_eq!(again, id + 1);
}

#[test]
fn test_asset_cannot_back_two_auctions() {
    let h = Harness::new();
    let asset = h.mint(CREATOR);
    h.engine.create_auction(CREATOR, asset, 100, 3600).unwrap();

    assert!(matches!(
        h.engine.create_auction(CREATOR, asset, 50, 600),
        Err(AuctionError::AssetAlreadyLocked)
    ));
    assert!(matches!(
        h.engine.create_auction(ALICE, h.mint(BOB), 50, 600),
        Err(AuctionError::NotAssetOwner)
    ));
    assert!(matches!(
        h.engine.create_auction(CREATOR, h.mint(CREATOR), 50, 0),
        Err(AuctionError::InvalidDuration)
    ));
    assert_eq!(h.engine.counter(), 1);
}

#[test]
fn test_foreign_ciphertext_rejected() {
    let h = Harness::new();
    let id = h.create(100, 3600);

    // Honestly attested, but under a key the engine does not hold
    let foreign = SealingKey::derive(&[99u8; 32]).unwrap();
    let ct = foreign.seal(&Plaintext::Uint64(500), &mut OsRng).unwrap();
    let proof = foreign.attest(&ct).unwrap();

    assert!(matches!(
        h.engine.place_bid(ALICE, id, ct, proof, 500),
        Err(AuctionError::InvalidProof)
    ));
}

#[test]
fn test_failed_transfer_can_be_retried() {
    let h = Harness::new();
    let asset = h.mint(CREATOR);
    let id = h.engine.create_auction(CREATOR, asset, 100, 3600).unwrap();
    h.bid(ALICE, id, 150, 150).unwrap();
    h.bid(BOB, id, 120, 120).unwrap();

    *h.custody.refuse_transfers.lock() = Some("receiver rejected".into());
    let err = h.end_and_settle(id).unwrap_err();
    assert!(matches!(err, AuctionError::AssetTransferFailed(_)));
    assert!(err.is_retryable());

    let info = h.engine.get_auction(id).unwrap();
    assert_eq!(info.state, AuctionState::Ended);
    assert_eq!(info.outcome, None);
    assert!(h.custody.is_locked(&asset).unwrap());
    assert_eq!(h.engine.withdrawable(&BOB), 0);
    assert!(h.engine.encrypted_auction_data(id).is_ok());

    *h.custody.refuse_transfers.lock() = None;
    let outcome = h.engine.settle_auction(id).unwrap();
    assert_eq!(outcome.winner(), Some(ALICE));
    assert_eq!(h.custody.owner_of(&asset).unwrap(), ALICE);
    assert_eq!(h.engine.withdrawable(&BOB), 120);

    let settled: Vec<_> = h
        .engine
        .events_since(0)
        .into_iter()
        .filter(|e| matches!(e.event, AuctionEvent::AuctionSettled { .. }))
        .collect();
    assert_eq!(settled.len(), 1);
}

#[test]
fn test_encrypted_data_hidden_after_settlement() {
    let h = Harness::new();
    let id = h.create(100, 3600);
    h.bid(ALICE, id, 150, 150).unwrap();
    h.end_and_settle(id).unwrap();

    assert!(matches!(
        h.engine.encrypted_auction_data(id),
        Err(AuctionError::InvalidState { .. })
    ));
}

#[test]
fn test_events_follow_lifecycle() {
    let h = Harness::new();
    let id = h.create(100, 3600);
    h.bid(ALICE, id, 150, 150).unwrap();
    h.bid(BOB, id, 120, 120).unwrap();
    h.end_and_settle(id).unwrap();

    let events = h.engine.events_since(0);
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    assert!(matches!(events[0].event, AuctionEvent::AuctionCreated { .. }));
    assert_eq!(
        events[2].event,
        AuctionEvent::BidPlaced {
            auction_id: id,
            bidder: BOB
        }
    );
    assert_eq!(
        events[3].event,
        AuctionEvent::AuctionEnded {
            auction_id: id,
            bid_count: 2
        }
    );
    assert_eq!(h.engine.events_since(4).len(), 1);
}

/// The oblivious running maximum must agree with a plaintext reduction.
#[test]
fn test_random_sequences_match_plaintext_max() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..25 {
        let h = Harness::new();
        let reserve = rng.gen_range(0..500);
        let id = h.create(reserve, 3600);

        let mut best: Option<(Address, u64)> = None;
        let bidders = rng.gen_range(0..8u8);
        for n in 0..bidders {
            let bidder = [10 + n; 32];
            let amount = rng.gen_range(1..1000);
            let result = h.bid(bidder, id, amount, amount);

            if amount < reserve {
                assert!(matches!(result, Err(AuctionError::BelowReserve)), "round {round}");
                continue;
            }
            result.unwrap();
            // Ties keep the earlier bid
            if best.map_or(true, |(_, max)| amount > max) {
                best = Some((bidder, amount));
            }
        }

        let outcome = h.end_and_settle(id).unwrap();
        match best {
            Some((winner, winning_bid)) => assert_eq!(
                outcome,
                SettlementOutcome::Sold {
                    winner,
                    winning_bid
                },
                "round {round}"
            ),
            None => assert_eq!(outcome, SettlementOutcome::NoSale, "round {round}"),
        }
    }
}

#[test]
fn test_concurrent_bids_on_one_auction() {
    let h = Harness::new();
    let id = h.create(100, 3600);

    thread::scope(|s| {
        for n in 0..16u8 {
            let engine = &h.engine;
            s.spawn(move || {
                let amount = 100 + u64::from(n) * 10;
                let (ct, proof) = engine.confidential().encrypt_u64(amount).unwrap();
                engine.place_bid([20 + n; 32], id, ct, proof, amount).unwrap();
            });
        }
    });

    assert_eq!(h.engine.get_auction(id).unwrap().bid_count, 16);
    let outcome = h.end_and_settle(id).unwrap();
    assert_eq!(
        outcome,
        SettlementOutcome::Sold {
            winner: [35u8; 32],
            winning_bid: 250
        }
    );
}

#[test]
fn test_concurrent_duplicate_bids() {
    let h = Harness::new();
    let id = h.create(100, 3600);

    let accepted = Mutex::new(0u32);
    thread::scope(|s| {
        for n in 0..8u64 {
            let h = &h;
            let accepted = &accepted;
            s.spawn(move || {
                if h.bid(ALICE, id, 100 + n, 200).is_ok() {
                    *accepted.lock() += 1;
                }
            });
        }
    });

    assert_eq!(*accepted.lock(), 1);
    assert_eq!(h.engine.get_auction(id).unwrap().bid_count, 1);
}

#[test]
fn test_concurrent_creation() {
    let h = Harness::new();
    let contested = h.mint(CREATOR);
    let assets: Vec<AssetRef> = (0..8).map(|_| h.mint(CREATOR)).collect();

    let ids = Mutex::new(Vec::new());
    let contested_wins = Mutex::new(0u32);
    thread::scope(|s| {
        for asset in &assets {
            let (engine, ids) = (&h.engine, &ids);
            s.spawn(move || {
                let id = engine.create_auction(CREATOR, *asset, 100, 3600).unwrap();
                ids.lock().push(id);
            });
        }
        for _ in 0..4 {
            let (engine, wins) = (&h.engine, &contested_wins);
            s.spawn(move || {
                if engine.create_auction(CREATOR, contested, 100, 3600).is_ok() {
                    *wins.lock() += 1;
                }
            });
        }
    });

    assert_eq!(*contested_wins.lock(), 1);
    assert_eq!(h.engine.counter(), 9);

    // Ids enumerate 0..counter without gaps
    let mut all: HashSet<AuctionId> = ids.into_inner().into_iter().collect();
    all.extend(h.engine.list_auctions().iter().map(|a| a.auction_id));
    assert_eq!(all, (0..9).collect());
}
