//! Settlement: disclose the winner, move the asset, account for every escrow.
//!
//! Settlement is all-or-nothing with respect to the auction record. The only
//! external side effects are on the custodian, and those run before anything
//! is committed. If the transfer is refused the asset lock is restored and the
//! auction stays Ended, so the call can simply be retried.
//!
//! If restoring the lock also fails, the auction is still Ended with nothing
//! credited, but its asset is left unlocked in the creator's hands. The asset
//! stays in the registry's held index, so no new auction can claim it, and a
//! retry skips the unlock and goes straight to the transfer.

use tracing::{error, warn};

use auction_crypto::CryptoError;
use auction_types::{Address, AuctionId, AuctionState, SettlementOutcome, ZERO_ADDRESS};

use crate::confidential::ConfidentialValue;
use crate::custody::AssetCustody;
use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::ledger::{BidLedger, EscrowStatus};
use crate::lifecycle;
use crate::state::{AuctionRecord, AuctionRegistry, AuctionSlot, Treasury};

/// Permission to decrypt the final maximum and its owner.
///
/// Minted only here, and only for an auction in the Ended state.
#[derive(Debug)]
pub struct DisclosureGrant {
    auction_id: AuctionId,
}

impl DisclosureGrant {
    fn for_ended(record: &AuctionRecord) -> HandlerResult<Self> {
        lifecycle::check_settleable(record)?;
        Ok(Self {
            auction_id: record.auction_id,
        })
    }

    pub fn auction_id(&self) -> AuctionId {
        self.auction_id
    }
}

/// Decide the outcome from the disclosed maximum and owner.
///
/// A sale needs at least one bid, a maximum at or above the reserve and an
/// owner who is actually in the ledger.
pub fn decide_outcome(
    record: &AuctionRecord,
    bids: &BidLedger,
    winning_bid: u64,
    winner: Address,
) -> SettlementOutcome {
    if record.bid_count == 0
        || winning_bid < record.reserve_price
        || winner == ZERO_ADDRESS
        || !bids.has_bid(&winner)
    {
        return SettlementOutcome::NoSale;
    }
    SettlementOutcome::Sold {
        winner,
        winning_bid,
    }
}

struct EscrowPlan {
    statuses: Vec<(Address, EscrowStatus)>,
    credits: Vec<(Address, u64)>,
}

fn plan_escrow(record: &AuctionRecord, bids: &BidLedger, outcome: &SettlementOutcome) -> EscrowPlan {
    let mut statuses = Vec::with_capacity(bids.len());
    let mut credits = Vec::with_capacity(bids.len() + 1);

    for entry in bids.entries() {
        match outcome {
            SettlementOutcome::Sold {
                winner,
                winning_bid,
            } if *winner == entry.bidder => {
                let paid = (*winning_bid).min(entry.collateral);
                let refunded = entry.collateral - paid;
                statuses.push((entry.bidder, EscrowStatus::Captured { paid, refunded }));
                credits.push((record.creator, paid));
                credits.push((entry.bidder, refunded));
            }
            _ => {
                statuses.push((entry.bidder, EscrowStatus::Refunded(entry.collateral)));
                credits.push((entry.bidder, entry.collateral));
            }
        }
    }

    EscrowPlan { statuses, credits }
}

fn release_asset(
    record: &AuctionRecord,
    custody: &dyn AssetCustody,
    outcome: &SettlementOutcome,
) -> HandlerResult<()> {
    let asset = &record.asset;

    if custody.is_locked(asset)? {
        custody.unlock(asset)?;
    }

    let SettlementOutcome::Sold { winner, .. } = outcome else {
        return Ok(());
    };

    if let Err(e) = custody.transfer(asset, &record.creator, winner) {
        warn!(
            auction_id = record.auction_id,
            error = %e,
            "Asset transfer refused, restoring lock"
        );
        if let Err(relock) = custody.lock(asset) {
            error!(
                auction_id = record.auction_id,
                error = %relock,
                "Failed to restore asset lock"
            );
        }
        return Err(AuctionError::AssetTransferFailed(e.to_string()));
    }

    Ok(())
}

/// Ended -> Settled.
pub fn settle(
    slot: &mut AuctionSlot,
    registry: &AuctionRegistry,
    treasury: &Treasury,
    custody: &dyn AssetCustody,
    confidential: &dyn ConfidentialValue,
    now: u64,
) -> HandlerResult<SettlementOutcome> {
    let grant = DisclosureGrant::for_ended(&slot.record)?;
    let record = &slot.record;

    let winning_bid = confidential
        .decrypt(&grant, &record.running_max)?
        .as_u64()
        .ok_or(AuctionError::Confidential(CryptoError::InvalidCiphertextFormat))?;
    let winner = confidential
        .decrypt(&grant, &record.running_max_owner)?
        .as_address()
        .ok_or(AuctionError::Confidential(CryptoError::InvalidCiphertextFormat))?;

    let outcome = decide_outcome(record, &slot.bids, winning_bid, winner);
    let plan = plan_escrow(record, &slot.bids, &outcome);
    let credits = treasury.stage(&plan.credits)?;

    release_asset(record, custody, &outcome)?;

    // Commit
    let record = &mut slot.record;
    record.state = AuctionState::Settled;
    record.outcome = Some(outcome);
    record.settled_at = Some(now);
    for (bidder, status) in plan.statuses {
        slot.bids.set_escrow(&bidder, status);
    }
    credits.commit();
    registry.release_asset(&slot.record.asset, slot.record.auction_id);

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::confidential::SealedBackend;
    use crate::custody::{CustodyError, InMemoryCustody};
    use crate::genesis::DefaultAuctionParams;
    use crate::ledger::{self, SealedBid};
    use crate::lifecycle::NewAuction;
    use auction_types::AssetRef;

    const CREATOR: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    /// Custodian that refuses transfers while `fail` is set, and locks while
    /// `fail_lock` is set.
    struct FlakyCustody {
        inner: InMemoryCustody,
        fail: AtomicBool,
        fail_lock: AtomicBool,
    }

    impl AssetCustody for FlakyCustody {
        fn owner_of(&self, asset: &AssetRef) -> Result<Address, CustodyError> {
            self.inner.owner_of(asset)
        }

        fn is_locked(&self, asset: &AssetRef) -> Result<bool, CustodyError> {
            self.inner.is_locked(asset)
        }

        fn lock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
            if self.fail_lock.load(Ordering::SeqCst) {
                return Err(CustodyError::Unavailable("custodian offline".into()));
            }
            self.inner.lock(asset)
        }

        fn unlock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
            self.inner.unlock(asset)
        }

        fn transfer(
            &self,
            asset: &AssetRef,
            from: &Address,
            to: &Address,
        ) -> Result<(), CustodyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CustodyError::Unavailable("receiver rejected".into()));
            }
            self.inner.transfer(asset, from, to)
        }
    }

    struct Fixture {
        registry: AuctionRegistry,
        treasury: Treasury,
        custody: FlakyCustody,
        backend: SealedBackend,
        asset: AssetRef,
        auction_id: AuctionId,
    }

    fn fixture() -> Fixture {
        let custody = FlakyCustody {
            inner: InMemoryCustody::new([9u8; 32]),
            fail: AtomicBool::new(false),
            fail_lock: AtomicBool::new(false),
        };
        let asset = custody.inner.asset(custody.inner.mint(CREATOR, "uri"));
        let registry = AuctionRegistry::default();
        let backend = SealedBackend::from_seed(&[41u8; 32]).unwrap();

        let auction_id = lifecycle::create_auction(
            &registry,
            &custody,
            &backend,
            &DefaultAuctionParams::default(),
            CREATOR,
            NewAuction {
                asset,
                reserve_price: 100,
                duration: 3600,
            },
            1000,
        )
        .unwrap();

        Fixture {
            registry,
            treasury: Treasury::default(),
            custody,
            backend,
            asset,
            auction_id,
        }
    }

    fn bid(f: &Fixture, bidder: Address, value: u64, collateral: u64) {
        let (encrypted_bid, proof) = f.backend.encrypt_u64(value).unwrap();
        let slot = f.registry.get(f.auction_id).unwrap();
        ledger::place_bid(
            &mut slot.lock(),
            &f.backend,
            SealedBid {
                bidder,
                encrypted_bid,
                proof,
                collateral,
            },
            1,
            2000,
        )
        .unwrap();
    }

    fn end(f: &Fixture) {
        let slot = f.registry.get(f.auction_id).unwrap();
        lifecycle::end_auction(&mut slot.lock().record, 4600).unwrap();
    }

    fn settle_now(f: &Fixture) -> HandlerResult<SettlementOutcome> {
        let slot = f.registry.get(f.auction_id).unwrap();
        let mut slot = slot.lock();
        settle(
            &mut slot,
            &f.registry,
            &f.treasury,
            &f.custody,
            &f.backend,
            5000,
        )
    }

    #[test]
    fn test_settle_highest_bid_wins() {
        let f = fixture();
        bid(&f, ALICE, 150, 200);
        bid(&f, BOB, 120, 120);
        end(&f);

        let outcome = settle_now(&f).unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::Sold {
                winner: ALICE,
                winning_bid: 150
            }
        );

        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), ALICE);
        assert!(!f.custody.is_locked(&f.asset).unwrap());
        assert_eq!(f.registry.holder_of(&f.asset), None);

        // Creator is paid the winning bid, everyone else gets the rest back
        assert_eq!(f.treasury.balance(&CREATOR), 150);
        assert_eq!(f.treasury.balance(&ALICE), 50);
        assert_eq!(f.treasury.balance(&BOB), 120);

        let slot = f.registry.get(f.auction_id).unwrap();
        let slot = slot.lock();
        assert_eq!(slot.record.state, AuctionState::Settled);
        assert_eq!(slot.record.settled_at, Some(5000));
        assert_eq!(
            slot.bids.get(&ALICE).unwrap().escrow,
            EscrowStatus::Captured {
                paid: 150,
                refunded: 50
            }
        );
        assert_eq!(slot.bids.get(&BOB).unwrap().escrow, EscrowStatus::Refunded(120));
        assert_eq!(slot.bids.total_held(), 0);
    }

    #[test]
    fn test_tie_keeps_earlier_bid() {
        let f = fixture();
        bid(&f, BOB, 150, 150);
        bid(&f, ALICE, 150, 150);
        end(&f);

        assert_eq!(settle_now(&f).unwrap().winner(), Some(BOB));
    }

    #[test]
    fn test_settle_without_bids() {
        let f = fixture();
        end(&f);

        assert_eq!(settle_now(&f).unwrap(), SettlementOutcome::NoSale);
        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), CREATOR);
        assert!(!f.custody.is_locked(&f.asset).unwrap());
        assert_eq!(f.treasury.balance(&CREATOR), 0);
    }

    #[test]
    fn test_settle_requires_ended() {
        let f = fixture();
        bid(&f, ALICE, 150, 150);

        assert!(matches!(
            settle_now(&f),
            Err(AuctionError::InvalidState {
                expected: AuctionState::Ended,
                got: AuctionState::Active
            })
        ));

        end(&f);
        settle_now(&f).unwrap();
        assert!(matches!(settle_now(&f), Err(AuctionError::AlreadySettled)));
        // Credited once
        assert_eq!(f.treasury.balance(&CREATOR), 150);
    }

    #[test]
    fn test_failed_transfer_is_retryable() {
        let f = fixture();
        bid(&f, ALICE, 150, 150);
        end(&f);

        f.custody.fail.store(true, Ordering::SeqCst);
        let err = settle_now(&f).unwrap_err();
        assert!(matches!(err, AuctionError::AssetTransferFailed(_)));
        assert!(err.is_retryable());

        // Nothing committed, lock restored
        assert!(f.custody.is_locked(&f.asset).unwrap());
        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), CREATOR);
        assert_eq!(f.treasury.balance(&CREATOR), 0);
        {
            let slot = f.registry.get(f.auction_id).unwrap();
            let slot = slot.lock();
            assert_eq!(slot.record.state, AuctionState::Ended);
            assert_eq!(slot.record.outcome, None);
            assert_eq!(slot.bids.total_held(), 150);
        }

        f.custody.fail.store(false, Ordering::SeqCst);
        let outcome = settle_now(&f).unwrap();
        assert_eq!(outcome.winner(), Some(ALICE));
        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), ALICE);
        assert_eq!(f.treasury.balance(&CREATOR), 150);
    }

    #[test]
    fn test_failed_transfer_and_relock_leaves_asset_unlocked() {
        let f = fixture();
        bid(&f, ALICE, 150, 150);
        end(&f);

        f.custody.fail.store(true, Ordering::SeqCst);
        f.custody.fail_lock.store(true, Ordering::SeqCst);
        let err = settle_now(&f).unwrap_err();
        assert!(matches!(err, AuctionError::AssetTransferFailed(_)));

        // Auction untouched, asset unlocked but still held by this auction
        assert!(!f.custody.is_locked(&f.asset).unwrap());
        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), CREATOR);
        assert_eq!(f.registry.holder_of(&f.asset), Some(f.auction_id));
        assert_eq!(f.treasury.balance(&CREATOR), 0);
        {
            let slot = f.registry.get(f.auction_id).unwrap();
            let slot = slot.lock();
            assert_eq!(slot.record.state, AuctionState::Ended);
            assert_eq!(slot.bids.total_held(), 150);
        }

        // Retry goes straight to the transfer
        f.custody.fail.store(false, Ordering::SeqCst);
        assert_eq!(settle_now(&f).unwrap().winner(), Some(ALICE));
        assert_eq!(f.custody.owner_of(&f.asset).unwrap(), ALICE);
        assert_eq!(f.registry.holder_of(&f.asset), None);
        assert_eq!(f.treasury.balance(&CREATOR), 150);
    }

    #[test]
    fn test_decide_outcome_rules() {
        let f = fixture();
        bid(&f, ALICE, 150, 150);
        let slot = f.registry.get(f.auction_id).unwrap();
        let slot = slot.lock();

        let sold = decide_outcome(&slot.record, &slot.bids, 150, ALICE);
        assert_eq!(sold.winning_bid(), Some(150));

        assert_eq!(
            decide_outcome(&slot.record, &slot.bids, 99, ALICE),
            SettlementOutcome::NoSale
        );
        assert_eq!(
            decide_outcome(&slot.record, &slot.bids, 150, ZERO_ADDRESS),
            SettlementOutcome::NoSale
        );
        // Not in the ledger
        assert_eq!(
            decide_outcome(&slot.record, &slot.bids, 150, BOB),
            SettlementOutcome::NoSale
        );
    }
}
