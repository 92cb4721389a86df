//! Auction lifecycle: creation and the guarded transitions.
//!
//! ```text
//! create ──> Active ──end_auction──> Ended ──settle_auction──> Settled
//! ```
//!
//! No back-transitions, no skipping Ended. Bids are gated on the clock as well
//! as on the state, so a bid observed after `end_time` is refused even if
//! nobody has ended the auction yet.

use tracing::warn;

use auction_types::{Address, AssetRef, AuctionId, AuctionState, ZERO_ADDRESS};

use crate::confidential::ConfidentialValue;
use crate::custody::{AssetCustody, CustodyError};
use crate::error::AuctionError;
use crate::genesis::DefaultAuctionParams;
use crate::handlers::HandlerResult;
use crate::state::{AuctionRecord, AuctionRegistry};

/// Parameters supplied by an auction creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAuction {
    pub asset: AssetRef,
    pub reserve_price: u64,
    /// Seconds from creation until bidding closes
    pub duration: u64,
}

/// Validate a requested duration against the configured bounds.
pub fn validate_duration(params: &DefaultAuctionParams, duration: u64) -> HandlerResult<()> {
    if duration == 0 || duration < params.min_duration {
        return Err(AuctionError::InvalidDuration);
    }
    if matches!(params.max_duration, Some(max) if duration > max) {
        return Err(AuctionError::InvalidDuration);
    }
    Ok(())
}

/// Register a new Active auction and lock its asset.
pub fn create_auction(
    registry: &AuctionRegistry,
    custody: &dyn AssetCustody,
    confidential: &dyn ConfidentialValue,
    params: &DefaultAuctionParams,
    creator: Address,
    request: NewAuction,
    now: u64,
) -> HandlerResult<AuctionId> {
    validate_duration(params, request.duration)?;
    let end_time = now
        .checked_add(request.duration)
        .ok_or(AuctionError::InvalidDuration)?;

    let reservation = registry.reserve();
    let asset = request.asset;

    if reservation.is_held(&asset) {
        return Err(AuctionError::AssetAlreadyLocked);
    }
    if custody.owner_of(&asset)? != creator {
        return Err(AuctionError::NotAssetOwner);
    }
    if custody.is_locked(&asset)? {
        return Err(AuctionError::AssetAlreadyLocked);
    }

    let (running_max, _) = confidential.encrypt_u64(0)?;
    let (running_max_owner, _) = confidential.encrypt_address(ZERO_ADDRESS)?;

    custody.lock(&asset).map_err(|e| match e {
        CustodyError::AlreadyLocked => AuctionError::AssetAlreadyLocked,
        other => AuctionError::Custody(other),
    })?;

    let auction_id = match reservation.allocate_id() {
        Ok(id) => id,
        Err(e) => {
            if let Err(unlock_err) = custody.unlock(&asset) {
                warn!(error = %unlock_err, "Failed to release asset lock after aborted creation");
            }
            return Err(e);
        }
    };

    Ok(reservation.commit(AuctionRecord {
        auction_id,
        asset,
        creator,
        reserve_price: request.reserve_price,
        start_time: now,
        end_time,
        ended_at: None,
        settled_at: None,
        state: AuctionState::Active,
        running_max,
        running_max_owner,
        bid_count: 0,
        outcome: None,
    }))
}

/// Guard for bid submission.
pub fn check_accepting_bids(record: &AuctionRecord, now: u64) -> HandlerResult<()> {
    if record.state != AuctionState::Active {
        return Err(AuctionError::InvalidState {
            expected: AuctionState::Active,
            got: record.state,
        });
    }
    if now >= record.end_time {
        return Err(AuctionError::AuctionExpired);
    }
    Ok(())
}

/// Active -> Ended. Anyone may call once `end_time` has passed.
pub fn end_auction(record: &mut AuctionRecord, now: u64) -> HandlerResult<()> {
    if record.state != AuctionState::Active {
        return Err(AuctionError::InvalidState {
            expected: AuctionState::Active,
            got: record.state,
        });
    }
    if now < record.end_time {
        return Err(AuctionError::AuctionNotExpired);
    }

    record.state = AuctionState::Ended;
    record.ended_at = Some(now);
    Ok(())
}

/// Guard for Ended -> Settled.
pub fn check_settleable(record: &AuctionRecord) -> HandlerResult<()> {
    match record.state {
        AuctionState::Ended => Ok(()),
        AuctionState::Settled => Err(AuctionError::AlreadySettled),
        AuctionState::Active => Err(AuctionError::InvalidState {
            expected: AuctionState::Ended,
            got: AuctionState::Active,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidential::SealedBackend;
    use crate::custody::InMemoryCustody;

    const COLLECTION: Address = [9u8; 32];
    const CREATOR: Address = [1u8; 32];

    struct Fixture {
        registry: AuctionRegistry,
        custody: InMemoryCustody,
        backend: SealedBackend,
        params: DefaultAuctionParams,
    }

    fn fixture() -> Fixture {
        Fixture {
            registry: AuctionRegistry::default(),
            custody: InMemoryCustody::new(COLLECTION),
            backend: SealedBackend::from_seed(&[31u8; 32]).unwrap(),
            params: DefaultAuctionParams::default(),
        }
    }

    fn create(f: &Fixture, creator: Address, token_id: u64, duration: u64) -> HandlerResult<u64> {
        create_auction(
            &f.registry,
            &f.custody,
            &f.backend,
            &f.params,
            creator,
            NewAuction {
                asset: f.custody.asset(token_id),
                reserve_price: 100,
                duration,
            },
            1000,
        )
    }

    #[test]
    fn test_create_auction() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");

        let id = create(&f, CREATOR, token, 3600).unwrap();
        assert_eq!(id, 0);
        assert_eq!(f.registry.counter(), 1);
        assert!(f.custody.is_locked(&f.custody.asset(token)).unwrap());

        let slot = f.registry.get(id).unwrap();
        let slot = slot.lock();
        assert_eq!(slot.record.state, AuctionState::Active);
        assert_eq!(slot.record.start_time, 1000);
        assert_eq!(slot.record.end_time, 4600);
        assert_eq!(slot.record.bid_count, 0);
    }

    #[test]
    fn test_create_auction_not_owner() {
        let f = fixture();
        let token = f.custody.mint([2u8; 32], "uri");

        let result = create(&f, CREATOR, token, 3600);
        assert!(matches!(result, Err(AuctionError::NotAssetOwner)));
        assert_eq!(f.registry.counter(), 0);
        assert!(!f.custody.is_locked(&f.custody.asset(token)).unwrap());
    }

    #[test]
    fn test_create_auction_asset_held() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");

        create(&f, CREATOR, token, 3600).unwrap();
        let result = create(&f, CREATOR, token, 3600);
        assert!(matches!(result, Err(AuctionError::AssetAlreadyLocked)));
        assert_eq!(f.registry.counter(), 1);
    }

    #[test]
    fn test_create_auction_asset_locked_elsewhere() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");
        f.custody.lock(&f.custody.asset(token)).unwrap();

        let result = create(&f, CREATOR, token, 3600);
        assert!(matches!(result, Err(AuctionError::AssetAlreadyLocked)));
    }

    #[test]
    fn test_create_auction_invalid_duration() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");

        assert!(matches!(
            create(&f, CREATOR, token, 0),
            Err(AuctionError::InvalidDuration)
        ));
        assert!(matches!(
            create(&f, CREATOR, token, u64::MAX),
            Err(AuctionError::InvalidDuration)
        ));
        assert!(!f.custody.is_locked(&f.custody.asset(token)).unwrap());
    }

    #[test]
    fn test_duration_bounds() {
        let params = DefaultAuctionParams {
            min_duration: 60,
            max_duration: Some(600),
            min_collateral: 1,
        };
        assert!(validate_duration(&params, 59).is_err());
        assert!(validate_duration(&params, 60).is_ok());
        assert!(validate_duration(&params, 600).is_ok());
        assert!(validate_duration(&params, 601).is_err());
    }

    #[test]
    fn test_unknown_asset_is_custody_error() {
        let f = fixture();
        let result = create(&f, CREATOR, 77, 3600);
        assert!(matches!(
            result,
            Err(AuctionError::Custody(CustodyError::UnknownAsset(77)))
        ));
    }

    #[test]
    fn test_end_auction_transitions() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");
        let id = create(&f, CREATOR, token, 3600).unwrap();
        let slot = f.registry.get(id).unwrap();
        let mut slot = slot.lock();

        // Too early
        assert!(matches!(
            end_auction(&mut slot.record, 4599),
            Err(AuctionError::AuctionNotExpired)
        ));
        assert_eq!(slot.record.state, AuctionState::Active);
        assert!(matches!(
            check_settleable(&slot.record),
            Err(AuctionError::InvalidState { .. })
        ));

        end_auction(&mut slot.record, 4600).unwrap();
        assert_eq!(slot.record.state, AuctionState::Ended);
        assert_eq!(slot.record.ended_at, Some(4600));
        assert!(check_settleable(&slot.record).is_ok());

        // Only once
        assert!(matches!(
            end_auction(&mut slot.record, 5000),
            Err(AuctionError::InvalidState { .. })
        ));
        assert_eq!(slot.record.ended_at, Some(4600));
    }

    #[test]
    fn test_bid_gate_is_clock_based() {
        let f = fixture();
        let token = f.custody.mint(CREATOR, "uri");
        let id = create(&f, CREATOR, token, 3600).unwrap();
        let slot = f.registry.get(id).unwrap();
        let slot = slot.lock();

        assert!(check_accepting_bids(&slot.record, 4599).is_ok());
        // Still Active, but past end_time
        assert!(matches!(
            check_accepting_bids(&slot.record, 4600),
            Err(AuctionError::AuctionExpired)
        ));
    }
}
