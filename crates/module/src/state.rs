//! Auction records, the registry that owns them, and withdrawable balances.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use auction_types::{
    Address, AssetRef, AuctionId, AuctionInfo, AuctionState, Ciphertext, EncryptedAuctionData,
    SettlementOutcome,
};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::ledger::BidLedger;

/// Persistent state of one auction.
#[derive(Debug, Clone)]
pub struct AuctionRecord {
    pub auction_id: AuctionId,
    pub asset: AssetRef,
    pub creator: Address,
    pub reserve_price: u64,

    // Timing
    pub start_time: u64,
    pub end_time: u64,
    pub ended_at: Option<u64>,
    pub settled_at: Option<u64>,

    pub state: AuctionState,

    /// Highest bid so far, encrypted
    pub running_max: Ciphertext,
    /// Bidder of `running_max`, encrypted, always updated in lockstep
    pub running_max_owner: Ciphertext,

    pub bid_count: u64,

    /// Set exactly once, by settlement
    pub outcome: Option<SettlementOutcome>,
}

impl AuctionRecord {
    /// Public snapshot of the record.
    pub fn info(&self) -> AuctionInfo {
        AuctionInfo {
            auction_id: self.auction_id,
            asset: self.asset,
            creator: self.creator,
            reserve_price: self.reserve_price,
            state: self.state,
            start_time: self.start_time,
            end_time: self.end_time,
            ended_at: self.ended_at,
            settled_at: self.settled_at,
            bid_count: self.bid_count,
            outcome: self.outcome,
        }
    }

    /// The encrypted running-maximum pair, available until settlement.
    pub fn encrypted_data(&self) -> HandlerResult<EncryptedAuctionData> {
        if self.state == AuctionState::Settled {
            return Err(AuctionError::InvalidState {
                expected: AuctionState::Ended,
                got: self.state,
            });
        }
        Ok(EncryptedAuctionData {
            running_max: self.running_max.clone(),
            running_max_owner: self.running_max_owner.clone(),
        })
    }
}

/// A record together with its bid ledger, guarded as one unit.
#[derive(Debug)]
pub struct AuctionSlot {
    pub record: AuctionRecord,
    pub bids: BidLedger,
}

impl AuctionSlot {
    pub fn new(record: AuctionRecord) -> Self {
        Self {
            record,
            bids: BidLedger::default(),
        }
    }
}

/// Shared handle to a slot. All mutation of a single auction goes through its mutex.
pub type SlotHandle = Arc<Mutex<AuctionSlot>>;

/// Source of auction identifiers.
pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> AuctionId;
}

/// Hands out 0, 1, 2, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: AuctionId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdAllocator for SequentialIds {
    fn next_id(&self) -> AuctionId {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Owns the mapping from auction id to record.
pub struct AuctionRegistry {
    ids: Box<dyn IdAllocator>,

    /// All auctions by ID
    auctions: RwLock<BTreeMap<AuctionId, SlotHandle>>,

    /// Assets held by an unsettled auction
    held_assets: Mutex<HashMap<AssetRef, AuctionId>>,

    /// Number of auctions ever created
    created: AtomicU64,
}

impl std::fmt::Debug for AuctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionRegistry")
            .field("created", &self.counter())
            .finish_non_exhaustive()
    }
}

impl Default for AuctionRegistry {
    fn default() -> Self {
        Self::new(Box::new(SequentialIds::default()))
    }
}

impl AuctionRegistry {
    pub fn new(ids: Box<dyn IdAllocator>) -> Self {
        Self {
            ids,
            auctions: RwLock::new(BTreeMap::new()),
            held_assets: Mutex::new(HashMap::new()),
            created: AtomicU64::new(0),
        }
    }

    /// Start creating an auction. Creation is serialized while the
    /// reservation is alive.
    pub fn reserve(&self) -> Reservation<'_> {
        Reservation {
            registry: self,
            held: self.held_assets.lock(),
        }
    }

    /// Get auction slot by ID.
    pub fn get(&self, auction_id: AuctionId) -> HandlerResult<SlotHandle> {
        self.auctions
            .read()
            .get(&auction_id)
            .cloned()
            .ok_or(AuctionError::NotFound(auction_id))
    }

    /// All slots in ascending id order.
    pub fn slots(&self) -> Vec<SlotHandle> {
        self.auctions.read().values().cloned().collect()
    }

    /// Total auctions ever created.
    pub fn counter(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Auction currently holding `asset`, if any.
    pub fn holder_of(&self, asset: &AssetRef) -> Option<AuctionId> {
        self.held_assets.lock().get(asset).copied()
    }

    /// Forget the asset hold of a settled auction.
    pub(crate) fn release_asset(&self, asset: &AssetRef, auction_id: AuctionId) {
        let mut held = self.held_assets.lock();
        if held.get(asset) == Some(&auction_id) {
            held.remove(asset);
        }
    }
}

/// Exclusive right to create one auction.
pub struct Reservation<'a> {
    registry: &'a AuctionRegistry,
    held: MutexGuard<'a, HashMap<AssetRef, AuctionId>>,
}

impl Reservation<'_> {
    /// Whether an unsettled auction already references `asset`.
    pub fn is_held(&self, asset: &AssetRef) -> bool {
        self.held.contains_key(asset)
    }

    /// Draw the next id, refusing one that is already taken.
    pub fn allocate_id(&self) -> HandlerResult<AuctionId> {
        let auction_id = self.registry.ids.next_id();
        if self.registry.auctions.read().contains_key(&auction_id) {
            return Err(AuctionError::DuplicateAuctionId(auction_id));
        }
        Ok(auction_id)
    }

    /// Persist the record and mark its asset as held.
    pub fn commit(mut self, record: AuctionRecord) -> AuctionId {
        let auction_id = record.auction_id;
        let asset = record.asset;
        self.registry
            .auctions
            .write()
            .insert(auction_id, Arc::new(Mutex::new(AuctionSlot::new(record))));
        self.held.insert(asset, auction_id);
        self.registry.created.fetch_add(1, Ordering::SeqCst);
        auction_id
    }
}

/// Withdrawable balances credited by settlement.
#[derive(Debug, Default)]
pub struct Treasury {
    balances: Mutex<HashMap<Address, u64>>,
}

impl Treasury {
    /// Get user's withdrawable balance.
    pub fn balance(&self, address: &Address) -> u64 {
        self.balances.lock().get(address).copied().unwrap_or(0)
    }

    /// Compute the balances after `credits` with checked arithmetic.
    ///
    /// Nothing changes until [`StagedCredits::commit`]. Balances stay locked
    /// while the staged credits are alive.
    pub fn stage(&self, credits: &[(Address, u64)]) -> HandlerResult<StagedCredits<'_>> {
        let balances = self.balances.lock();
        let mut updated: HashMap<Address, u64> = HashMap::new();
        for (address, amount) in credits {
            if *amount == 0 {
                continue;
            }
            let current = match updated.get(address) {
                Some(pending) => *pending,
                None => balances.get(address).copied().unwrap_or(0),
            };
            let next = current
                .checked_add(*amount)
                .ok_or(AuctionError::BalanceOverflow)?;
            updated.insert(*address, next);
        }
        Ok(StagedCredits { balances, updated })
    }

    /// Drain the caller's balance.
    pub fn withdraw(&self, address: &Address) -> HandlerResult<u64> {
        let mut balances = self.balances.lock();
        match balances.remove(address) {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(AuctionError::NothingToWithdraw),
        }
    }
}

/// Balances computed by [`Treasury::stage`], not yet written.
pub struct StagedCredits<'a> {
    balances: MutexGuard<'a, HashMap<Address, u64>>,
    updated: HashMap<Address, u64>,
}

impl StagedCredits<'_> {
    pub fn commit(mut self) {
        for (address, balance) in self.updated.drain() {
            self.balances.insert(address, balance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::CipherKind;

    fn dummy_ciphertext() -> Ciphertext {
        Ciphertext {
            kind: CipherKind::Uint64,
            nonce: [0u8; 12],
            payload: vec![0u8; 8],
            tag: [0u8; 16],
        }
    }

    fn record(auction_id: AuctionId, token_id: u64) -> AuctionRecord {
        AuctionRecord {
            auction_id,
            asset: AssetRef {
                custodian: [9u8; 32],
                token_id,
            },
            creator: [1u8; 32],
            reserve_price: 100,
            start_time: 0,
            end_time: 3600,
            ended_at: None,
            settled_at: None,
            state: AuctionState::Active,
            running_max: dummy_ciphertext(),
            running_max_owner: dummy_ciphertext(),
            bid_count: 0,
            outcome: None,
        }
    }

    struct FixedIds;

    impl IdAllocator for FixedIds {
        fn next_id(&self) -> AuctionId {
            42
        }
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::default();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);

        let ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_id(), 10);
    }

    #[test]
    fn test_reserve_and_commit() {
        let registry = AuctionRegistry::default();

        let reservation = registry.reserve();
        let id = reservation.allocate_id().unwrap();
        assert_eq!(reservation.commit(record(id, 0)), 0);

        assert_eq!(registry.counter(), 1);
        assert!(registry.get(0).is_ok());
        assert!(matches!(registry.get(1), Err(AuctionError::NotFound(1))));

        let asset = AssetRef {
            custodian: [9u8; 32],
            token_id: 0,
        };
        assert_eq!(registry.holder_of(&asset), Some(0));
        assert!(registry.reserve().is_held(&asset));

        registry.release_asset(&asset, 0);
        assert_eq!(registry.holder_of(&asset), None);
        assert_eq!(registry.counter(), 1);
    }

    #[test]
    fn test_duplicate_ids_refused() {
        let registry = AuctionRegistry::new(Box::new(FixedIds));

        let reservation = registry.reserve();
        let id = reservation.allocate_id().unwrap();
        reservation.commit(record(id, 0));

        let reservation = registry.reserve();
        assert!(matches!(
            reservation.allocate_id(),
            Err(AuctionError::DuplicateAuctionId(42))
        ));
        assert_eq!(registry.counter(), 1);
    }

    #[test]
    fn test_encrypted_data_hidden_after_settlement() {
        let mut rec = record(0, 0);
        assert!(rec.encrypted_data().is_ok());

        rec.state = AuctionState::Ended;
        assert!(rec.encrypted_data().is_ok());

        rec.state = AuctionState::Settled;
        assert!(matches!(
            rec.encrypted_data(),
            Err(AuctionError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_treasury_operations() {
        let treasury = Treasury::default();
        let addr = [1u8; 32];

        assert_eq!(treasury.balance(&addr), 0);
        assert!(matches!(
            treasury.withdraw(&addr),
            Err(AuctionError::NothingToWithdraw)
        ));

        treasury
            .stage(&[(addr, 100), (addr, 50), ([2u8; 32], 0)])
            .unwrap()
            .commit();
        assert_eq!(treasury.balance(&addr), 150);
        assert_eq!(treasury.balance(&[2u8; 32]), 0);

        assert_eq!(treasury.withdraw(&addr).unwrap(), 150);
        assert_eq!(treasury.balance(&addr), 0);
    }

    #[test]
    fn test_treasury_overflow_aborts_whole_batch() {
        let treasury = Treasury::default();
        let addr = [1u8; 32];
        let other = [2u8; 32];
        treasury.stage(&[(addr, u64::MAX - 10)]).unwrap().commit();

        // Dropping staged credits writes nothing
        drop(treasury.stage(&[(other, 5)]).unwrap());
        assert_eq!(treasury.balance(&other), 0);

        assert!(matches!(
            treasury.stage(&[(other, 5), (addr, 6), (addr, 5)]),
            Err(AuctionError::BalanceOverflow)
        ));
        assert_eq!(treasury.balance(&addr), u64::MAX - 10);
        assert_eq!(treasury.balance(&other), 0);

        treasury.stage(&[(addr, 10)]).unwrap().commit();
        assert_eq!(treasury.balance(&addr), u64::MAX);
    }
}
