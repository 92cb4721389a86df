//! Per-auction bid ledger and the confidential running-maximum protocol.
//!
//! A bid is accepted in one pass: every guard and every call into the
//! confidential backend runs first, and only then is the ledger entry written
//! and the running maximum replaced. Any failure leaves the slot untouched.

use std::collections::HashMap;

use auction_types::{Address, CipherKind, Ciphertext, InputProof, Plaintext};

use crate::confidential::ConfidentialValue;
use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::lifecycle;
use crate::state::AuctionSlot;

/// What happened to a bidder's collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    /// Locked while the auction is unsettled
    Held,
    /// Returned in full to a non-winning bidder
    Refunded(u64),
    /// Winning collateral: `paid` went to the creator, the rest back to the bidder
    Captured { paid: u64, refunded: u64 },
}

/// A submitted sealed bid.
#[derive(Debug, Clone)]
pub struct BidEntry {
    pub bidder: Address,
    pub encrypted_bid: Ciphertext,
    pub collateral: u64,
    pub placed_at: u64,
    pub escrow: EscrowStatus,
}

/// Bidder -> entry for one auction. At most one entry per bidder.
#[derive(Debug, Default)]
pub struct BidLedger {
    entries: HashMap<Address, BidEntry>,
    order: Vec<Address>,
}

impl BidLedger {
    pub fn has_bid(&self, bidder: &Address) -> bool {
        self.entries.contains_key(bidder)
    }

    pub fn get(&self, bidder: &Address) -> Option<&BidEntry> {
        self.entries.get(bidder)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in submission order.
    pub fn entries(&self) -> impl Iterator<Item = &BidEntry> {
        self.order.iter().filter_map(|bidder| self.entries.get(bidder))
    }

    /// Sum of collateral still held.
    pub fn total_held(&self) -> u64 {
        self.entries()
            .filter(|e| e.escrow == EscrowStatus::Held)
            .map(|e| e.collateral)
            .sum()
    }

    fn insert(&mut self, entry: BidEntry) -> HandlerResult<()> {
        if self.entries.contains_key(&entry.bidder) {
            return Err(AuctionError::AlreadyBid);
        }
        self.order.push(entry.bidder);
        self.entries.insert(entry.bidder, entry);
        Ok(())
    }

    pub(crate) fn set_escrow(&mut self, bidder: &Address, status: EscrowStatus) {
        if let Some(entry) = self.entries.get_mut(bidder) {
            entry.escrow = status;
        }
    }
}

/// Permission to disclose a comparison against a public threshold.
///
/// Only the bid ledger mints these.
#[derive(Debug)]
pub struct ThresholdGrant {
    _private: (),
}

impl ThresholdGrant {
    fn new() -> Self {
        Self { _private: () }
    }
}

/// A sealed bid as submitted by a bidder.
#[derive(Debug, Clone)]
pub struct SealedBid {
    pub bidder: Address,
    pub encrypted_bid: Ciphertext,
    pub proof: InputProof,
    pub collateral: u64,
}

/// Accept a bid into `slot`, updating the running maximum obliviously.
pub fn place_bid(
    slot: &mut AuctionSlot,
    confidential: &dyn ConfidentialValue,
    bid: SealedBid,
    min_collateral: u64,
    now: u64,
) -> HandlerResult<()> {
    let record = &slot.record;

    lifecycle::check_accepting_bids(record, now)?;

    if slot.bids.has_bid(&bid.bidder) {
        return Err(AuctionError::AlreadyBid);
    }

    if bid.collateral == 0 || bid.collateral < min_collateral {
        return Err(AuctionError::InsufficientCollateral);
    }

    if bid.encrypted_bid.kind != CipherKind::Uint64
        || !confidential.verify_proof(&bid.encrypted_bid, &bid.proof)
    {
        return Err(AuctionError::InvalidProof);
    }

    let grant = ThresholdGrant::new();

    // Public threshold: a bid must be positive to ever own the maximum
    let (zero, _) = confidential.encrypt_u64(0)?;
    let positive = confidential.compare_greater(&bid.encrypted_bid, &zero)?;
    if !confidential.reveal_threshold(&grant, &positive)? {
        return Err(AuctionError::ZeroBid);
    }

    // Public threshold: reserve > bid means the bid is rejected
    let (reserve, _) = confidential.encrypt_u64(record.reserve_price)?;
    let below_reserve = confidential.compare_greater(&reserve, &bid.encrypted_bid)?;
    if confidential.reveal_threshold(&grant, &below_reserve)? {
        return Err(AuctionError::BelowReserve);
    }

    // Public threshold: the collateral must cover the bid
    let (collateral, _) = confidential.encrypt_u64(bid.collateral)?;
    let over_collateral = confidential.compare_greater(&bid.encrypted_bid, &collateral)?;
    if confidential.reveal_threshold(&grant, &over_collateral)? {
        return Err(AuctionError::InsufficientCollateral);
    }

    // Running maximum, selected without decrypting the comparison.
    // Ties keep the earlier bid.
    let is_higher = confidential.compare_greater(&bid.encrypted_bid, &record.running_max)?;
    let new_max =
        confidential.oblivious_select(&is_higher, &bid.encrypted_bid, &record.running_max)?;
    let (bidder, _) = confidential.encrypt(Plaintext::Address(bid.bidder))?;
    let new_owner =
        confidential.oblivious_select(&is_higher, &bidder, &record.running_max_owner)?;

    let bid_count = record.bid_count.saturating_add(1);

    // Commit
    slot.bids.insert(BidEntry {
        bidder: bid.bidder,
        encrypted_bid: bid.encrypted_bid,
        collateral: bid.collateral,
        placed_at: now,
        escrow: EscrowStatus::Held,
    })?;
    slot.record.running_max = new_max;
    slot.record.running_max_owner = new_owner;
    slot.record.bid_count = bid_count;

    Ok(())
}
