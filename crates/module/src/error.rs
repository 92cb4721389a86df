//! Auction module error types.

use thiserror::Error;

use auction_crypto::CryptoError;
use auction_types::{AuctionId, AuctionState};

use crate::custody::CustodyError;

/// Broad classification of an [`AuctionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A guard rejected the call before any state was written.
    Precondition,
    /// An external collaborator failed; the operation was aborted without commit.
    Collaborator,
}

/// Errors that can occur in the auction module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    NotFound(AuctionId),

    #[error("Caller is not the asset owner")]
    NotAssetOwner,

    #[error("Asset already locked by another auction")]
    AssetAlreadyLocked,

    #[error("Invalid auction duration")]
    InvalidDuration,

    #[error("Invalid state. Expected: {expected:?}, Got: {got:?}")]
    InvalidState {
        expected: AuctionState,
        got: AuctionState,
    },

    #[error("Auction expired")]
    AuctionExpired,

    #[error("Auction not yet expired")]
    AuctionNotExpired,

    #[error("Already settled")]
    AlreadySettled,

    #[error("Bid below reserve price")]
    BelowReserve,

    #[error("Bid amount must be greater than 0")]
    ZeroBid,

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Invalid bid proof")]
    InvalidProof,

    #[error("Already submitted bid")]
    AlreadyBid,

    #[error("Insufficient collateral")]
    InsufficientCollateral,

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Auction id already in use: {0}")]
    DuplicateAuctionId(AuctionId),

    #[error("Asset transfer failed: {0}")]
    AssetTransferFailed(String),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Confidential value error: {0}")]
    Confidential(#[from] CryptoError),
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::AssetTransferFailed(_)
            | AuctionError::Custody(_)
            | AuctionError::Confidential(_) => ErrorKind::Collaborator,
            _ => ErrorKind::Precondition,
        }
    }

    /// Whether re-invoking the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Collaborator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AuctionError::BelowReserve.kind(), ErrorKind::Precondition);
        assert_eq!(AuctionError::ZeroBid.kind(), ErrorKind::Precondition);
        assert_eq!(AuctionError::NotFound(3).kind(), ErrorKind::Precondition);
        assert_eq!(
            AuctionError::AssetTransferFailed("rejected".into()).kind(),
            ErrorKind::Collaborator
        );
        assert!(AuctionError::Confidential(CryptoError::AuthenticationFailed).is_retryable());
        assert!(!AuctionError::AlreadySettled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = AuctionError::InvalidState {
            expected: AuctionState::Ended,
            got: AuctionState::Active,
        };
        assert_eq!(err.to_string(), "Invalid state. Expected: Ended, Got: Active");
    }
}
