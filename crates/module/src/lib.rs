//! Sealed-bid auction module with confidential bid comparison.
//!
//! This module implements the auction core:
//!
//! - Auction creation against an asset held by an external custodian
//! - Sealed bid submission with an encrypted running maximum
//! - Lifecycle transitions gated on an injected clock
//! - Settlement with a single privileged disclosure of winner and price
//! - Escrow accounting with pull-based withdrawals
//!
//! # Architecture
//!
//! - `state`: auction records, the registry and withdrawable balances
//! - `ledger`: bid ledger and the oblivious running-maximum update
//! - `lifecycle`: creation and guarded state transitions
//! - `settlement`: disclosure, asset transfer and escrow disposition
//! - `engine`: the facade tying these to collaborators and the clock
//! - `custody` / `confidential` / `clock`: collaborator contracts
//! - `call` / `handlers` / `queries`: message routing for a host runtime
//! - `genesis`: initial configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{AuctionEngine, AuctionGenesisConfig};
//!
//! let engine = AuctionEngine::from_genesis(&config, custody, clock)?;
//! let auction_id = engine.create_auction(creator, asset, 100, 3600)?;
//!
//! let (bid, proof) = engine.confidential().encrypt_u64(150)?;
//! engine.place_bid(bidder, auction_id, bid, proof, 150)?;
//! ```

pub mod call;
pub mod clock;
pub mod confidential;
pub mod custody;
pub mod engine;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod ledger;
pub mod lifecycle;
pub mod queries;
pub mod settlement;
pub mod state;

pub use call::AuctionCall;
pub use clock::{Clock, ManualClock, SystemClock};
pub use confidential::{ConfidentialValue, SealedBackend};
pub use custody::{AssetCustody, CustodyError, InMemoryCustody};
pub use engine::AuctionEngine;
pub use error::{AuctionError, ErrorKind};
pub use genesis::{AuctionGenesisConfig, DefaultAuctionParams, GenesisValidationError};
pub use handlers::{dispatch, CallContext, CallOutcome, HandlerResult};
pub use ledger::EscrowStatus;
pub use queries::{AuctionQuery, AuctionQueryResponse, AuctionSummary};
pub use state::{IdAllocator, SequentialIds};
