//! Mock chain server for local testing of the sealed-bid auction engine.
//!
//! This provides a JSON-RPC server hosting one engine instance, an in-memory
//! NFT collection as the asset custodian and a manually driven clock, so the
//! full auction lifecycle can be exercised without a real blockchain.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use tracing::info;

use auction_module::{
    queries, AssetCustody, AuctionEngine, AuctionGenesisConfig, ConfidentialValue,
    InMemoryCustody, ManualClock,
};
use auction_types::{address_from_label, Address, Ciphertext, InputProof};

mod types;
use types::*;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "mock-chain", about = "JSON-RPC mock chain for sealed-bid auctions")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Genesis configuration (JSON)
    #[arg(long)]
    genesis: Option<PathBuf>,
}

/// RPC API definition for the mock chain.
#[rpc(server)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Move the clock forward to `timestamp`. Earlier values are ignored.
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<u64, ErrorObjectOwned>;

    /// Advance the clock by `seconds`.
    #[method(name = "admin_advanceTime")]
    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned>;

    // ============ NFT Methods ============

    /// Mint a token of the mock collection.
    #[method(name = "nft_mint")]
    async fn nft_mint(&self, to: String, uri: String) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "nft_ownerOf")]
    async fn nft_owner_of(&self, token_id: u64) -> Result<String, ErrorObjectOwned>;

    #[method(name = "nft_tokenUri")]
    async fn nft_token_uri(&self, token_id: u64) -> Result<String, ErrorObjectOwned>;

    #[method(name = "nft_isLocked")]
    async fn nft_is_locked(&self, token_id: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Encrypt a bid amount for submission.
    #[method(name = "auction_encryptBid")]
    async fn auction_encrypt_bid(&self, amount: u64) -> Result<EncryptedBidRpc, ErrorObjectOwned>;

    /// Create a new auction.
    #[method(name = "auction_create")]
    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Place a sealed bid.
    #[method(name = "auction_placeBid")]
    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned>;

    /// End an expired auction.
    #[method(name = "auction_end")]
    async fn auction_end(&self, auction_id: u64) -> Result<bool, ErrorObjectOwned>;

    /// Settle an ended auction.
    #[method(name = "auction_settle")]
    async fn auction_settle(&self, auction_id: u64) -> Result<SettlementRpc, ErrorObjectOwned>;

    /// Withdraw refunds and proceeds.
    #[method(name = "auction_withdraw")]
    async fn auction_withdraw(&self, sender: String) -> Result<u64, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Get auction by ID.
    #[method(name = "query_getAuction")]
    async fn query_get_auction(&self, auction_id: u64) -> Result<AuctionInfoRpc, ErrorObjectOwned>;

    #[method(name = "query_hasBid")]
    async fn query_has_bid(&self, auction_id: u64, bidder: String)
        -> Result<bool, ErrorObjectOwned>;

    /// Total auctions ever created.
    #[method(name = "query_counter")]
    async fn query_counter(&self) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "query_getEncryptedAuctionData")]
    async fn query_get_encrypted_auction_data(
        &self,
        auction_id: u64,
    ) -> Result<EncryptedAuctionDataRpc, ErrorObjectOwned>;

    /// List auctions in id order.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned>;

    /// Expired auctions waiting for `auction_end`.
    #[method(name = "query_pendingEnd")]
    async fn query_pending_end(&self) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned>;

    /// Ended auctions waiting for `auction_settle`.
    #[method(name = "query_pendingSettlement")]
    async fn query_pending_settlement(&self) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned>;

    /// Events from `since` on.
    #[method(name = "query_events")]
    async fn query_events(&self, since: Option<u64>) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    #[method(name = "query_withdrawable")]
    async fn query_withdrawable(&self, address: String) -> Result<u64, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
struct MockChainServer {
    engine: Arc<AuctionEngine>,
    custody: Arc<InMemoryCustody>,
    clock: Arc<ManualClock>,
}

impl MockChainServer {
    fn new(config: &AuctionGenesisConfig) -> Result<Self> {
        let custody = Arc::new(InMemoryCustody::new(address_from_label("mock-collection")));
        let clock = Arc::new(ManualClock::new(config.initial_timestamp));
        let engine = AuctionEngine::from_genesis(config, custody.clone(), clock.clone())
            .context("invalid genesis configuration")?;
        Ok(Self {
            engine: Arc::new(engine),
            custody,
            clock,
        })
    }

    fn rpc_error(msg: impl Display) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }
}

fn parse_address(s: &str) -> Result<Address, ErrorObjectOwned> {
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| MockChainServer::rpc_error(format!("Invalid address hex: {e}")))?
        .try_into()
        .map_err(|_| MockChainServer::rpc_error("Address must be 32 bytes"))
}

fn parse_bid(bid: &EncryptedBidRpc) -> Result<(Ciphertext, InputProof), ErrorObjectOwned> {
    let bytes = hex::decode(&bid.ciphertext)
        .map_err(|e| MockChainServer::rpc_error(format!("Invalid ciphertext hex: {e}")))?;
    let ciphertext = Ciphertext::from_bytes(&bytes)
        .ok_or_else(|| MockChainServer::rpc_error("Malformed ciphertext"))?;
    let proof: [u8; 32] = hex::decode(&bid.proof)
        .map_err(|e| MockChainServer::rpc_error(format!("Invalid proof hex: {e}")))?
        .try_into()
        .map_err(|_| MockChainServer::rpc_error("Proof must be 32 bytes"))?;
    Ok((ciphertext, InputProof(proof)))
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<u64, ErrorObjectOwned> {
        let now = self.clock.set(timestamp);
        info!("Timestamp set to {}", now);
        Ok(now)
    }

    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned> {
        let now = self.clock.advance(seconds);
        info!("Timestamp advanced to {}", now);
        Ok(now)
    }

    async fn nft_mint(&self, to: String, uri: String) -> Result<u64, ErrorObjectOwned> {
        let owner = parse_address(&to)?;
        let token_id = self.custody.mint(owner, uri);
        info!(token_id, owner = %to, "Token minted");
        Ok(token_id)
    }

    async fn nft_owner_of(&self, token_id: u64) -> Result<String, ErrorObjectOwned> {
        self.custody
            .owner_of(&self.custody.asset(token_id))
            .map(hex::encode)
            .map_err(Self::rpc_error)
    }

    async fn nft_token_uri(&self, token_id: u64) -> Result<String, ErrorObjectOwned> {
        self.custody.token_uri(token_id).map_err(Self::rpc_error)
    }

    async fn nft_is_locked(&self, token_id: u64) -> Result<bool, ErrorObjectOwned> {
        self.custody
            .is_locked(&self.custody.asset(token_id))
            .map_err(Self::rpc_error)
    }

    async fn auction_encrypt_bid(&self, amount: u64) -> Result<EncryptedBidRpc, ErrorObjectOwned> {
        let (ciphertext, proof) = self
            .engine
            .confidential()
            .encrypt_u64(amount)
            .map_err(Self::rpc_error)?;
        Ok(EncryptedBidRpc::new(&ciphertext, &proof))
    }

    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let creator = parse_address(&params.sender)?;
        self.engine
            .create_auction(
                creator,
                self.custody.asset(params.token_id),
                params.reserve_price,
                params.duration,
            )
            .map_err(Self::rpc_error)
    }

    async fn auction_place_bid(&self, params: PlaceBidParams) -> Result<bool, ErrorObjectOwned> {
        let bidder = parse_address(&params.sender)?;
        let (ciphertext, proof) = parse_bid(&params.bid)?;
        self.engine
            .place_bid(bidder, params.auction_id, ciphertext, proof, params.collateral)
            .map_err(Self::rpc_error)?;
        Ok(true)
    }

    async fn auction_end(&self, auction_id: u64) -> Result<bool, ErrorObjectOwned> {
        self.engine.end_auction(auction_id).map_err(Self::rpc_error)?;
        Ok(true)
    }

    async fn auction_settle(&self, auction_id: u64) -> Result<SettlementRpc, ErrorObjectOwned> {
        let outcome = self
            .engine
            .settle_auction(auction_id)
            .map_err(Self::rpc_error)?;
        Ok(SettlementRpc::new(auction_id, outcome))
    }

    async fn auction_withdraw(&self, sender: String) -> Result<u64, ErrorObjectOwned> {
        let caller = parse_address(&sender)?;
        self.engine.withdraw(caller).map_err(Self::rpc_error)
    }

    async fn query_get_auction(&self, auction_id: u64) -> Result<AuctionInfoRpc, ErrorObjectOwned> {
        self.engine
            .get_auction(auction_id)
            .map(AuctionInfoRpc::from)
            .map_err(Self::rpc_error)
    }

    async fn query_has_bid(
        &self,
        auction_id: u64,
        bidder: String,
    ) -> Result<bool, ErrorObjectOwned> {
        let bidder = parse_address(&bidder)?;
        self.engine
            .has_bid(auction_id, &bidder)
            .map_err(Self::rpc_error)
    }

    async fn query_counter(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.engine.counter())
    }

    async fn query_get_encrypted_auction_data(
        &self,
        auction_id: u64,
    ) -> Result<EncryptedAuctionDataRpc, ErrorObjectOwned> {
        self.engine
            .encrypted_auction_data(auction_id)
            .map(EncryptedAuctionDataRpc::from)
            .map_err(Self::rpc_error)
    }

    async fn query_list_auctions(
        &self,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned> {
        let offset = offset.unwrap_or(0) as usize;
        let limit = limit.unwrap_or(u64::MAX) as usize;
        Ok(queries::get_auction_summaries(&self.engine, offset, limit)
            .into_iter()
            .map(AuctionSummaryRpc::from)
            .collect())
    }

    async fn query_pending_end(&self) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned> {
        Ok(queries::get_pending_end(&self.engine, self.engine.now())
            .into_iter()
            .map(AuctionSummaryRpc::from)
            .collect())
    }

    async fn query_pending_settlement(&self) -> Result<Vec<AuctionSummaryRpc>, ErrorObjectOwned> {
        Ok(queries::get_pending_settlement(&self.engine)
            .into_iter()
            .map(AuctionSummaryRpc::from)
            .collect())
    }

    async fn query_events(&self, since: Option<u64>) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        Ok(self
            .engine
            .events_since(since.unwrap_or(0))
            .into_iter()
            .map(EventRpc::from)
            .collect())
    }

    async fn query_withdrawable(&self, address: String) -> Result<u64, ErrorObjectOwned> {
        let address = parse_address(&address)?;
        Ok(self.engine.withdrawable(&address))
    }
}

fn load_genesis(path: Option<&PathBuf>) -> Result<AuctionGenesisConfig> {
    let Some(path) = path else {
        return Ok(AuctionGenesisConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading genesis file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing genesis file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_chain=info".parse()?)
                .add_directive("auction_module=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let genesis = load_genesis(args.genesis.as_ref())?;
    let chain = MockChainServer::new(&genesis)?;

    info!(
        "Collection address: {}",
        hex::encode(chain.custody.address())
    );
    info!("Starting mock chain server on {}", args.listen);

    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(chain.into_rpc());

    info!("Mock chain server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
