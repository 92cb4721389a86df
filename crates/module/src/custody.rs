//! Asset custody contract consumed by the engine, plus an in-memory collection.
//!
//! The custodian is the authority on who owns an asset. The engine only asks
//! for the owner, toggles the lock flag, and requests a transfer at settlement.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use auction_types::{Address, AssetRef};

/// Errors reported by a custodian.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("Unknown custodian")]
    UnknownCustodian,

    #[error("Unknown asset: {0}")]
    UnknownAsset(u64),

    #[error("Not the owner")]
    NotOwner,

    #[error("Asset is locked")]
    AlreadyLocked,

    #[error("Asset is not locked")]
    NotLocked,

    #[error("Custodian unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative ownership registry for auctioned assets.
pub trait AssetCustody: Send + Sync {
    fn owner_of(&self, asset: &AssetRef) -> Result<Address, CustodyError>;

    fn is_locked(&self, asset: &AssetRef) -> Result<bool, CustodyError>;

    fn lock(&self, asset: &AssetRef) -> Result<(), CustodyError>;

    fn unlock(&self, asset: &AssetRef) -> Result<(), CustodyError>;

    /// Move an unlocked asset from `from` to `to`.
    fn transfer(&self, asset: &AssetRef, from: &Address, to: &Address)
        -> Result<(), CustodyError>;
}

#[derive(Debug, Clone)]
struct Token {
    owner: Address,
    uri: String,
    locked: bool,
}

#[derive(Debug, Default)]
struct Collection {
    next_token_id: u64,
    tokens: HashMap<u64, Token>,
}

/// A non-fungible token collection living at a single custodian address.
#[derive(Debug)]
pub struct InMemoryCustody {
    address: Address,
    inner: RwLock<Collection>,
}

impl InMemoryCustody {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            inner: RwLock::new(Collection::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Mint a token to `to` and return its id.
    pub fn mint(&self, to: Address, uri: impl Into<String>) -> u64 {
        let mut inner = self.inner.write();
        let token_id = inner.next_token_id;
        inner.next_token_id += 1;
        inner.tokens.insert(
            token_id,
            Token {
                owner: to,
                uri: uri.into(),
                locked: false,
            },
        );
        token_id
    }

    /// Reference to a token of this collection.
    pub fn asset(&self, token_id: u64) -> AssetRef {
        AssetRef {
            custodian: self.address,
            token_id,
        }
    }

    pub fn next_token_id(&self) -> u64 {
        self.inner.read().next_token_id
    }

    pub fn token_uri(&self, token_id: u64) -> Result<String, CustodyError> {
        self.inner
            .read()
            .tokens
            .get(&token_id)
            .map(|t| t.uri.clone())
            .ok_or(CustodyError::UnknownAsset(token_id))
    }

    fn check_custodian(&self, asset: &AssetRef) -> Result<(), CustodyError> {
        if asset.custodian != self.address {
            return Err(CustodyError::UnknownCustodian);
        }
        Ok(())
    }

    fn with_token<T>(
        &self,
        asset: &AssetRef,
        f: impl FnOnce(&mut Token) -> Result<T, CustodyError>,
    ) -> Result<T, CustodyError> {
        self.check_custodian(asset)?;
        let mut inner = self.inner.write();
        let token = inner
            .tokens
            .get_mut(&asset.token_id)
            .ok_or(CustodyError::UnknownAsset(asset.token_id))?;
        f(token)
    }
}

impl AssetCustody for InMemoryCustody {
    fn owner_of(&self, asset: &AssetRef) -> Result<Address, CustodyError> {
        self.check_custodian(asset)?;
        self.inner
            .read()
            .tokens
            .get(&asset.token_id)
            .map(|t| t.owner)
            .ok_or(CustodyError::UnknownAsset(asset.token_id))
    }

    fn is_locked(&self, asset: &AssetRef) -> Result<bool, CustodyError> {
        self.check_custodian(asset)?;
        self.inner
            .read()
            .tokens
            .get(&asset.token_id)
            .map(|t| t.locked)
            .ok_or(CustodyError::UnknownAsset(asset.token_id))
    }

    fn lock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
        self.with_token(asset, |token| {
            if token.locked {
                return Err(CustodyError::AlreadyLocked);
            }
            token.locked = true;
            Ok(())
        })
    }

    fn unlock(&self, asset: &AssetRef) -> Result<(), CustodyError> {
        self.with_token(asset, |token| {
            if !token.locked {
                return Err(CustodyError::NotLocked);
            }
            token.locked = false;
            Ok(())
        })
    }

    fn transfer(
        &self,
        asset: &AssetRef,
        from: &Address,
        to: &Address,
    ) -> Result<(), CustodyError> {
        self.with_token(asset, |token| {
            if token.locked {
                return Err(CustodyError::AlreadyLocked);
            }
            if token.owner != *from {
                return Err(CustodyError::NotOwner);
            }
            token.owner = *to;
            Ok(())
        })
    }
}
