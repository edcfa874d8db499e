//! Ledger adapter
//!
//! Value and assets enter and leave the treasury through the types here. The
//! host ledger owns the real balances; the treasury only needs exact-amount
//! deposit and withdraw plus a fire-and-forget transfer primitive.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TreasuryError};

/// A quantity of fungible value in flight between accounts.
///
/// Not `Clone`: a coin is moved, never duplicated.
#[derive(Debug, PartialEq, Eq)]
pub struct Coin {
    value: u64,
}

impl Coin {
    /// Minting belongs to the host ledger; the treasury never calls this itself.
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Take exactly `amount` out of this coin
    pub fn split(&mut self, amount: u64) -> Result<Coin> {
        if amount > self.value {
            return Err(TreasuryError::InsufficientBalance {
                requested: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Coin::new(amount))
    }

    /// Merge `other` into this coin. On overflow nothing is merged and
    /// `other` is handed back.
    pub fn join(&mut self, other: Coin) -> std::result::Result<(), Coin> {
        match self.value.checked_add(other.value) {
            Some(value) => {
                self.value = value;
                Ok(())
            }
            None => Err(other),
        }
    }
}

/// Custodied fungible balance with exact-amount semantics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Balance {
    value: u64,
}

impl Balance {
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Check that `amount` can be deposited without overflowing
    pub fn ensure_can_deposit(&self, amount: u64) -> Result<()> {
        if self.value.checked_add(amount).is_none() {
            return Err(TreasuryError::AmountOverflow {
                current: self.value,
                added: amount,
            });
        }
        Ok(())
    }

    /// Absorb a coin, returning the new balance. Fails leaving the balance
    /// untouched if the sum would overflow.
    pub fn deposit(&mut self, coin: Coin) -> Result<u64> {
        self.ensure_can_deposit(coin.value)?;
        self.value += coin.value;
        Ok(self.value)
    }

    /// Withdraw exactly `amount`, or fail leaving the balance untouched
    pub fn withdraw(&mut self, amount: u64) -> Result<Coin> {
        if amount > self.value {
            return Err(TreasuryError::InsufficientBalance {
                requested: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Coin::new(amount))
    }
}

/// A non-fungible asset that can be placed in treasury custody
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub id: String,
    pub name: String,
}

impl Asset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Receipt minted for every donation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collectible {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
}

/// Non-transferable proof of membership. Issued by the treasury; there is no
/// API that moves a badge once delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipBadge {
    pub wallet_id: String,
    pub member: String,
}

/// Anything the treasury hands to an external identity
#[derive(Debug, PartialEq)]
pub enum Payload {
    Coin(Coin),
    Asset(Asset),
    Collectible(Collectible),
    Badge(MembershipBadge),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Coin(_) => "coin",
            Payload::Asset(_) => "asset",
            Payload::Collectible(_) => "collectible",
            Payload::Badge(_) => "badge",
        }
    }
}

/// Transfer primitive. Delivery is assumed to succeed once invoked.
///
/// Called after the treasury lock is released, so transfers from concurrent
/// calls reach the host ledger in no particular order.
pub trait Payout: Send + Sync {
    fn transfer(&self, to: &str, payload: Payload);
}

/// Payout that only records transfers in the log; the host ledger settles them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPayout;

impl Payout for LoggingPayout {
    fn transfer(&self, to: &str, payload: Payload) {
        match &payload {
            Payload::Coin(coin) => log::info!("💸 Transfer {} to {}", coin.value(), to),
            Payload::Asset(asset) => log::info!("📦 Transfer asset {} to {}", asset.id, to),
            Payload::Collectible(c) => log::info!("🎁 Transfer collectible {} to {}", c.id, to),
            Payload::Badge(badge) => {
                log::info!("🪪 Issue membership badge for {} to {}", badge.wallet_id, to)
            }
        }
    }
}

/// Holdings of one identity in an [`InMemoryLedger`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Holdings {
    pub balance: u64,
    pub assets: Vec<Asset>,
    pub collectibles: Vec<Collectible>,
    pub badges: Vec<MembershipBadge>,
}

/// Ledger kept in process memory, for single-process hosts and tests
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<String, Holdings>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holdings(&self, identity: &str) -> Holdings {
        self.accounts
            .lock()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    pub fn balance_of(&self, identity: &str) -> u64 {
        self.holdings(identity).balance
    }
}

impl Payout for InMemoryLedger {
    fn transfer(&self, to: &str, payload: Payload) {
        let mut accounts = self.accounts.lock();
        let holdings = accounts.entry(to.to_string()).or_default();
        match payload {
            Payload::Coin(coin) => match holdings.balance.checked_add(coin.value()) {
                Some(balance) => holdings.balance = balance,
                None => {
                    log::warn!("Balance of {} saturated receiving {}", to, coin.value());
                    holdings.balance = u64::MAX;
                }
            },
            Payload::Asset(asset) => holdings.assets.push(asset),
            Payload::Collectible(collectible) => holdings.collectibles.push(collectible),
            Payload::Badge(badge) => holdings.badges.push(badge),
        }
    }
}
