// ============================================================================
// Account Ledger Domain Model
// Per-user balances plus the offers and deals the user owns
// ============================================================================

use super::{Deal, DealId, Offer, OfferId};
use crate::error::{ExchangeError, Result};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UserId(u64);

impl UserId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed balances; no floor is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub struct Balance {
    /// Traded asset
    pub usd: i64,
    /// Price currency
    pub rub: i64,
}

impl Balance {
    pub const fn new(usd: i64, rub: i64) -> Self {
        Self { usd, rub }
    }

    /// Balance after receiving `usd` and paying `rub`, `None` on overflow
    pub fn checked_buy(self, usd: i64, rub: i64) -> Option<Balance> {
        Some(Balance {
            usd: self.usd.checked_add(usd)?,
            rub: self.rub.checked_sub(rub)?,
        })
    }

    /// Balance after delivering `usd` and receiving `rub`, `None` on overflow
    pub fn checked_sell(self, usd: i64, rub: i64) -> Option<Balance> {
        Some(Balance {
            usd: self.usd.checked_sub(usd)?,
            rub: self.rub.checked_add(rub)?,
        })
    }

    /// Both balances shifted by the given deltas, `None` if either overflows
    pub fn checked_adjust(self, usd: i64, rub: i64) -> Option<Balance> {
        Some(Balance {
            usd: self.usd.checked_add(usd)?,
            rub: self.rub.checked_add(rub)?,
        })
    }
}

/// Account ledger entry. Owns the user's active offers and closed deals,
/// both keyed (and therefore ordered) by id.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    balance: Balance,
    active_offers: BTreeMap<OfferId, Offer>,
    closed_deals: BTreeMap<DealId, Deal>,
}

impl Account {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            balance: Balance::default(),
            active_offers: BTreeMap::new(),
            closed_deals: BTreeMap::new(),
        }
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    // ========================================================================
    // Balances
    // ========================================================================

    /// Apply signed deltas to both balances, or to neither when either
    /// would overflow
    pub fn adjust_balance(&mut self, usd: i64, rub: i64) -> Result<()> {
        self.replace_balance(self.balance.checked_adjust(usd, rub))
    }

    /// Buyer's side of a deal: `usd` in, `rub` out
    pub fn settle_buy(&mut self, usd: i64, rub: i64) -> Result<()> {
        self.replace_balance(self.balance.checked_buy(usd, rub))
    }

    /// Seller's side of a deal: `usd` out, `rub` in
    pub fn settle_sell(&mut self, usd: i64, rub: i64) -> Result<()> {
        self.replace_balance(self.balance.checked_sell(usd, rub))
    }

    fn replace_balance(&mut self, balance: Option<Balance>) -> Result<()> {
        self.balance = balance.ok_or(ExchangeError::BalanceOverflow { user_id: self.id })?;
        Ok(())
    }

    // ========================================================================
    // Offers
    // ========================================================================

    pub fn add_offer(&mut self, offer: Offer) {
        self.active_offers.insert(offer.id, offer);
    }

    /// Drop an offer from the active set. Returns false when it is not there.
    pub fn remove_active_offer(&mut self, offer_id: OfferId) -> bool {
        self.active_offers.remove(&offer_id).is_some()
    }

    pub fn has_active_offer(&self, offer_id: OfferId) -> bool {
        self.active_offers.contains_key(&offer_id)
    }

    pub fn active_offer(&self, offer_id: OfferId) -> Option<&Offer> {
        self.active_offers.get(&offer_id)
    }

    pub fn active_offer_mut(&mut self, offer_id: OfferId) -> Option<&mut Offer> {
        self.active_offers.get_mut(&offer_id)
    }

    pub fn active_offers(&self) -> impl Iterator<Item = &Offer> {
        self.active_offers.values()
    }

    // ========================================================================
    // Deals
    // ========================================================================

    pub fn add_deal(&mut self, deal: Deal) {
        self.closed_deals.insert(deal.id, deal);
    }

    pub fn closed_deals(&self) -> impl Iterator<Item = &Deal> {
        self.closed_deals.values()
    }
}
