// ============================================================================
// Offer Domain Model
// ============================================================================

use super::{Deal, DealId, Price, Quantity, UserId};
use crate::error::{ExchangeError, Result};
use chrono::{DateTime, Utc};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OfferId(u64);

impl OfferId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Offer lifecycle: `Active -> Fulfilled`, exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OfferStatus {
    Active,
    Fulfilled,
}

// ============================================================================
// Offer Entity
// ============================================================================

/// A resting limit order.
///
/// The canonical instance lives in its owner's [`Account`](super::Account);
/// the order book only refers to it by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub id: OfferId,
    pub owner_id: UserId,
    pub side: Side,
    pub price: Price,
    /// Quantity at posting time
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,

    remaining_quantity: Quantity,
    status: OfferStatus,
}

impl Offer {
    pub fn new(id: OfferId, owner_id: UserId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            owner_id,
            side,
            price,
            quantity,
            timestamp: Utc::now(),
            remaining_quantity: quantity,
            status: OfferStatus::Active,
        }
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.remaining_quantity
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == OfferStatus::Fulfilled
    }

    /// Trade this (incoming) offer against a `resting` offer of the opposite side.
    ///
    /// Quantity is the smaller of both remainders and the price is the resting
    /// offer's. Both offers are decremented; whichever reaches zero becomes
    /// `Fulfilled`. Neither the ledger nor the book is touched here.
    pub fn make_deal(&mut self, resting: &mut Offer, deal_id: DealId) -> Result<Deal> {
        if self.side == resting.side {
            return Err(ExchangeError::SameSideDeal { side: self.side });
        }

        let quantity = self.remaining_quantity.min(resting.remaining_quantity);
        let price = resting.price;

        self.fill(quantity);
        resting.fill(quantity);

        let (seller, buyer) = match self.side {
            Side::Sell => (self.owner_id, resting.owner_id),
            Side::Buy => (resting.owner_id, self.owner_id),
        };

        Ok(Deal::new(
            deal_id,
            seller,
            buyer,
            resting.id,
            self.id,
            price,
            quantity,
        ))
    }

    fn fill(&mut self, quantity: Quantity) {
        debug_assert!(quantity <= self.remaining_quantity);
        debug_assert_eq!(self.status, OfferStatus::Active);

        self.remaining_quantity -= quantity;
        if self.remaining_quantity == 0 {
            self.status = OfferStatus::Fulfilled;
        }
    }
}
