// ============================================================================
// Deal Domain Model
// ============================================================================

use super::{OfferId, Price, Quantity, UserId};
use chrono::{DateTime, Utc};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DealId(u64);

impl DealId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable settlement record between a seller and a buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Deal {
    pub id: DealId,
    pub seller: UserId,
    pub buyer: UserId,

    /// Offer that was resting in the book
    pub maker_offer_id: OfferId,

    /// Offer whose posting triggered the match
    pub taker_offer_id: OfferId,

    /// Execution price (the resting offer's price)
    pub price: Price,

    /// Executed quantity of the traded asset
    pub quantity: Quantity,

    pub timestamp: DateTime<Utc>,
}

impl Deal {
    pub fn new(
        id: DealId,
        seller: UserId,
        buyer: UserId,
        maker_offer_id: OfferId,
        taker_offer_id: OfferId,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id,
            seller,
            buyer,
            maker_offer_id,
            taker_offer_id,
            price,
            quantity,
            timestamp: Utc::now(),
        }
    }

    /// Amount of the price currency that changes hands (`price * quantity`),
    /// `None` when it does not fit an `i64`
    pub fn notional(&self) -> Option<i64> {
        i64::try_from(self.quantity)
            .ok()
            .and_then(|quantity| self.price.checked_mul(quantity))
    }

    /// Buyer and seller are the same user
    pub fn is_self_trade(&self) -> bool {
        self.buyer == self.seller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(seller: u64, buyer: u64, price: Price, quantity: Quantity) -> Deal {
        Deal::new(
            DealId::new(1),
            UserId::new(seller),
            UserId::new(buyer),
            OfferId::new(0),
            OfferId::new(1),
            price,
            quantity,
        )
    }

    #[test]
    fn test_deal_creation() {
        let deal = deal(1, 2, 80, 10);

        assert_eq!(deal.price, 80);
        assert_eq!(deal.quantity, 10);
        assert_eq!(deal.notional(), Some(800));
        assert!(!deal.is_self_trade());
    }

    #[test]
    fn test_negative_price_notional() {
        let deal = deal(3, 3, -5, 4);

        assert_eq!(deal.notional(), Some(-20));
        assert!(deal.is_self_trade());
    }

    #[test]
    fn test_notional_overflow() {
        assert_eq!(deal(1, 2, i64::MAX, 2).notional(), None);
        assert_eq!(deal(1, 2, i64::MIN, 1).notional(), Some(i64::MIN));
        assert_eq!(deal(1, 2, 1, u64::MAX).notional(), None);
    }
}
