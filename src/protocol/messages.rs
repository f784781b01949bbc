// ============================================================================
// Protocol Messages
// Closed set of request and response variants, tagged by `TYPE` on the wire
// ============================================================================

use crate::domain::{Deal, Offer, OfferId, Price, Quantity, Side, UserId};
use crate::engine::{AskBidQuotes, Spread};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Currency {
    Usd,
    Rub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "TYPE", rename_all_fields = "SCREAMING_SNAKE_CASE")
)]
pub enum Request {
    #[cfg_attr(feature = "serde", serde(rename = "Reg"))]
    Register { username: String, pw_hash: u64 },

    #[cfg_attr(feature = "serde", serde(rename = "Log"))]
    Login { username: String, pw_hash: u64 },

    Balance { user_id: UserId },

    #[cfg_attr(feature = "serde", serde(rename = "Active"))]
    ActiveOffers { user_id: UserId },

    #[cfg_attr(feature = "serde", serde(rename = "Deal"))]
    ClosedDeals { user_id: UserId },

    PostOffer {
        user_id: UserId,
        offer_side: Side,
        price: Price,
        amount: Quantity,
    },

    Quotes { user_id: UserId },

    Cancel { user_id: UserId, offer_id: OfferId },

    Deposit {
        user_id: UserId,
        currency: Currency,
        /// Credits only; a negative amount does not decode
        amount: Quantity,
    },
}

impl Request {
    pub fn post_offer(user_id: UserId, side: Side, price: Price, amount: Quantity) -> Self {
        Request::PostOffer {
            user_id,
            offer_side: side,
            price,
            amount,
        }
    }
}

/// Active offer as reported to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub struct OfferEntry {
    pub offer_id: OfferId,
    pub price: Price,
    pub amount: Quantity,
}

/// Closed deal as reported to one of its parties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub struct DealEntry {
    pub price: Price,
    pub amount: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "TYPE", rename_all_fields = "SCREAMING_SNAKE_CASE")
)]
pub enum Response {
    #[cfg_attr(feature = "serde", serde(rename = "RegConf"))]
    Registration {
        success: bool,
        user_id: Option<UserId>,
    },

    #[cfg_attr(feature = "serde", serde(rename = "Log"))]
    Login {
        success: bool,
        user_id: Option<UserId>,
    },

    Balance { usd: i64, rub: i64 },

    #[cfg_attr(feature = "serde", serde(rename = "Active"))]
    ActiveOffers {
        buy: Vec<OfferEntry>,
        sell: Vec<OfferEntry>,
    },

    #[cfg_attr(feature = "serde", serde(rename = "Deal"))]
    ClosedDeals {
        buy: Vec<DealEntry>,
        sell: Vec<DealEntry>,
        /// Self-trades, where the user was on both sides
        #[cfg_attr(feature = "serde", serde(rename = "BUY-SELL"))]
        buy_sell: Vec<DealEntry>,
    },

    Quotes {
        quote: Option<Price>,
        ask_quote: Option<Price>,
        bid_quote: Option<Price>,
        spread: Option<Spread>,
    },

    Cancel { success: bool },

    PostOffer { offer_id: OfferId },

    Deposit { usd: i64, rub: i64 },

    Error { message: String },
}

impl Response {
    pub fn active_offers(offers: &[Offer]) -> Self {
        let (mut buy, mut sell) = (Vec::new(), Vec::new());
        for offer in offers {
            let entry = OfferEntry {
                offer_id: offer.id,
                price: offer.price,
                amount: offer.remaining_quantity(),
            };
            match offer.side {
                Side::Buy => buy.push(entry),
                Side::Sell => sell.push(entry),
            }
        }

        Response::ActiveOffers { buy, sell }
    }

    /// Bucket `deals` from `user_id`'s point of view
    pub fn closed_deals(user_id: UserId, deals: &[Deal]) -> Self {
        let (mut buy, mut sell, mut buy_sell) = (Vec::new(), Vec::new(), Vec::new());
        for deal in deals {
            let entry = DealEntry {
                price: deal.price,
                amount: deal.quantity,
            };
            if deal.is_self_trade() {
                buy_sell.push(entry);
            } else if deal.buyer == user_id {
                buy.push(entry);
            } else {
                sell.push(entry);
            }
        }

        Response::ClosedDeals {
            buy,
            sell,
            buy_sell,
        }
    }

    pub fn quotes(quote: Option<Price>, quotes: AskBidQuotes) -> Self {
        Response::Quotes {
            quote,
            ask_quote: quotes.ask,
            bid_quote: quotes.bid,
            spread: quotes.spread,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}
