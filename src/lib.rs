// ============================================================================
// Currency Exchange Library
// Single-instrument USD/RUB market with price-time priority matching
// ============================================================================

//! # Currency Exchange
//!
//! An in-memory exchange for one instrument: users post buy and sell offers
//! for USD priced in RUB, offers cross against the opposite book side and
//! every deal settles immediately into both parties' balances.
//!
//! ## Features
//!
//! - **Price-time priority** with execution at the resting offer's price
//! - **Lazy cancellation**: book entries of canceled offers are pruned when met
//! - **Signed balances** with no credit check
//! - **Pluggable persistence** through the [`interfaces::EventStore`] trait
//! - **JSON request protocol** with a tokio TCP front end (`async` feature)
//!
//! ## Example
//!
//! ```rust
//! use currency_exchange::prelude::*;
//!
//! let mut market = Market::default();
//! let seller = market.register_user("seller");
//! let buyer = market.register_user("buyer");
//!
//! market.post_offer(seller, Side::Sell, 80, 10).unwrap();
//! let outcome = market.post_offer(buyer, Side::Buy, 80, 10).unwrap();
//!
//! assert!(outcome.is_fulfilled());
//! assert_eq!(market.balance(buyer).unwrap(), Balance::new(10, -800));
//! assert_eq!(market.quote(), Some(80));
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod protocol;

#[cfg(feature = "async")]
pub mod server;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        Balance, Deal, DealId, ExchangeConfig, Offer, OfferId, OfferStatus, Price, Quantity, Side,
        UserId,
    };
    pub use crate::engine::{
        create_from_config, AskBidQuotes, ExchangeActor, ExchangeHandle, Market, MarketBuilder,
        PostOutcome,
    };
    pub use crate::error::ExchangeError;
    pub use crate::interfaces::{EventStore, InMemoryEventStore, NoOpEventStore, StoreError};
    pub use crate::protocol::{Currency, Exchange, Request, Response, SharedExchange};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;

    fn market_with_users(count: usize) -> (Market, Vec<UserId>) {
        let mut market = Market::default();
        let users = (0..count)
            .map(|i| market.register_user(&format!("user{}", i + 1)))
            .collect();
        (market, users)
    }

    fn deal_summary(deals: &[Deal]) -> Vec<(Price, Quantity)> {
        deals.iter().map(|deal| (deal.price, deal.quantity)).collect()
    }

    #[test]
    fn test_fresh_users_are_empty() {
        let (market, users) = market_with_users(2);

        for user in users {
            assert_eq!(market.balance(user).unwrap(), Balance::new(0, 0));
            assert!(market.active_offers(user).unwrap().is_empty());
            assert!(market.closed_deals(user).unwrap().is_empty());
        }
    }

    #[test]
    fn test_deposits_accumulate() {
        let (mut market, users) = market_with_users(1);

        market.deposit_usd(users[0], 100).unwrap();
        market.deposit_usd(users[0], 50).unwrap();

        assert_eq!(market.balance(users[0]).unwrap(), Balance::new(150, 0));
    }

    #[test]
    fn test_full_match_settles_both_sides() {
        let (mut market, users) = market_with_users(2);
        let (seller, buyer) = (users[0], users[1]);

        market.post_offer(seller, Side::Sell, 80, 10).unwrap();
        assert_eq!(market.balance(seller).unwrap(), Balance::new(0, 0));
        assert_eq!(market.active_offers(seller).unwrap().len(), 1);

        market.post_offer(buyer, Side::Buy, 80, 10).unwrap();

        assert_eq!(market.balance(buyer).unwrap(), Balance::new(10, -800));
        assert_eq!(market.balance(seller).unwrap(), Balance::new(-10, 800));
        assert!(market.active_offers(buyer).unwrap().is_empty());
        assert!(market.active_offers(seller).unwrap().is_empty());

        let buyer_deals = market.closed_deals(buyer).unwrap();
        assert_eq!(deal_summary(&buyer_deals), vec![(80, 10)]);
        assert_eq!(buyer_deals, market.closed_deals(seller).unwrap());
    }

    #[test]
    fn test_better_price_matches_first() {
        let (mut market, users) = market_with_users(2);
        let (buyer, seller) = (users[0], users[1]);

        market.post_offer(buyer, Side::Buy, 70, 15).unwrap();
        market.post_offer(buyer, Side::Buy, 80, 5).unwrap();
        let outcome = market.post_offer(seller, Side::Sell, 60, 20).unwrap();

        assert_eq!(deal_summary(&outcome.deals), vec![(80, 5), (70, 15)]);
        assert_eq!(market.balance(buyer).unwrap(), Balance::new(20, -1450));
        assert_eq!(market.balance(seller).unwrap(), Balance::new(-20, 1450));
        assert_eq!(market.closed_deals(buyer).unwrap().len(), 2);
        assert_eq!(market.closed_deals(seller).unwrap().len(), 2);
    }

    /// Two sellers at 61 and 62, buyer at 64 for 30; returns the market after
    /// the buyer's remainder is resting
    fn partially_filled_buyer() -> (Market, Vec<UserId>) {
        let (mut market, users) = market_with_users(4);

        market.post_offer(users[0], Side::Sell, 61, 10).unwrap();
        market.post_offer(users[1], Side::Sell, 62, 10).unwrap();
        market.post_offer(users[2], Side::Buy, 64, 30).unwrap();

        (market, users)
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let (market, users) = partially_filled_buyer();
        let buyer = users[2];

        let active = market.active_offers(buyer).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].price, 64);
        assert_eq!(active[0].remaining_quantity(), 10);
        assert_eq!(
            deal_summary(&market.closed_deals(buyer).unwrap()),
            vec![(61, 10), (62, 10)]
        );

        for seller in &users[..2] {
            assert!(market.active_offers(*seller).unwrap().is_empty());
            assert_eq!(market.closed_deals(*seller).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_resting_remainder_fills_later() {
        let (mut market, users) = partially_filled_buyer();

        market.post_offer(users[3], Side::Sell, 60, 10).unwrap();

        assert_eq!(market.balance(users[2]).unwrap(), Balance::new(30, -1870));
        assert_eq!(market.balance(users[3]).unwrap(), Balance::new(-10, 640));
        assert!(market.active_offers(users[2]).unwrap().is_empty());
    }

    #[test]
    fn test_sell_sweeps_two_buyers() {
        let (mut market, users) = market_with_users(3);

        market.post_offer(users[0], Side::Buy, 62, 10).unwrap();
        market.post_offer(users[1], Side::Buy, 63, 20).unwrap();
        market.post_offer(users[2], Side::Sell, 61, 50).unwrap();

        assert_eq!(market.balance(users[0]).unwrap(), Balance::new(10, -620));
        assert_eq!(market.balance(users[1]).unwrap(), Balance::new(20, -1260));
        assert_eq!(market.balance(users[2]).unwrap(), Balance::new(-30, 1880));

        let active = market.active_offers(users[2]).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].remaining_quantity(), 20);
    }

    #[test]
    fn test_post_then_cancel_leaves_nothing() {
        let (mut market, users) = market_with_users(2);
        let user = users[0];

        let outcome = market.post_offer(user, Side::Sell, 75, 10).unwrap();
        assert!(market.cancel_offer(user, outcome.offer_id).unwrap());

        assert!(market.active_offers(user).unwrap().is_empty());
        assert!(market.closed_deals(user).unwrap().is_empty());
        assert_eq!(market.quote(), None);
        assert_eq!(market.ask_bid_quotes(), AskBidQuotes::default());

        let outcome = market.post_offer(users[1], Side::Buy, 75, 10).unwrap();
        assert!(outcome.deals.is_empty());
        assert_eq!(outcome.remaining, 10);
    }

    #[test]
    fn test_canceled_offer_is_skipped_when_matching() {
        let (mut market, users) = market_with_users(2);
        let (seller, buyer) = (users[0], users[1]);

        market.post_offer(seller, Side::Sell, 61, 10).unwrap();
        let canceled = market.post_offer(seller, Side::Sell, 61, 10).unwrap().offer_id;
        market.post_offer(seller, Side::Sell, 62, 10).unwrap();
        market.post_offer(seller, Side::Sell, 63, 10).unwrap();
        market.cancel_offer(seller, canceled).unwrap();

        let outcome = market.post_offer(buyer, Side::Buy, 62, 30).unwrap();

        assert_eq!(deal_summary(&outcome.deals), vec![(61, 10), (62, 10)]);
        assert!(outcome
            .deals
            .iter()
            .all(|deal| deal.maker_offer_id != canceled));
        assert_eq!(market.balance(seller).unwrap(), Balance::new(-20, 1230));
        assert_eq!(market.balance(buyer).unwrap(), Balance::new(20, -1230));

        assert_eq!(market.quote(), Some(62));
        let quotes = market.ask_bid_quotes();
        assert_eq!(quotes.ask, Some(62));
        assert_eq!(quotes.bid, Some(63));
        assert_eq!(quotes.spread, Some(1));

        assert_eq!(market.active_offers(seller).unwrap().len(), 1);
        assert_eq!(market.active_offers(buyer).unwrap().len(), 1);
    }

    #[test]
    fn test_canceled_counterpart_never_trades() {
        let (mut market, users) = market_with_users(2);

        let buy = market.post_offer(users[0], Side::Buy, 80, 10).unwrap().offer_id;
        market.cancel_offer(users[0], buy).unwrap();
        market.post_offer(users[1], Side::Sell, 80, 10).unwrap();

        assert_eq!(market.quote(), None);
        let quotes = market.ask_bid_quotes();
        assert_eq!(quotes.bid, Some(80));
        assert_eq!(quotes.ask, None);
        assert_eq!(quotes.spread, None);
    }

    #[test]
    fn test_request_session_end_to_end() {
        let mut exchange = Exchange::default();
        let seller = exchange.register("seller", 1).unwrap();
        let buyer = exchange.register("buyer", 2).unwrap();

        exchange.handle(Request::post_offer(seller, Side::Sell, 80, 10));
        exchange.handle(Request::post_offer(buyer, Side::Buy, 80, 10));

        assert_eq!(
            exchange.handle(Request::Balance { user_id: seller }),
            Response::Balance { usd: -10, rub: 800 }
        );
        assert_eq!(
            exchange.handle(Request::Quotes { user_id: buyer }),
            Response::Quotes {
                quote: Some(80),
                ask_quote: None,
                bid_quote: None,
                spread: None,
            }
        );
    }
}
