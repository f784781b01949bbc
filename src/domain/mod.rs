// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod account;
pub mod config;
pub mod deal;
pub mod ids;
pub mod offer;
pub mod order_book;

/// Limit price in units of the price currency (RUB)
pub type Price = i64;

/// Amount of the traded asset (USD)
pub type Quantity = u64;

pub use account::{Account, Balance, UserId};
pub use config::ExchangeConfig;
pub use deal::{Deal, DealId};
pub use ids::IdSequence;
pub use offer::{Offer, OfferId, OfferStatus, Side};
pub use order_book::{BookEnd, BookEntry, BookSide, PriceLevel};
