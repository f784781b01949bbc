// ============================================================================
// Engine Module
// Contains the core market business logic
// ============================================================================

mod actor;
mod market;
mod quotes;

pub mod factory;

pub use actor::{ActorError, ExchangeActor, ExchangeHandle};
pub use factory::{create_from_config, MarketBuilder};
pub use market::{Deals, Market, PostOutcome};
pub use quotes::{AskBidQuotes, Spread};
