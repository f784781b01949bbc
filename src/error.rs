// ============================================================================
// Exchange Errors
// Error types for the market core and its collaborators
// ============================================================================

use crate::domain::{Price, Quantity, Side, UserId};
use crate::interfaces::StoreError;
use thiserror::Error;

/// Errors raised by the market core.
///
/// Canceling an absent offer is not an error (it returns `false`), and an
/// expired book reference is pruned silently, so neither appears here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The user id was never registered with this market
    #[error("unknown user id {0}")]
    UnknownUser(UserId),

    /// Two offers of the same side were asked to trade with each other
    #[error("cannot make a deal between two {side:?} offers")]
    SameSideDeal { side: Side },

    /// Offers must carry a positive quantity
    #[error("offer quantity must be positive")]
    ZeroQuantity,

    /// `price * quantity` does not fit the signed balance domain
    #[error("notional value of {quantity} @ {price} overflows")]
    NotionalOverflow { price: Price, quantity: Quantity },

    /// A deposit or settlement would push a balance past the `i64` range.
    /// Nothing is applied when this is returned.
    #[error("balance of user {user_id} would overflow")]
    BalanceOverflow { user_id: UserId },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The store could not be read while seeding id sequences
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, ExchangeError>;
