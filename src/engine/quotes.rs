// ============================================================================
// Quote Derivation
// Reference prices read off the resting book
// ============================================================================

use super::Market;
use crate::domain::{BookEnd, BookEntry, Price, Side};

/// Difference of two prices. Wider than [`Price`] so any pair of prices fits.
pub type Spread = i128;

/// Book-derived reference prices.
///
/// `ask` is the lowest live price on the buy side and `bid` the highest live
/// price on the sell side; `spread` is `bid - ask` when both exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AskBidQuotes {
    pub ask: Option<Price>,
    pub bid: Option<Price>,
    pub spread: Option<Spread>,
}

impl AskBidQuotes {
    pub fn new(ask: Option<Price>, bid: Option<Price>) -> Self {
        let spread = match (ask, bid) {
            (Some(ask), Some(bid)) => Some(Spread::from(bid) - Spread::from(ask)),
            _ => None,
        };

        Self { ask, bid, spread }
    }
}

impl Market {
    /// Scan both book sides for their reference prices, discarding expired
    /// entries met along the way
    pub fn ask_bid_quotes(&mut self) -> AskBidQuotes {
        let ask = self.determine_quote(Side::Buy);
        let bid = self.determine_quote(Side::Sell);

        AskBidQuotes::new(ask, bid)
    }

    fn determine_quote(&mut self, side: Side) -> Option<Price> {
        let end = match side {
            Side::Buy => BookEnd::Lowest,
            Side::Sell => BookEnd::Highest,
        };

        let (book, accounts) = self.book_with_accounts(side);
        book.first_live_price(end, |entry: &BookEntry| {
            accounts
                .get(&entry.owner_id)
                .is_some_and(|account| account.has_active_offer(entry.offer_id))
        })
    }
}
