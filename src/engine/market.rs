// ============================================================================
// Market
// Order book, matching loop and settlement against the account ledger
// ============================================================================

use crate::domain::{
    Account, Balance, BookEntry, BookSide, Deal, DealId, IdSequence, Offer, OfferId, Price,
    Quantity, Side, UserId,
};
use crate::error::{ExchangeError, Result};
use crate::interfaces::{EventStore, NoOpEventStore};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Deals produced by a single posting; most postings cross a few levels at most
pub type Deals = SmallVec<[Deal; 4]>;

/// What happened to a freshly posted offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub offer_id: OfferId,
    pub deals: Deals,
    /// Quantity left resting in the book (zero when fully matched)
    pub remaining: Quantity,
}

impl PostOutcome {
    pub fn is_fulfilled(&self) -> bool {
        self.remaining == 0
    }
}

/// Single-instrument USD/RUB market.
///
/// Offers are owned by their owner's [`Account`]; the two book sides only hold
/// [`BookEntry`] references, so canceling is a removal from the account and
/// the book entry is discarded lazily. All operations assume a single writer.
pub struct Market {
    accounts: HashMap<UserId, Account>,

    /// Resting buy offers
    buy_book: BookSide,

    /// Resting sell offers
    sell_book: BookSide,

    /// Price of the last executed deal
    quote: Option<Price>,

    user_ids: IdSequence,
    offer_ids: IdSequence,
    deal_ids: IdSequence,

    store: Arc<dyn EventStore>,
}

impl Default for Market {
    fn default() -> Self {
        Self::new(Arc::new(NoOpEventStore))
    }
}

impl Market {
    /// Create an empty market whose ids start at zero
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_sequences(store, IdSequence::new(), IdSequence::new(), IdSequence::new())
    }

    pub(crate) fn with_sequences(
        store: Arc<dyn EventStore>,
        user_ids: IdSequence,
        offer_ids: IdSequence,
        deal_ids: IdSequence,
    ) -> Self {
        Self {
            accounts: HashMap::new(),
            buy_book: BookSide::new(Side::Buy),
            sell_book: BookSide::new(Side::Sell),
            quote: None,
            user_ids,
            offer_ids,
            deal_ids,
            store,
        }
    }

    // ========================================================================
    // Account Ledger
    // ========================================================================

    /// Open an account with zero balances. Username uniqueness is the
    /// caller's concern.
    pub fn register_user(&mut self, username: &str) -> UserId {
        let user_id = UserId::new(self.user_ids.next_id());
        self.accounts
            .insert(user_id, Account::new(user_id, username));

        tracing::info!(%user_id, username, "user registered");
        user_id
    }

    /// Credit USD. Fails without changing anything when the balance would
    /// leave the `i64` range.
    pub fn deposit_usd(&mut self, user_id: UserId, amount: u64) -> Result<()> {
        let amount = deposit_amount(user_id, amount)?;
        self.account_mut(user_id)?.adjust_balance(amount, 0)
    }

    /// Credit RUB, with the same overflow rule as [`Market::deposit_usd`]
    pub fn deposit_rub(&mut self, user_id: UserId, amount: u64) -> Result<()> {
        let amount = deposit_amount(user_id, amount)?;
        self.account_mut(user_id)?.adjust_balance(0, amount)
    }

    pub fn balance(&self, user_id: UserId) -> Result<Balance> {
        Ok(self.account(user_id)?.balance())
    }

    /// Copy of the user's active offers, ordered by id
    pub fn active_offers(&self, user_id: UserId) -> Result<Vec<Offer>> {
        Ok(self.account(user_id)?.active_offers().cloned().collect())
    }

    /// Copy of the user's closed deals, ordered by id
    pub fn closed_deals(&self, user_id: UserId) -> Result<Vec<Deal>> {
        Ok(self.account(user_id)?.closed_deals().copied().collect())
    }

    pub fn account(&self, user_id: UserId) -> Result<&Account> {
        self.accounts
            .get(&user_id)
            .ok_or(ExchangeError::UnknownUser(user_id))
    }

    fn account_mut(&mut self, user_id: UserId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&user_id)
            .ok_or(ExchangeError::UnknownUser(user_id))
    }

    pub fn user_count(&self) -> usize {
        self.accounts.len()
    }

    // ========================================================================
    // Offers
    // ========================================================================

    /// Post a limit offer and match it against the opposite side.
    ///
    /// Whatever is left after matching rests in the book at the offer's price.
    /// The returned id is valid whether the offer matched fully, partially or
    /// not at all.
    pub fn post_offer(
        &mut self,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<PostOutcome> {
        self.account(user_id)?;
        if quantity == 0 {
            return Err(ExchangeError::ZeroQuantity);
        }
        check_notional(price, quantity)?;
        self.check_settlement(user_id, side, price, quantity)?;

        let mut offer = Offer::new(
            OfferId::new(self.offer_ids.next_id()),
            user_id,
            side,
            price,
            quantity,
        );
        if let Err(err) = self.store.record_offer(&offer) {
            tracing::warn!(offer_id = %offer.id, error = %err, "failed to persist offer");
        }
        tracing::debug!(offer_id = %offer.id, %user_id, ?side, price, quantity, "offer posted");

        let deals = self.match_offer(&mut offer)?;
        tracing::debug!(
            offer_id = %offer.id,
            filled = offer.filled_quantity(),
            deals = deals.len(),
            "offer matched"
        );

        let outcome = PostOutcome {
            offer_id: offer.id,
            deals,
            remaining: offer.remaining_quantity(),
        };
        if !offer.is_fulfilled() {
            self.rest_offer(offer)?;
        }

        Ok(outcome)
    }

    /// Withdraw an active offer. Returns false when the offer is not active
    /// for this user (filled, already canceled, or someone else's).
    pub fn cancel_offer(&mut self, user_id: UserId, offer_id: OfferId) -> Result<bool> {
        let removed = self.account_mut(user_id)?.remove_active_offer(offer_id);
        tracing::debug!(%user_id, %offer_id, removed, "cancel requested");
        Ok(removed)
    }

    /// Price of the last executed deal
    pub fn quote(&self) -> Option<Price> {
        self.quote
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn book(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.buy_book,
            Side::Sell => &self.sell_book,
        }
    }

    /// Mutable book side together with the ledger used to tell live entries
    /// from expired ones
    pub(super) fn book_with_accounts(
        &mut self,
        side: Side,
    ) -> (&mut BookSide, &HashMap<UserId, Account>) {
        let book = match side {
            Side::Buy => &mut self.buy_book,
            Side::Sell => &mut self.sell_book,
        };
        (book, &self.accounts)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn match_offer(&mut self, taker: &mut Offer) -> Result<Deals> {
        let mut deals = Deals::new();
        let book = match taker.side.opposite() {
            Side::Buy => &mut self.buy_book,
            Side::Sell => &mut self.sell_book,
        };

        while !taker.is_fulfilled() {
            let Some(best_price) = book.best_price() else {
                break;
            };
            if !crosses(taker.side, taker.price, best_price) {
                break;
            }
            let Some(entry) = book.front(best_price) else {
                break;
            };

            let Some(maker) = self
                .accounts
                .get_mut(&entry.owner_id)
                .and_then(|account| account.active_offer_mut(entry.offer_id))
            else {
                tracing::debug!(offer_id = %entry.offer_id, price = best_price, "skipping expired book entry");
                book.pop_front(best_price);
                continue;
            };

            let deal = taker.make_deal(maker, DealId::new(self.deal_ids.next_id()))?;
            if maker.is_fulfilled() {
                book.pop_front(best_price);
                if let Some(account) = self.accounts.get_mut(&entry.owner_id) {
                    account.remove_active_offer(entry.offer_id);
                }
            }

            settle_deal(&mut self.accounts, self.store.as_ref(), &deal)?;
            self.quote = Some(deal.price);
            deals.push(deal);
        }

        Ok(deals)
    }

    /// Walk the deals a new offer would make, without touching any state, and
    /// fail if one of them would push a balance out of range. Run before
    /// anything is allocated or matched so a rejected posting leaves no trace.
    fn check_settlement(
        &self,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Result<()> {
        let mut remaining = quantity;
        let mut balances: HashMap<UserId, Balance> = HashMap::new();

        for (level_price, entry) in self.book(side.opposite()).entries_by_priority() {
            if remaining == 0 || !crosses(side, price, level_price) {
                break;
            }
            let Some(maker) = self
                .accounts
                .get(&entry.owner_id)
                .and_then(|account| account.active_offer(entry.offer_id))
            else {
                continue;
            };

            let traded = remaining.min(maker.remaining_quantity());
            remaining -= traded;

            let (buyer, seller) = match side {
                Side::Buy => (user_id, maker.owner_id),
                Side::Sell => (maker.owner_id, user_id),
            };
            if buyer == seller {
                continue;
            }

            let (usd, rub) = deal_amounts(buyer, level_price, traded)?;
            for (party, is_buyer) in [(buyer, true), (seller, false)] {
                let current = match balances.get(&party) {
                    Some(balance) => *balance,
                    None => self.account(party)?.balance(),
                };
                let next = if is_buyer {
                    current.checked_buy(usd, rub)
                } else {
                    current.checked_sell(usd, rub)
                };
                let next = next.ok_or(ExchangeError::BalanceOverflow { user_id: party })?;
                balances.insert(party, next);
            }
        }

        Ok(())
    }

    fn rest_offer(&mut self, offer: Offer) -> Result<()> {
        let entry = BookEntry::new(offer.id, offer.owner_id);
        let price = offer.price;
        let side = offer.side;

        self.account_mut(offer.owner_id)?.add_offer(offer);
        match side {
            Side::Buy => self.buy_book.insert(price, entry),
            Side::Sell => self.sell_book.insert(price, entry),
        }

        tracing::debug!(offer_id = %entry.offer_id, price, ?side, "offer resting in book");
        Ok(())
    }
}

/// Incoming offer at `price` can trade against the opposite side's `best` price
fn crosses(side: Side, price: Price, best: Price) -> bool {
    match side {
        Side::Buy => best <= price,
        Side::Sell => best >= price,
    }
}

/// USD and RUB legs of a deal as signed amounts
fn deal_amounts(user_id: UserId, price: Price, quantity: Quantity) -> Result<(i64, i64)> {
    i64::try_from(quantity)
        .ok()
        .and_then(|usd| price.checked_mul(usd).map(|rub| (usd, rub)))
        .ok_or(ExchangeError::BalanceOverflow { user_id })
}

fn deposit_amount(user_id: UserId, amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| ExchangeError::BalanceOverflow { user_id })
}

fn check_notional(price: Price, quantity: Quantity) -> Result<()> {
    i64::try_from(quantity)
        .ok()
        .and_then(|quantity| price.checked_mul(quantity))
        .map(|_| ())
        .ok_or(ExchangeError::NotionalOverflow { price, quantity })
}

/// Apply a deal's balance effects and record it with both parties.
///
/// Buyer gains `quantity` USD and pays `price * quantity` RUB; the seller
/// mirrors it, so both currencies are conserved across the pair. Both sides
/// are checked before either balance changes. A self-trade nets to zero and
/// leaves the balance alone.
fn settle_deal(
    accounts: &mut HashMap<UserId, Account>,
    store: &dyn EventStore,
    deal: &Deal,
) -> Result<()> {
    if deal.buyer != deal.seller {
        let (usd, rub) = i64::try_from(deal.quantity)
            .ok()
            .zip(deal.notional())
            .ok_or(ExchangeError::BalanceOverflow { user_id: deal.buyer })?;

        let seller = accounts
            .get(&deal.seller)
            .ok_or(ExchangeError::UnknownUser(deal.seller))?;
        if seller.balance().checked_sell(usd, rub).is_none() {
            return Err(ExchangeError::BalanceOverflow { user_id: deal.seller });
        }

        accounts
            .get_mut(&deal.buyer)
            .ok_or(ExchangeError::UnknownUser(deal.buyer))?
            .settle_buy(usd, rub)?;
        accounts
            .get_mut(&deal.seller)
            .ok_or(ExchangeError::UnknownUser(deal.seller))?
            .settle_sell(usd, rub)?;
    }

    for party in [deal.buyer, deal.seller] {
        accounts
            .get_mut(&party)
            .ok_or(ExchangeError::UnknownUser(party))?
            .add_deal(*deal);
    }

    if let Err(err) = store.record_deal(deal) {
        tracing::warn!(deal_id = %deal.id, error = %err, "failed to persist deal");
    }
    tracing::info!(
        deal_id = %deal.id,
        seller = %deal.seller,
        buyer = %deal.buyer,
        price = deal.price,
        quantity = deal.quantity,
        "deal settled"
    );
    Ok(())
}
