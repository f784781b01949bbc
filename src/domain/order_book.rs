// ============================================================================
// Order Book Domain Model
// ============================================================================

use std::collections::{BTreeMap, VecDeque};

use super::{OfferId, Price, Side, UserId};

// ============================================================================
// Book Entry
// ============================================================================

/// Non-owning reference to a resting offer.
///
/// The offer itself lives in its owner's account. An entry whose offer is no
/// longer active there is expired and gets discarded the next time it is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub offer_id: OfferId,
    pub owner_id: UserId,
}

impl BookEntry {
    pub fn new(offer_id: OfferId, owner_id: UserId) -> Self {
        Self { offer_id, owner_id }
    }
}

// ============================================================================
// Price Level
// ============================================================================

/// FIFO queue of offer references resting at one price
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Price,
    entries: VecDeque<BookEntry>,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, entry: BookEntry) {
        self.entries.push_back(entry);
    }

    pub fn front(&self) -> Option<&BookEntry> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<BookEntry> {
        self.entries.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BookEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries from the front; true if a live one remains
    fn prune_front(&mut self, is_live: &impl Fn(&BookEntry) -> bool) -> bool {
        while let Some(entry) = self.entries.front() {
            if is_live(entry) {
                return true;
            }
            tracing::debug!(offer_id = %entry.offer_id, price = self.price, "pruning expired book entry");
            self.entries.pop_front();
        }
        false
    }
}

// ============================================================================
// Order Book Side
// ============================================================================

/// End of the price range to scan from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookEnd {
    Lowest,
    Highest,
}

/// One side of the book: price levels ordered by price.
///
/// A level exists only while it holds at least one entry.
#[derive(Debug, Clone)]
pub struct BookSide {
    pub side: Side,
    levels: BTreeMap<Price, PriceLevel>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Queue an entry behind everything already resting at `price`
    pub fn insert(&mut self, price: Price, entry: BookEntry) {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push(entry);
    }

    /// The price an incoming opposite-side offer would match first:
    /// highest for bids, lowest for asks
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Oldest entry at `price`
    pub fn front(&self, price: Price) -> Option<BookEntry> {
        self.levels.get(&price).and_then(|level| level.front().copied())
    }

    /// Remove the oldest entry at `price`, dropping the level once it empties
    pub fn pop_front(&mut self, price: Price) -> Option<BookEntry> {
        let level = self.levels.get_mut(&price)?;
        let entry = level.pop_front();
        if level.is_empty() {
            self.levels.remove(&price);
        }
        entry
    }

    /// Scan levels starting from `end` and return the first price that still
    /// has a live entry. Expired entries and emptied levels met on the way are
    /// removed.
    pub fn first_live_price(
        &mut self,
        end: BookEnd,
        is_live: impl Fn(&BookEntry) -> bool,
    ) -> Option<Price> {
        loop {
            let mut entry = match end {
                BookEnd::Lowest => self.levels.first_entry()?,
                BookEnd::Highest => self.levels.last_entry()?,
            };

            if entry.get_mut().prune_front(&is_live) {
                return Some(*entry.key());
            }
            entry.remove();
        }
    }

    /// Every entry in matching order: best price first, oldest first within
    /// a level. Expired entries are included.
    pub fn entries_by_priority(&self) -> impl Iterator<Item = (Price, &BookEntry)> + '_ {
        let levels: Box<dyn Iterator<Item = &PriceLevel> + '_> = match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        };
        levels.flat_map(|level| level.iter().map(move |entry| (level.price, entry)))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of entries, expired ones included
    pub fn entry_count(&self) -> usize {
        self.levels.values().map(PriceLevel::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level prices with their entry counts, lowest price first
    pub fn depth(&self) -> Vec<(Price, usize)> {
        self.levels
            .values()
            .map(|level| (level.price, level.len()))
            .collect()
    }
}
