// ============================================================================
// Market Factory
// Creates markets wired to their persistence collaborator
// ============================================================================

use crate::domain::{ExchangeConfig, IdSequence};
use crate::engine::Market;
use crate::error::{ExchangeError, Result};
use crate::interfaces::{EventStore, NoOpEventStore, Table};
use std::sync::Arc;

// ============================================================================
// Factory Functions
// ============================================================================

/// Creates a market from configuration. Fails on an invalid configuration
/// or when seeding is enabled and the store cannot report its ids.
///
/// # Example
/// ```
/// use currency_exchange::prelude::*;
/// use currency_exchange::engine::factory::create_from_config;
/// use std::sync::Arc;
///
/// let config = ExchangeConfig::default();
/// let market = create_from_config(&config, Arc::new(InMemoryEventStore::new())).unwrap();
/// assert_eq!(market.user_count(), 0);
/// ```
pub fn create_from_config(
    config: &ExchangeConfig,
    store: Arc<dyn EventStore>,
) -> Result<Market> {
    config.validate().map_err(ExchangeError::InvalidConfig)?;

    MarketBuilder::new()
        .with_store(store)
        .seed_from_store(config.seed_ids_from_store)
        .build()
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for markets with an injected store
///
/// # Example
/// ```
/// use currency_exchange::prelude::*;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryEventStore::new());
/// let mut market = MarketBuilder::new()
///     .with_store(store)
///     .seed_from_store(true)
///     .build()
///     .unwrap();
/// let user = market.register_user("alice");
/// assert_eq!(user.value(), 0);
/// ```
pub struct MarketBuilder {
    store: Arc<dyn EventStore>,
    seed_from_store: bool,
}

impl Default for MarketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(NoOpEventStore),
            seed_from_store: false,
        }
    }

    /// Mirror users, offers and deals into `store`
    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = store;
        self
    }

    /// Continue id sequences after the largest ids already in the store
    pub fn seed_from_store(mut self, enabled: bool) -> Self {
        self.seed_from_store = enabled;
        self
    }

    /// Fails only when seeding is enabled and the store cannot be read;
    /// starting from 0 would reissue ids the store already holds.
    pub fn build(self) -> Result<Market> {
        let (user_ids, offer_ids, deal_ids) = if self.seed_from_store {
            (
                seed(self.store.as_ref(), Table::User)?,
                seed(self.store.as_ref(), Table::Offer)?,
                seed(self.store.as_ref(), Table::Deal)?,
            )
        } else {
            (IdSequence::new(), IdSequence::new(), IdSequence::new())
        };

        Ok(Market::with_sequences(self.store, user_ids, offer_ids, deal_ids))
    }
}

fn seed(store: &dyn EventStore, table: Table) -> Result<IdSequence> {
    let max_id = store.max_id(table).map_err(|err| {
        tracing::error!(%table, error = %err, "unable to seed id sequence");
        err
    })?;

    let sequence = IdSequence::after(max_id);
    tracing::info!(%table, next_id = sequence.peek(), "id sequence seeded");
    Ok(sequence)
}
