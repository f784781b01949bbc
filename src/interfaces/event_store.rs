// ============================================================================
// Event Store Interface
// Durable mirror of users, offers and deals
// ============================================================================

use crate::domain::{Deal, Offer, Price, Quantity, Side};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Durable tables mirrored by the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    User,
    Offer,
    Deal,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::User => write!(f, "User"),
            Table::Offer => write!(f, "Offer"),
            Table::Deal => write!(f, "Deal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    #[error("{table} record {id} rejected")]
    Rejected { table: Table, id: u64 },
}

/// Row written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRecord {
    User {
        id: u64,
        username: String,
        pw_hash: u64,
    },
    Offer {
        id: u64,
        owner_id: u64,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Deal {
        id: u64,
        seller_id: u64,
        buyer_id: u64,
        quantity: Quantity,
        price: Price,
    },
}

impl StoreRecord {
    pub fn table(&self) -> Table {
        match self {
            StoreRecord::User { .. } => Table::User,
            StoreRecord::Offer { .. } => Table::Offer,
            StoreRecord::Deal { .. } => Table::Deal,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            StoreRecord::User { id, .. }
            | StoreRecord::Offer { id, .. }
            | StoreRecord::Deal { id, .. } => *id,
        }
    }
}

/// Persistence collaborator.
///
/// Writes are a side effect of the in-memory mutation, which stays
/// authoritative: callers log failures and carry on.
pub trait EventStore: Send + Sync {
    fn record_user(&self, id: u64, username: &str, pw_hash: u64) -> Result<(), StoreError>;

    /// Offer as posted, with its original quantity
    fn record_offer(&self, offer: &Offer) -> Result<(), StoreError>;

    fn record_deal(&self, deal: &Deal) -> Result<(), StoreError>;

    /// Largest id persisted in `table`, `None` when the table is empty
    fn max_id(&self, table: Table) -> Result<Option<u64>, StoreError>;
}

/// Store that persists nothing
pub struct NoOpEventStore;

impl EventStore for NoOpEventStore {
    fn record_user(&self, _id: u64, _username: &str, _pw_hash: u64) -> Result<(), StoreError> {
        Ok(())
    }

    fn record_offer(&self, _offer: &Offer) -> Result<(), StoreError> {
        Ok(())
    }

    fn record_deal(&self, _deal: &Deal) -> Result<(), StoreError> {
        Ok(())
    }

    fn max_id(&self, _table: Table) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }
}

/// Append-only in-process store.
///
/// Ids are indexed per table, so appends and `max_id` do not scan the log.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    records: Vec<StoreRecord>,
    ids: HashSet<(Table, u64)>,
    max_ids: HashMap<Table, u64>,
    counts: HashMap<Table, usize>,
}

impl Tables {
    fn push(&mut self, record: StoreRecord) -> Result<(), StoreError> {
        let (table, id) = (record.table(), record.id());
        if !self.ids.insert((table, id)) {
            return Err(StoreError::Rejected { table, id });
        }

        let max = self.max_ids.entry(table).or_insert(id);
        *max = (*max).max(id);
        *self.counts.entry(table).or_default() += 1;
        self.records.push(record);
        Ok(())
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `records`. Later duplicates of an id are dropped.
    pub fn with_records(records: Vec<StoreRecord>) -> Self {
        let mut tables = Tables::default();
        for record in records {
            if let Err(err) = tables.push(record) {
                tracing::warn!(error = %err, "skipping preloaded record");
            }
        }

        Self {
            tables: RwLock::new(tables),
        }
    }

    pub fn records(&self) -> Vec<StoreRecord> {
        self.tables.read().records.clone()
    }

    pub fn count(&self, table: Table) -> usize {
        self.tables.read().counts.get(&table).copied().unwrap_or(0)
    }

    fn append(&self, record: StoreRecord) -> Result<(), StoreError> {
        self.tables.write().push(record)
    }
}

impl EventStore for InMemoryEventStore {
    fn record_user(&self, id: u64, username: &str, pw_hash: u64) -> Result<(), StoreError> {
        self.append(StoreRecord::User {
            id,
            username: username.to_string(),
            pw_hash,
        })
    }

    fn record_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        self.append(StoreRecord::Offer {
            id: offer.id.value(),
            owner_id: offer.owner_id.value(),
            side: offer.side,
            quantity: offer.quantity,
            price: offer.price,
        })
    }

    fn record_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        self.append(StoreRecord::Deal {
            id: deal.id.value(),
            seller_id: deal.seller.value(),
            buyer_id: deal.buyer.value(),
            quantity: deal.quantity,
            price: deal.price,
        })
    }

    fn max_id(&self, table: Table) -> Result<Option<u64>, StoreError> {
        Ok(self.tables.read().max_ids.get(&table).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DealId, OfferId, UserId};

    #[test]
    fn test_noop_store() {
        let store = NoOpEventStore;
        assert!(store.record_user(0, "user", 1).is_ok());
        assert_eq!(store.max_id(Table::Offer), Ok(None));
    }

    #[test]
    fn test_in_memory_max_id() {
        let store = InMemoryEventStore::new();
        let offer = Offer::new(OfferId::new(4), UserId::new(1), Side::Sell, 80, 10);
        store.record_offer(&offer).unwrap();
        store
            .record_deal(&Deal::new(
                DealId::new(9),
                UserId::new(1),
                UserId::new(2),
                OfferId::new(4),
                OfferId::new(5),
                80,
                10,
            ))
            .unwrap();

        assert_eq!(store.max_id(Table::Offer), Ok(Some(4)));
        assert_eq!(store.max_id(Table::Deal), Ok(Some(9)));
        assert_eq!(store.max_id(Table::User), Ok(None));
        assert_eq!(store.count(Table::Offer), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = InMemoryEventStore::new();
        store.record_user(1, "alice", 11).unwrap();

        assert_eq!(
            store.record_user(1, "bob", 12),
            Err(StoreError::Rejected {
                table: Table::User,
                id: 1
            })
        );
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.count(Table::User), 1);
    }

    #[test]
    fn test_ids_indexed_per_table() {
        let store = InMemoryEventStore::new();
        for id in (0..1000).rev() {
            store.record_user(id, &format!("user{id}"), id).unwrap();
        }
        // user 3 exists, offer 3 is still new
        let offer = Offer::new(OfferId::new(3), UserId::new(1), Side::Buy, 60, 1);
        store.record_offer(&offer).unwrap();

        let offer_three = Offer::new(OfferId::new(3), UserId::new(2), Side::Sell, 61, 1);
        assert!(store.record_offer(&offer_three).is_err());
        assert!(store.record_user(1000, "late", 0).is_ok());

        assert_eq!(store.max_id(Table::User), Ok(Some(1000)));
        assert_eq!(store.max_id(Table::Offer), Ok(Some(3)));
        assert_eq!(store.count(Table::User), 1001);
        assert_eq!(store.count(Table::Offer), 1);
    }

    #[test]
    fn test_preloaded_duplicates_dropped() {
        let store = InMemoryEventStore::with_records(vec![
            StoreRecord::User {
                id: 7,
                username: "alice".to_string(),
                pw_hash: 1,
            },
            StoreRecord::User {
                id: 7,
                username: "bob".to_string(),
                pw_hash: 2,
            },
        ]);

        assert_eq!(store.count(Table::User), 1);
        assert_eq!(store.max_id(Table::User), Ok(Some(7)));
        assert!(store.record_user(7, "carol", 3).is_err());
    }
}
