// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod event_store;

pub use event_store::{
    EventStore, InMemoryEventStore, NoOpEventStore, StoreError, StoreRecord, Table,
};
