// ============================================================================
// Id Sequences
// ============================================================================

/// Monotonically increasing id generator.
///
/// Each market owns one sequence per entity kind; at startup they are seeded
/// past the largest id already persisted.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the sequence right after `max_id`, or at zero when nothing exists
    pub fn after(max_id: Option<u64>) -> Self {
        Self {
            next: max_id.map_or(0, |id| id + 1),
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}
