//! Identifier allocation
//!
//! Two-phase: `peek_next()` previews the id an editor would use, `assign()`
//! commits. Abandoned previews are never handed back (no reclamation).

use std::sync::atomic::{AtomicI64, Ordering};

/// Entity identifier
pub type EntityId = i64;

/// First custom market id; built-ins sit below it
pub const CUSTOM_MARKET_ID_BASE: EntityId = 100;

/// First custom location id; built-ins sit below it
pub const CUSTOM_LOCATION_ID_BASE: EntityId = 20_050;

/// First pivot list id
pub const PIVOT_LIST_ID_BASE: EntityId = 1_000;

/// First prediction id
pub const PREDICTION_ID_BASE: EntityId = 30_000;

/// Monotonic id source for one entity type
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    pub fn starting_at(first: EntityId) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// What the next `assign()` would return
    pub fn peek_next(&self) -> EntityId {
        self.next.load(Ordering::Acquire)
    }

    /// Commit to the current id and advance
    pub fn assign(&self) -> EntityId {
        self.next.fetch_add(1, Ordering::AcqRel)
    }

    /// Assign `id` only if it is still the next one.
    ///
    /// On failure nothing advances and the current next id is returned.
    pub fn claim(&self, id: EntityId) -> Result<EntityId, EntityId> {
        self.next
            .compare_exchange(id, id + 1, Ordering::AcqRel, Ordering::Acquire)
    }
}

/// One allocator per id-space
#[derive(Debug)]
pub struct IdAllocators {
    pub markets: IdAllocator,
    pub locations: IdAllocator,
    pub pivot_lists: IdAllocator,
    pub predictions: IdAllocator,
}

impl IdAllocators {
    pub fn new() -> Self {
        Self {
            markets: IdAllocator::starting_at(CUSTOM_MARKET_ID_BASE),
            locations: IdAllocator::starting_at(CUSTOM_LOCATION_ID_BASE),
            pivot_lists: IdAllocator::starting_at(PIVOT_LIST_ID_BASE),
            predictions: IdAllocator::starting_at(PREDICTION_ID_BASE),
        }
    }
}

impl Default for IdAllocators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_is_idempotent() {
        let ids = IdAllocator::starting_at(1000);
        for _ in 0..5 {
            assert_eq!(ids.peek_next(), 1000);
        }
    }

    #[test]
    fn test_assign_is_strictly_increasing() {
        let ids = IdAllocator::starting_at(30_000);
        let assigned: Vec<_> = (0..10).map(|_| ids.assign()).collect();
        let expected: Vec<_> = (30_000..30_010).collect();
        assert_eq!(assigned, expected);
        assert_eq!(ids.peek_next(), 30_010);
    }

    #[test]
    fn test_abandoned_preview_then_commit() {
        let ids = IdAllocator::starting_at(1000);
        // Editor opened and cancelled
        assert_eq!(ids.peek_next(), 1000);
        // Next real commit starts from the counter, not a remembered preview
        assert_eq!(ids.assign(), 1000);
        assert_eq!(ids.assign(), 1001);
        assert_eq!(ids.peek_next(), 1002);
    }

    #[test]
    fn test_preview_after_commit_is_never_reassigned() {
        let ids = IdAllocator::starting_at(1000);
        ids.assign();
        let previewed = ids.peek_next();
        ids.assign();
        let later: Vec<_> = (0..3).map(|_| ids.assign()).collect();
        assert!(!later.contains(&previewed));
    }

    #[test]
    fn test_claim_only_succeeds_for_the_next_id() {
        let ids = IdAllocator::starting_at(1000);
        assert_eq!(ids.claim(1000), Ok(1000));
        for _ in 0..3 {
            assert_eq!(ids.claim(1000), Err(1001));
        }
        assert_eq!(ids.peek_next(), 1001);
        assert_eq!(ids.claim(1001), Ok(1001));
    }

    #[test]
    fn test_id_spaces_start_at_their_ceiling() {
        let ids = IdAllocators::new();
        assert_eq!(ids.markets.peek_next(), CUSTOM_MARKET_ID_BASE);
        assert_eq!(ids.locations.peek_next(), CUSTOM_LOCATION_ID_BASE);
        assert_eq!(ids.pivot_lists.peek_next(), PIVOT_LIST_ID_BASE);
        assert_eq!(ids.predictions.peek_next(), PREDICTION_ID_BASE);
    }
}
