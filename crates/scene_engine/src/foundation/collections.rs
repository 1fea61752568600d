//! Identifier and handle types

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a World stored in the Universe
    pub struct WorldId;
}

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scene entity
///
/// Used for logging, for attach references and for the removal scrub; the
/// owning `Arc` pointer remains the identity registries compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique_and_increasing() {
        let a = EntityId::next();
        let b = EntityId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
