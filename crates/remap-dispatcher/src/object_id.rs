//! Process-wide unique identifiers for dispatcher clients.

use std::{collections::HashSet, fmt};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::fatal;

/// Live identifiers plus the last value handed out.
struct Registry {
    /// Most recently allocated value; the next candidate is `last + 1`.
    last: u64,
    /// Values owned by an [`ObjectId`] that has not been dropped yet.
    live: HashSet<u64>,
}

impl Registry {
    /// Reserve the next value that is neither zero nor still live.
    fn allocate(&mut self) -> u64 {
        // Zero is never handed out, so one fewer than the full space is usable.
        if self.live.len() as u64 == u64::MAX {
            fatal::contract_violation("object id space exhausted");
        }
        loop {
            self.last = self.last.wrapping_add(1);
            if self.last != 0 && self.live.insert(self.last) {
                return self.last;
            }
        }
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    Mutex::new(Registry {
        last: 0,
        live: HashSet::new(),
    })
});

/// Raw numeric value of an [`ObjectId`].
///
/// This is what the dispatcher stores and compares; holding one does not keep the
/// identifier alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdValue(u64);

impl ObjectIdValue {
    /// The underlying integer.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectIdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique token identifying one dispatcher client.
///
/// Not `Clone`: exactly one owner exists, and dropping it returns the value to the
/// registry. Dispatchers only ever see the [`ObjectIdValue`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ObjectId {
    /// Value reserved in the registry for the lifetime of this handle.
    value: ObjectIdValue,
}

impl ObjectId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        let value = REGISTRY.lock().allocate();
        Self {
            value: ObjectIdValue(value),
        }
    }

    /// Raw value used to tag dispatcher entries.
    #[must_use]
    pub const fn value(&self) -> ObjectIdValue {
        self.value
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectId {
    fn drop(&mut self) {
        REGISTRY.lock().live.remove(&self.value.0);
    }
}

/// Allocate a fresh identifier. Equivalent to [`ObjectId::new`].
#[must_use]
pub fn make_new_object_id() -> ObjectId {
    ObjectId::new()
}

/// Number of identifiers currently alive in this process.
pub fn active_object_id_count() -> usize {
    REGISTRY.lock().live.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_increasing() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a.value(), b.value());
        assert!(b.value() > a.value());
    }

    #[test]
    fn allocation_skips_live_values_on_wraparound() {
        let mut registry = Registry {
            last: u64::MAX - 1,
            live: [u64::MAX, 1, 2].into_iter().collect(),
        };
        // MAX is live, 0 is reserved, 1 and 2 are live.
        assert_eq!(registry.allocate(), 3);
        assert_eq!(registry.allocate(), 4);
        assert!(registry.live.contains(&3));
    }
}
