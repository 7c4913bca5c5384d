//! In-memory `FeatureStore` used by unit, behaviour and property tests.

use std::sync::{Mutex, PoisonError};

use crate::{FeatureCollection, FeatureStore, StoreError};

/// In-memory [`FeatureStore`].
///
/// Clones the collection on every load, matching the re-read-per-operation
/// behaviour of the file and database stores.
#[derive(Debug)]
pub struct MemoryStore {
    collection: Mutex<FeatureCollection>,
    assigns_identifiers: bool,
    fail_writes: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_collection(FeatureCollection::default())
    }
}

impl MemoryStore {
    /// Create a store seeded with `collection`.
    pub fn with_collection(collection: FeatureCollection) -> Self {
        Self {
            collection: Mutex::new(collection),
            assigns_identifiers: true,
            fail_writes: false,
        }
    }

    /// Refuse to generate identifiers for features created without one.
    #[must_use]
    pub fn without_identifier_assignment(mut self) -> Self {
        self.assigns_identifiers = false;
        self
    }

    /// Make every persist fail with [`StoreError::Write`].
    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Current stored collection.
    pub fn snapshot(&self) -> FeatureCollection {
        self.collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FeatureStore for MemoryStore {
    fn locator(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<FeatureCollection, StoreError> {
        Ok(self.snapshot())
    }

    fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::write(
                self.locator(),
                std::io::Error::other("writes disabled"),
            ));
        }
        let mut stored = collection.clone();
        stored.clear_counts();
        *self
            .collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = stored;
        Ok(())
    }

    fn assigns_identifiers(&self) -> bool {
        self.assigns_identifiers
    }
}
