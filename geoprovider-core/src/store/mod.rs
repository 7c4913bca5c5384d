//! Persistence backends for feature collections.
//!
//! A [`FeatureStore`] loads and persists a whole [`FeatureCollection`].
//! Mutations run inside [`FeatureStore::transact`], which loads, applies a
//! change and persists as one unit; a failed change or write leaves the
//! stored data untouched.

use thiserror::Error;

use crate::{BackendKind, BoxError, FeatureCollection, ProviderConfig, ProviderError};

mod geojson;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use geojson::GeoJsonStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;

/// Failure raised by a backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be opened, read or decoded.
    #[error("backend {locator} is unavailable: {source}")]
    Unavailable {
        /// Path or table naming the backend.
        locator: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// Writing to the backend failed.
    #[error("failed to write to backend {locator}: {source}")]
    Write {
        /// Path or table naming the backend.
        locator: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// A table name is not a plain SQL identifier.
    #[error("table name `{table}` must be a plain SQL identifier")]
    InvalidTable {
        /// Rejected name.
        table: String,
    },
}

impl StoreError {
    /// Build an [`StoreError::Unavailable`] for `locator`.
    pub fn unavailable(locator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            locator: locator.into(),
            source: source.into(),
        }
    }

    /// Build a [`StoreError::Write`] for `locator`.
    pub fn write(locator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Write {
            locator: locator.into(),
            source: source.into(),
        }
    }
}

/// Whole-collection access to a backing store.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use geoprovider_core::{FeatureCollection, FeatureStore, StoreError};
///
/// #[derive(Default)]
/// struct CellStore(RefCell<FeatureCollection>);
///
/// impl FeatureStore for CellStore {
///     fn locator(&self) -> &str {
///         "cell"
///     }
///
///     fn load(&self) -> Result<FeatureCollection, StoreError> {
///         Ok(self.0.borrow().clone())
///     }
///
///     fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError> {
///         *self.0.borrow_mut() = collection.clone();
///         Ok(())
///     }
/// }
///
/// let store = CellStore::default();
/// let len = store.transact(|collection| {
///     collection.features.push(Default::default());
///     Ok::<_, StoreError>(collection.len())
/// })?;
/// assert_eq!(len, 1);
/// assert_eq!(store.load()?.len(), 1);
/// # Ok::<(), StoreError>(())
/// ```
pub trait FeatureStore {
    /// Human-readable name of the backing resource, used in errors and logs.
    fn locator(&self) -> &str;

    /// Read the full collection.
    fn load(&self) -> Result<FeatureCollection, StoreError>;

    /// Replace the stored collection with `collection`.
    ///
    /// Either the whole collection is written or the previous contents are
    /// left in place.
    fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError>;

    /// Whether the provider may generate identifiers for features that
    /// arrive without one.
    fn assigns_identifiers(&self) -> bool {
        true
    }

    /// Load, apply `apply`, then persist, as one unit.
    ///
    /// Nothing is written when `apply` fails.
    fn transact<T, E, F>(&self, apply: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut FeatureCollection) -> Result<T, E>,
    {
        let mut collection = self.load()?;
        let outcome = apply(&mut collection)?;
        self.persist(&collection)?;
        Ok(outcome)
    }
}

/// A store chosen at runtime from a [`ProviderConfig`].
#[derive(Debug)]
pub enum Backend {
    /// GeoJSON file.
    GeoJson(GeoJsonStore),
    /// SQLite table.
    #[cfg(feature = "store-sqlite")]
    Sqlite(SqliteStore),
}

impl Backend {
    /// Open the backend named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfiguration`] when the configuration
    /// is rejected or names a backend this build lacks, and
    /// [`ProviderError::BackendUnavailable`] when the backend cannot be opened.
    pub fn open(config: &ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        match config.kind() {
            BackendKind::GeoJson => Ok(Self::GeoJson(GeoJsonStore::new(config.data_path()))),
            #[cfg(feature = "store-sqlite")]
            BackendKind::Sqlite => {
                let table = config.table().ok_or_else(|| {
                    ProviderError::InvalidConfiguration("SQLite backend requires a table".into())
                })?;
                Ok(Self::Sqlite(SqliteStore::open(config.data_path(), table)?))
            }
            #[cfg(not(feature = "store-sqlite"))]
            BackendKind::Sqlite => Err(ProviderError::InvalidConfiguration(
                "SQLite support is not compiled in; enable the `store-sqlite` feature".into(),
            )),
        }
    }
}

impl FeatureStore for Backend {
    fn locator(&self) -> &str {
        match self {
            Self::GeoJson(store) => store.locator(),
            #[cfg(feature = "store-sqlite")]
            Self::Sqlite(store) => store.locator(),
        }
    }

    fn load(&self) -> Result<FeatureCollection, StoreError> {
        match self {
            Self::GeoJson(store) => store.load(),
            #[cfg(feature = "store-sqlite")]
            Self::Sqlite(store) => store.load(),
        }
    }

    fn persist(&self, collection: &FeatureCollection) -> Result<(), StoreError> {
        match self {
            Self::GeoJson(store) => store.persist(collection),
            #[cfg(feature = "store-sqlite")]
            Self::Sqlite(store) => store.persist(collection),
        }
    }

    fn assigns_identifiers(&self) -> bool {
        match self {
            Self::GeoJson(store) => store.assigns_identifiers(),
            #[cfg(feature = "store-sqlite")]
            Self::Sqlite(store) => store.assigns_identifiers(),
        }
    }

    fn transact<T, E, F>(&self, apply: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut FeatureCollection) -> Result<T, E>,
    {
        match self {
            Self::GeoJson(store) => store.transact(apply),
            #[cfg(feature = "store-sqlite")]
            Self::Sqlite(store) => store.transact(apply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Feature;
    use crate::test_support::MemoryStore;
    use rstest::rstest;

    #[rstest]
    fn transact_persists_successful_changes() {
        let store = MemoryStore::default();
        store
            .transact(|collection| {
                collection.features.push(Feature::default());
                Ok::<_, StoreError>(())
            })
            .expect("transact");
        assert_eq!(store.load().expect("load").len(), 1);
    }

    #[rstest]
    fn transact_discards_failed_changes() {
        let store = MemoryStore::default();
        let result = store.transact(|collection| {
            collection.features.push(Feature::default());
            Err::<(), _>(ProviderError::InvalidConfiguration("boom".into()))
        });
        assert!(result.is_err());
        assert!(store.load().expect("load").is_empty());
    }

    #[rstest]
    fn open_rejects_invalid_configuration() {
        let config = ProviderConfig::new(BackendKind::GeoJson, "");
        assert!(matches!(
            Backend::open(&config),
            Err(ProviderError::InvalidConfiguration(_))
        ));
    }

    #[rstest]
    fn open_selects_geojson_backend() {
        let config = ProviderConfig::new(BackendKind::GeoJson, "data/islands.geojson");
        let backend = Backend::open(&config).expect("open");
        assert!(matches!(backend, Backend::GeoJson(_)));
        assert_eq!(backend.locator(), "data/islands.geojson");
    }
}
