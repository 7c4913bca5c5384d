//! Core of a storage-agnostic geospatial feature provider.
//!
//! A [`Provider`] offers query, get, create, update and delete over a GeoJSON
//! feature collection held by any [`FeatureStore`]: a GeoJSON file, a SQLite
//! table or an in-memory collection. Callers build one from a
//! [`ProviderConfig`] with [`Provider::from_config`], then issue one
//! operation per request. Stores are re-read on every operation.

mod config;
mod error;
mod feature;
mod geometry;
mod identifier;
pub mod mutation;
mod provider;
pub mod query;
pub mod store;
pub mod test_support;

pub use config::{BackendKind, DEFAULT_ID_FIELD, ProviderConfig};
pub use error::{BoxError, ErrorKind, ProviderError};
pub use feature::{Feature, FeatureCollection, FeatureId, Properties};
pub use geometry::{Geometry, GeometryError};
pub use identifier::IdentifierPolicy;
pub use provider::{Provider, parse_feature};
pub use query::{QueryParams, ResultType, SortKey};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
pub use store::{Backend, FeatureStore, GeoJsonStore, StoreError};
