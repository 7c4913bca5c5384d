//! Facade crate for the geoprovider feature provider.
//!
//! This crate re-exports the provider API and exposes the SQLite store behind
//! the `store-sqlite` feature flag.

#![forbid(unsafe_code)]

pub use geoprovider_core::{
    Backend, BackendKind, BoxError, DEFAULT_ID_FIELD, ErrorKind, Feature, FeatureCollection,
    FeatureId, FeatureStore, GeoJsonStore, Geometry, GeometryError, IdentifierPolicy, Properties,
    Provider, ProviderConfig, ProviderError, QueryParams, ResultType, SortKey, StoreError,
    parse_feature,
};

pub use geoprovider_core::{mutation, query};

#[cfg(feature = "store-sqlite")]
pub use geoprovider_core::SqliteStore;
