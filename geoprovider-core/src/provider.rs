//! Provider facade wiring configuration, stores, queries and mutations.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::query::{self, CompiledFilter, QueryParams};
use crate::store::{Backend, FeatureStore};
use crate::{
    Feature, FeatureCollection, FeatureId, IdentifierPolicy, ProviderConfig, ProviderError,
    mutation,
};

/// Parse a GeoJSON Feature payload.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidFeature`] when `payload` is not a valid
/// GeoJSON Feature.
pub fn parse_feature(payload: &str) -> Result<Feature, ProviderError> {
    serde_json::from_str(payload).map_err(ProviderError::InvalidFeature)
}

/// Uniform CRUD access to the features held by a [`FeatureStore`].
///
/// Every operation reads the store afresh; nothing is cached between calls.
///
/// # Examples
///
/// ```
/// use geoprovider_core::query::QueryParams;
/// use geoprovider_core::test_support::MemoryStore;
/// use geoprovider_core::{FeatureId, Provider, parse_feature};
///
/// let provider = Provider::new(MemoryStore::default(), "id");
/// let id = provider.create(parse_feature(
///     r#"{"type": "Feature", "geometry": null, "properties": {"name": "Dinagat"}}"#,
/// )?)?;
/// assert!(matches!(id, FeatureId::Text(_)));
///
/// let page = provider.query(&QueryParams::default())?;
/// assert_eq!(page.number_matched, Some(1));
/// # Ok::<(), geoprovider_core::ProviderError>(())
/// ```
#[derive(Debug)]
pub struct Provider<S> {
    store: S,
    policy: IdentifierPolicy,
    properties: Vec<String>,
}

impl Provider<Backend> {
    /// Build a provider for the backend named by `config`.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the backend cannot be
    /// opened.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let store = Backend::open(config)?;
        debug!("configured {} provider for {}", config.kind(), store.locator());
        Ok(Self::new(store, config.id_field()).with_properties(config.properties().to_vec()))
    }
}

impl<S: FeatureStore> Provider<S> {
    /// Wrap `store`, resolving identifiers through `id_field`.
    pub fn new(store: S, id_field: impl Into<String>) -> Self {
        Self {
            store,
            policy: IdentifierPolicy::new(id_field),
            properties: Vec::new(),
        }
    }

    /// Emit only the listed properties; an empty list emits all.
    #[must_use]
    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    /// Backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Identifier policy in use.
    pub const fn policy(&self) -> &IdentifierPolicy {
        &self.policy
    }

    /// Run a query.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidFilterSyntax`] or
    /// [`ProviderError::InvalidSortProperty`] for bad parameters and
    /// [`ProviderError::BackendUnavailable`] when the store cannot be read.
    pub fn query(&self, params: &QueryParams) -> Result<FeatureCollection, ProviderError> {
        let filter = CompiledFilter::new(&params.filter)?;
        let collection = self.store.load()?;
        let result =
            query::execute_compiled(collection, &filter, &self.policy, params, &self.properties)?;
        debug!(
            "query on {} matched {} and returned {}",
            self.store.locator(),
            result.number_matched.unwrap_or_default(),
            result.len()
        );
        Ok(result)
    }

    /// Fetch one feature, wrapped in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] when no feature matches `id`.
    pub fn get(&self, id: &FeatureId) -> Result<FeatureCollection, ProviderError> {
        let collection = self.store.load()?;
        let feature = mutation::find(&collection, &self.policy, id)?.clone();
        debug!("fetched feature {id} from {}", self.store.locator());
        let projected = query::project(
            feature,
            &self.policy,
            &QueryParams::default(),
            &self.properties,
        );
        Ok(FeatureCollection::new(vec![projected]))
    }

    /// Add a feature and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingIdentifier`] when the feature has no
    /// identifier and the store does not assign one,
    /// [`ProviderError::DuplicateIdentifier`] when the identifier is taken and
    /// [`ProviderError::BackendWrite`] when persisting fails.
    pub fn create(&self, feature: Feature) -> Result<FeatureId, ProviderError> {
        let assign = self.store.assigns_identifiers();
        let id = self
            .store
            .transact(|collection| mutation::insert(collection, &self.policy, feature, assign))?;
        info!("created feature {id} in {}", self.store.locator());
        Ok(id)
    }

    /// Replace the feature identified by `id`, keeping that identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] when no feature matches `id` and
    /// [`ProviderError::BackendWrite`] when persisting fails.
    pub fn update(&self, id: &FeatureId, replacement: Feature) -> Result<(), ProviderError> {
        self.store
            .transact(|collection| mutation::replace(collection, &self.policy, id, replacement))?;
        info!("updated feature {id} in {}", self.store.locator());
        Ok(())
    }

    /// Remove the feature identified by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] when no feature matches `id` and
    /// [`ProviderError::BackendWrite`] when persisting fails.
    pub fn delete(&self, id: &FeatureId) -> Result<(), ProviderError> {
        self.store
            .transact(|collection| mutation::remove(collection, &self.policy, id).map(drop))?;
        info!("deleted feature {id} from {}", self.store.locator());
        Ok(())
    }

    /// Property names mapped to their JSON type.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::BackendUnavailable`] when the store cannot be
    /// read.
    pub fn fields(&self) -> Result<BTreeMap<String, &'static str>, ProviderError> {
        let collection = self.store.load()?;
        Ok(query::fields(&collection, &self.properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use crate::{ErrorKind, Geometry};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn feature(value: serde_json::Value) -> Feature {
        Feature::from_value(value).expect("valid feature")
    }

    #[fixture]
    fn provider() -> Provider<MemoryStore> {
        let seed = FeatureCollection::new(vec![
            feature(json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [125.6, 10.1]},
                "properties": {"code": 10, "name": "Dinagat", "secret": "x"}
            })),
        ]);
        Provider::new(MemoryStore::with_collection(seed), "code")
    }

    #[rstest]
    fn get_accepts_textual_identifier(provider: Provider<MemoryStore>) {
        let result = provider.get(&FeatureId::from("10")).expect("get");
        assert_eq!(result.len(), 1);
        assert_eq!(result.features.first().and_then(|f| f.id.clone()), Some(FeatureId::from(10)));
    }

    #[rstest]
    fn create_continues_integer_sequence(provider: Provider<MemoryStore>) {
        let id = provider
            .create(Feature::new(Some(Geometry::point(0.0, 0.0)), Default::default()))
            .expect("create");
        assert_eq!(id, FeatureId::Integer(11));
        assert_eq!(provider.store().snapshot().len(), 2);
    }

    #[rstest]
    fn create_without_assignment_requires_identifier() {
        let provider = Provider::new(MemoryStore::default().without_identifier_assignment(), "id");
        let err = provider.create(Feature::default()).expect_err("missing id");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[rstest]
    fn duplicate_create_conflicts(provider: Provider<MemoryStore>) {
        let err = provider
            .create(Feature::default().with_id("10"))
            .expect_err("duplicate");
        assert!(matches!(err, ProviderError::DuplicateIdentifier { .. }));
    }

    #[rstest]
    fn update_keeps_identifier(provider: Provider<MemoryStore>) {
        let replacement = feature(json!({
            "type": "Feature",
            "id": 99,
            "geometry": null,
            "properties": {"code": 99, "name": "Renamed"}
        }));
        provider.update(&FeatureId::from(10), replacement).expect("update");
        let stored = provider.get(&FeatureId::from(10)).expect("get");
        let first = stored.features.first().expect("one feature");
        assert_eq!(first.property("name"), Some(&json!("Renamed")));
        assert_eq!(first.property("code"), Some(&json!(10)));
        assert!(provider.get(&FeatureId::from(99)).is_err());
    }

    #[rstest]
    fn delete_then_get_is_not_found(provider: Provider<MemoryStore>) {
        provider.delete(&FeatureId::from(10)).expect("delete");
        let err = provider.get(&FeatureId::from(10)).expect_err("gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let again = provider.delete(&FeatureId::from(10)).expect_err("gone");
        assert_eq!(again.kind(), ErrorKind::NotFound);
    }

    #[rstest]
    fn failed_write_keeps_store_unchanged() {
        let seed = FeatureCollection::new(vec![Feature::default().with_id(1)]);
        let store = MemoryStore::with_collection(seed.clone()).failing_writes();
        let provider = Provider::new(store, "id");
        let err = provider.delete(&FeatureId::from(1)).expect_err("write fails");
        assert!(matches!(err, ProviderError::BackendWrite { .. }));
        assert_eq!(provider.store().snapshot(), seed);
    }

    #[rstest]
    fn whitelist_limits_emitted_properties(provider: Provider<MemoryStore>) {
        let provider = provider.with_properties(vec!["name".into()]);
        let result = provider.get(&FeatureId::from(10)).expect("get");
        let first = result.features.first().expect("one feature");
        assert!(first.property("secret").is_none());
        assert_eq!(provider.fields().expect("fields").len(), 1);
    }

    #[rstest]
    fn invalid_filter_is_reported_before_reading_store() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("absent.geojson"))
            .expect("utf-8 temp path");
        let provider = Provider::new(crate::GeoJsonStore::new(path), "id");

        let err = provider
            .query(&QueryParams::default().with_cql("name ="))
            .expect_err("bad filter");
        assert!(matches!(err, ProviderError::InvalidFilterSyntax { .. }));
    }

    #[rstest]
    #[case("1.5", "1.5")]
    #[case("18446744073709551615", "18446744073709551615")]
    fn numeric_identifiers_beyond_i64_round_trip(#[case] raw: &str, #[case] lookup: &str) {
        let provider = Provider::new(MemoryStore::default(), "id");
        let payload = format!(
            r#"{{"type": "Feature", "id": {raw}, "geometry": null, "properties": {{}}}}"#
        );
        let id = provider
            .create(parse_feature(&payload).expect("valid feature"))
            .expect("create");
        assert!(matches!(id, FeatureId::Number(_)));

        let fetched = provider.get(&FeatureId::from(lookup)).expect("get");
        let stored = fetched.features.first().and_then(|f| f.id.clone());
        assert_eq!(stored, Some(id));
    }

    #[rstest]
    fn invalid_payload_is_rejected() {
        let err = parse_feature(r#"{"type": "Polygon"}"#).expect_err("not a feature");
        assert!(matches!(err, ProviderError::InvalidFeature(_)));
    }
}
