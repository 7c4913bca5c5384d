//! Identifier resolution for features.

use uuid::Uuid;

use crate::{Feature, FeatureCollection, FeatureId, ProviderError};

/// Resolves, assigns and generates feature identifiers.
///
/// A feature's identifier is its top-level `id` when present, otherwise the
/// value of the configured identifier property.
///
/// # Examples
///
/// ```
/// use geoprovider_core::{Feature, FeatureId, IdentifierPolicy};
/// use serde_json::json;
///
/// let policy = IdentifierPolicy::new("code");
/// let feature = Feature::from_value(json!({
///     "type": "Feature",
///     "geometry": null,
///     "properties": {"code": 42}
/// }))?;
/// assert_eq!(policy.extract_id(&feature).ok(), Some(FeatureId::from(42)));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPolicy {
    id_field: String,
}

impl IdentifierPolicy {
    /// Build a policy for the given identifier property.
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    /// Configured identifier property.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Resolve the identifier of `feature`.
    pub fn extract_id(&self, feature: &Feature) -> Result<FeatureId, ProviderError> {
        self.find_id(feature)
            .ok_or_else(|| ProviderError::MissingIdentifier {
                field: self.id_field.clone(),
            })
    }

    fn find_id(&self, feature: &Feature) -> Option<FeatureId> {
        feature.id.clone().or_else(|| {
            feature
                .property(&self.id_field)
                .and_then(FeatureId::from_value)
        })
    }

    /// Stamp `id` onto `feature`.
    ///
    /// The top-level `id` is always set. The identifier property is only
    /// overwritten when the feature already carries it, so payloads keep
    /// their original shape.
    #[must_use]
    pub fn assign_id(&self, mut feature: Feature, id: FeatureId) -> Feature {
        if let Some(slot) = feature.properties.get_mut(&self.id_field) {
            *slot = id.to_value();
        }
        feature.id = Some(id);
        feature
    }

    /// Whether `feature` is identified by `id`, comparing across id types.
    pub fn identifies(&self, feature: &Feature, id: &FeatureId) -> bool {
        self.find_id(feature)
            .is_some_and(|candidate| candidate.matches(id))
    }

    /// Position of the feature identified by `id`.
    pub fn position(&self, collection: &FeatureCollection, id: &FeatureId) -> Option<usize> {
        collection
            .iter()
            .position(|feature| self.identifies(feature, id))
    }

    /// Generate an identifier not present in `collection`.
    ///
    /// Collections whose identifiers are all integers continue the sequence
    /// from the current maximum; anything else receives a random UUID.
    pub fn next_id(&self, collection: &FeatureCollection) -> FeatureId {
        let integers: Option<Vec<i64>> = collection
            .iter()
            .map(|feature| self.find_id(feature).and_then(|id| id.as_integer()))
            .collect();
        match integers.and_then(|ids| ids.into_iter().max()) {
            Some(max) if max < i64::MAX => FeatureId::Integer(max + 1),
            _ => FeatureId::Text(Uuid::new_v4().to_string()),
        }
    }
}
