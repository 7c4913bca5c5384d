//! Create, update and delete applied to an in-memory collection.
//!
//! Stores wrap these in their own load/persist unit (see
//! [`FeatureStore::transact`](crate::FeatureStore::transact)); nothing here
//! touches a backend.

use log::warn;

use crate::{Feature, FeatureCollection, FeatureId, IdentifierPolicy, ProviderError};

/// Append `feature`, returning its identifier.
///
/// A feature without an identifier receives [`IdentifierPolicy::next_id`]
/// when `assign_missing` is set and is rejected otherwise.
pub fn insert(
    collection: &mut FeatureCollection,
    policy: &IdentifierPolicy,
    feature: Feature,
    assign_missing: bool,
) -> Result<FeatureId, ProviderError> {
    let id = match policy.extract_id(&feature) {
        Ok(id) => id,
        Err(ProviderError::MissingIdentifier { .. }) if assign_missing => {
            policy.next_id(collection)
        }
        Err(err) => return Err(err),
    };
    if policy.position(collection, &id).is_some() {
        return Err(ProviderError::DuplicateIdentifier { id });
    }
    collection.features.push(policy.assign_id(feature, id.clone()));
    Ok(id)
}

/// Replace the feature identified by `id` in place.
///
/// The stored feature keeps `id`; any identifier inside `replacement` is
/// overwritten.
pub fn replace(
    collection: &mut FeatureCollection,
    policy: &IdentifierPolicy,
    id: &FeatureId,
    replacement: Feature,
) -> Result<(), ProviderError> {
    let position = locate(collection, policy, id)?;
    let original = stored_id(collection, policy, position, id);
    if let Some(requested) = policy
        .extract_id(&replacement)
        .ok()
        .filter(|new| !new.matches(&original))
    {
        warn!("ignoring identifier {requested} in replacement for feature {original}");
    }
    if let Some(slot) = collection.features.get_mut(position) {
        *slot = policy.assign_id(replacement, original);
    }
    Ok(())
}

/// Remove and return the feature identified by `id`.
pub fn remove(
    collection: &mut FeatureCollection,
    policy: &IdentifierPolicy,
    id: &FeatureId,
) -> Result<Feature, ProviderError> {
    let position = locate(collection, policy, id)?;
    Ok(collection.features.remove(position))
}

/// Borrow the feature identified by `id`.
pub fn find<'c>(
    collection: &'c FeatureCollection,
    policy: &IdentifierPolicy,
    id: &FeatureId,
) -> Result<&'c Feature, ProviderError> {
    collection
        .iter()
        .find(|feature| policy.identifies(feature, id))
        .ok_or_else(|| not_found(id))
}

fn locate(
    collection: &FeatureCollection,
    policy: &IdentifierPolicy,
    id: &FeatureId,
) -> Result<usize, ProviderError> {
    policy.position(collection, id).ok_or_else(|| not_found(id))
}

/// Identifier as stored, so updates keep its original type.
fn stored_id(
    collection: &FeatureCollection,
    policy: &IdentifierPolicy,
    position: usize,
    requested: &FeatureId,
) -> FeatureId {
    collection
        .features
        .get(position)
        .and_then(|feature| policy.extract_id(feature).ok())
        .unwrap_or_else(|| requested.clone())
}

fn not_found(id: &FeatureId) -> ProviderError {
    ProviderError::NotFound { id: id.clone() }
}
