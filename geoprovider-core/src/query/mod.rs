//! Query execution over a loaded feature collection.
//!
//! Execution order is fixed: parse the filter, validate sort keys, filter,
//! count, sort, page, project. `offset` and `limit` therefore always apply
//! to the filtered and sorted sequence.

pub mod cql;
mod filter;
mod sort;
mod value;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::{Feature, FeatureCollection, IdentifierPolicy, ProviderError};

pub use filter::QueryFilter;
pub use sort::{Direction, SortKey};

pub(crate) use filter::CompiledFilter;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 10;

/// What a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    /// Matching features.
    #[default]
    Results,
    /// Only the number of matches.
    Hits,
}

/// Query parameters.
///
/// # Examples
///
/// ```
/// use geoprovider_core::query::{QueryParams, ResultType, SortKey};
///
/// let params = QueryParams::default()
///     .with_cql("pop > 1000")
///     .with_sortby(SortKey::parse_list("-pop"))
///     .with_offset(10)
///     .with_limit(5);
/// assert_eq!(params.result_type, ResultType::Results);
/// assert_eq!(params.limit, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Filter dimensions.
    pub filter: QueryFilter,
    /// Sort keys, primary first.
    pub sortby: Vec<SortKey>,
    /// Matches to skip.
    pub offset: usize,
    /// Maximum features returned.
    pub limit: usize,
    /// Features or count only.
    pub result_type: ResultType,
    /// Replace geometries with `null`.
    pub skip_geometry: bool,
    /// Keep only these properties; empty keeps all.
    pub select_properties: Vec<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            filter: QueryFilter::default(),
            sortby: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            result_type: ResultType::Results,
            skip_geometry: false,
            select_properties: Vec::new(),
        }
    }
}

impl QueryParams {
    /// Restrict to features intersecting `bbox`.
    #[must_use]
    pub fn with_bbox(mut self, bbox: geo::Rect<f64>) -> Self {
        self.filter.bbox = Some(bbox);
        self
    }

    /// Require `property` to equal `value`.
    #[must_use]
    pub fn with_property(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.properties.push((property.into(), value.into()));
        self
    }

    /// Filter with a CQL2-text expression.
    #[must_use]
    pub fn with_cql(mut self, expression: impl Into<String>) -> Self {
        self.filter.cql = Some(expression.into());
        self
    }

    /// Sort by `keys`.
    #[must_use]
    pub fn with_sortby(mut self, keys: Vec<SortKey>) -> Self {
        self.sortby = keys;
        self
    }

    /// Skip `offset` matches.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Return at most `limit` features.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Return the match count only.
    #[must_use]
    pub const fn hits(mut self) -> Self {
        self.result_type = ResultType::Hits;
        self
    }

    /// Null out geometries in the result.
    #[must_use]
    pub const fn skip_geometry(mut self) -> Self {
        self.skip_geometry = true;
        self
    }

    /// Keep only the named properties.
    #[must_use]
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_properties = properties.into_iter().map(Into::into).collect();
        self
    }
}

/// Look up `name` on `feature`: a property, or the identifier when `name` is
/// `id` or the configured identifier field.
pub(crate) fn resolve(feature: &Feature, policy: &IdentifierPolicy, name: &str) -> Option<Value> {
    feature.property(name).cloned().or_else(|| {
        (name == "id" || name == policy.id_field())
            .then(|| policy.extract_id(feature).ok())
            .flatten()
            .map(|id| id.to_value())
    })
}

/// Run `params` against `collection`.
///
/// `whitelist` limits emitted properties in addition to
/// [`QueryParams::select_properties`]; empty means no restriction.
pub fn execute(
    collection: FeatureCollection,
    policy: &IdentifierPolicy,
    params: &QueryParams,
    whitelist: &[String],
) -> Result<FeatureCollection, ProviderError> {
    let filter = CompiledFilter::new(&params.filter)?;
    execute_compiled(collection, &filter, policy, params, whitelist)
}

/// Run `params` with its filter already compiled by the caller.
pub(crate) fn execute_compiled(
    collection: FeatureCollection,
    filter: &CompiledFilter<'_>,
    policy: &IdentifierPolicy,
    params: &QueryParams,
    whitelist: &[String],
) -> Result<FeatureCollection, ProviderError> {
    validate_sortby(&collection, policy, &params.sortby)?;

    let mut matched: Vec<Feature> = collection
        .features
        .into_iter()
        .filter(|feature| {
            filter.matches(
                |bbox| {
                    feature
                        .geometry
                        .as_ref()
                        .is_some_and(|geometry| geometry.intersects_rect(bbox))
                },
                &|name: &str| resolve(feature, policy, name),
            )
        })
        .collect();
    let number_matched = matched.len();

    if params.result_type == ResultType::Hits {
        let mut result = FeatureCollection::default();
        result.number_matched = Some(number_matched);
        result.number_returned = Some(0);
        return Ok(result);
    }

    if !params.sortby.is_empty() {
        matched.sort_by(|left, right| {
            sort::compare_rows(left, right, &params.sortby, |feature, name| {
                resolve(feature, policy, name)
            })
        });
    }

    let features: Vec<Feature> = matched
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .map(|feature| project(feature, policy, params, whitelist))
        .collect();

    let mut result = FeatureCollection::new(features);
    result.number_matched = Some(number_matched);
    result.number_returned = Some(result.len());
    Ok(result)
}

fn validate_sortby(
    collection: &FeatureCollection,
    policy: &IdentifierPolicy,
    sortby: &[SortKey],
) -> Result<(), ProviderError> {
    if sortby.is_empty() || collection.is_empty() {
        return Ok(());
    }
    let known = property_names(collection);
    match sortby.iter().find(|key| {
        key.property != "id"
            && key.property != policy.id_field()
            && !known.contains(key.property.as_str())
    }) {
        Some(key) => Err(ProviderError::InvalidSortProperty {
            property: key.property.clone(),
        }),
        None => Ok(()),
    }
}

fn property_names(collection: &FeatureCollection) -> BTreeSet<&str> {
    collection
        .iter()
        .flat_map(|feature| feature.properties.keys().map(String::as_str))
        .collect()
}

/// Normalise the identifier to the top level and apply property selection.
pub(crate) fn project(
    mut feature: Feature,
    policy: &IdentifierPolicy,
    params: &QueryParams,
    whitelist: &[String],
) -> Feature {
    if feature.id.is_none() {
        feature.id = policy.extract_id(&feature).ok();
    }
    if params.skip_geometry {
        feature.geometry = None;
    }
    restrict_properties(&mut feature, &params.select_properties, whitelist);
    feature
}

pub(crate) fn restrict_properties(
    feature: &mut Feature,
    selected: &[String],
    whitelist: &[String],
) {
    if selected.is_empty() && whitelist.is_empty() {
        return;
    }
    feature.properties.retain(|name, _| {
        let chosen = selected.is_empty() || selected.iter().any(|s| s == name);
        let allowed = whitelist.is_empty() || whitelist.iter().any(|w| w == name);
        chosen && allowed
    });
}

/// Describe the properties present in `collection`.
///
/// Each name maps to the JSON type of its first non-null value (`string`,
/// `integer`, `number`, `boolean`, `array`, `object`), or `null` when it is
/// never set.
pub fn fields(
    collection: &FeatureCollection,
    whitelist: &[String],
) -> BTreeMap<String, &'static str> {
    let mut fields: BTreeMap<String, &'static str> = BTreeMap::new();
    for (name, value) in collection.iter().flat_map(|feature| feature.properties.iter()) {
        if !whitelist.is_empty() && !whitelist.iter().any(|w| w == name) {
            continue;
        }
        let kind = json_type(value);
        fields
            .entry(name.clone())
            .and_modify(|existing| {
                if *existing == "null" {
                    *existing = kind;
                }
            })
            .or_insert(kind);
    }
    fields
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
