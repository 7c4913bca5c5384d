//! GeoJSON feature and feature collection models.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::Geometry;

/// Property map carried by a [`Feature`].
pub type Properties = Map<String, Value>;

/// Identifier of a feature within a collection.
///
/// GeoJSON allows either a string or a number. Integers and strings compare
/// leniently through [`FeatureId::matches`] so that an identifier taken from a
/// request path (always text) finds a feature stored with a numeric id.
///
/// # Examples
///
/// ```
/// use geoprovider_core::FeatureId;
///
/// assert!(FeatureId::from(123).matches(&FeatureId::from("123")));
/// assert!(!FeatureId::from(123).matches(&FeatureId::from("0123")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Integer identifier within `i64` range.
    Integer(i64),
    /// Any other JSON number, such as `1.5` or an integer above `i64::MAX`.
    Number(Number),
    /// Textual identifier.
    Text(String),
}

impl FeatureId {
    /// Compare two identifiers, treating a number and its canonical decimal
    /// text form as equal.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(left), Self::Integer(right)) => left == right,
            (Self::Text(left), Self::Text(right)) => left == right,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Interpret a JSON value as an identifier.
    ///
    /// Strings and numbers qualify; booleans, nulls and containers yield
    /// `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Number(number) => Some(
                number
                    .as_i64()
                    .map_or_else(|| Self::Number(number.clone()), Self::Integer),
            ),
            _ => None,
        }
    }

    /// Return the identifier as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(number) => Value::from(*number),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Text(text) => Value::from(text.as_str()),
        }
    }

    /// Return the integer form when the identifier is numeric.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(number) => Some(*number),
            Self::Number(_) | Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(number) => write!(f, "{number}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// A single GeoJSON feature.
///
/// Members other than `type`, `id`, `geometry` and `properties` are kept in
/// [`Feature::foreign_members`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: FeatureTag,
    /// Identifier, when the feature carries one at the top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    /// Geometry; `None` serialises as JSON `null`.
    pub geometry: Option<Geometry>,
    /// Feature attributes. A JSON `null` reads as an empty map.
    #[serde(default, deserialize_with = "nullable_properties")]
    pub properties: Properties,
    /// Additional top-level members.
    #[serde(flatten)]
    pub foreign_members: Map<String, Value>,
}

impl Feature {
    /// Build a feature without an identifier.
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties,
            foreign_members: Map::new(),
        }
    }

    /// Return the feature with `id` set at the top level.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parse a feature from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl Default for Feature {
    fn default() -> Self {
        Self::new(None, Properties::new())
    }
}

fn nullable_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Properties>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// An ordered sequence of features.
///
/// # Examples
///
/// ```
/// use geoprovider_core::{Feature, FeatureCollection};
///
/// let collection = FeatureCollection::new(vec![Feature::new(None, Default::default())]);
/// let json = serde_json::to_value(&collection).unwrap();
/// assert_eq!(json["type"], "FeatureCollection");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: CollectionTag,
    /// Features in collection order.
    pub features: Vec<Feature>,
    /// Number of features matching a query, before paging.
    #[serde(
        rename = "numberMatched",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub number_matched: Option<usize>,
    /// Number of features returned by a query.
    #[serde(
        rename = "numberReturned",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub number_returned: Option<usize>,
    /// Additional top-level members.
    #[serde(flatten)]
    pub foreign_members: Map<String, Value>,
}

impl FeatureCollection {
    /// Wrap features in a collection.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            features,
            number_matched: None,
            number_returned: None,
            foreign_members: Map::new(),
        }
    }

    /// Number of features held.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate over the features in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Drop query bookkeeping so the collection can be stored.
    pub(crate) fn clear_counts(&mut self) {
        self.number_matched = None;
        self.number_returned = None;
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
