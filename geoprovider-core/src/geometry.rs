//! Structurally validated GeoJSON geometries.
//!
//! Geometries are kept as the JSON received so that stores round-trip them
//! byte-for-byte. Validation only checks shape: a known `type`, coordinate
//! arrays nested to the depth that type requires, and numeric positions.

use geo::{
    Coord, Intersects, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors raised when a JSON value is not a GeoJSON geometry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The geometry was not a JSON object.
    #[error("geometry must be a JSON object")]
    NotAnObject,
    /// The `type` member was missing or not a string.
    #[error("geometry is missing a string `type` member")]
    MissingType,
    /// The `type` member named an unknown geometry type.
    #[error("unknown geometry type `{0}`")]
    UnknownType(String),
    /// A required member (`coordinates` or `geometries`) was missing.
    #[error("{kind} geometry is missing `{member}`")]
    MissingMember {
        /// Geometry type being validated.
        kind: String,
        /// Name of the absent member.
        member: &'static str,
    },
    /// Coordinates were not nested to the depth required by the type.
    #[error("{kind} coordinates are not nested correctly")]
    Nesting {
        /// Geometry type being validated.
        kind: String,
    },
    /// A position held fewer than two numbers or a non-numeric ordinate.
    #[error("{kind} contains an invalid position")]
    InvalidPosition {
        /// Geometry type being validated.
        kind: String,
    },
}

/// A GeoJSON geometry object.
///
/// # Examples
///
/// ```
/// use geoprovider_core::Geometry;
/// use serde_json::json;
///
/// let point = Geometry::try_from(json!({"type": "Point", "coordinates": [125.6, 10.1]}))?;
/// assert_eq!(point.kind(), "Point");
/// assert!(Geometry::try_from(json!({"type": "Point", "coordinates": [1.0]})).is_err());
/// # Ok::<(), geoprovider_core::GeometryError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Geometry(Value);

impl Geometry {
    /// Build a `Point` geometry.
    pub fn point(x: f64, y: f64) -> Self {
        Self(json!({"type": "Point", "coordinates": [x, y]}))
    }

    /// Geometry type name, such as `Point` or `MultiPolygon`.
    pub fn kind(&self) -> &str {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Borrow the underlying JSON.
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Convert to a `geo` geometry for spatial predicates.
    pub fn to_geo(&self) -> Option<geo::Geometry<f64>> {
        to_geo(&self.0)
    }

    /// Whether the geometry intersects `bbox`, boundary included.
    pub fn intersects_rect(&self, bbox: &Rect<f64>) -> bool {
        self.to_geo().is_some_and(|geometry| geometry.intersects(bbox))
    }
}

impl TryFrom<Value> for Geometry {
    type Error = GeometryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        validate(&value)?;
        Ok(Self(value))
    }
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        geometry.0
    }
}

/// Nesting depth of `coordinates` for each simple geometry type; a bare
/// position has depth zero.
fn coordinate_depth(kind: &str) -> Option<usize> {
    match kind {
        "Point" => Some(0),
        "MultiPoint" | "LineString" => Some(1),
        "MultiLineString" | "Polygon" => Some(2),
        "MultiPolygon" => Some(3),
        _ => None,
    }
}

fn validate(value: &Value) -> Result<(), GeometryError> {
    let object = value.as_object().ok_or(GeometryError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeometryError::MissingType)?;

    if kind == "GeometryCollection" {
        let members = object
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| GeometryError::MissingMember {
                kind: kind.to_owned(),
                member: "geometries",
            })?;
        return members.iter().try_for_each(validate);
    }

    let depth =
        coordinate_depth(kind).ok_or_else(|| GeometryError::UnknownType(kind.to_owned()))?;
    let coordinates = object
        .get("coordinates")
        .ok_or_else(|| GeometryError::MissingMember {
            kind: kind.to_owned(),
            member: "coordinates",
        })?;
    validate_nesting(kind, coordinates, depth)
}

fn validate_nesting(kind: &str, value: &Value, depth: usize) -> Result<(), GeometryError> {
    let Some(items) = value.as_array() else {
        return Err(GeometryError::Nesting {
            kind: kind.to_owned(),
        });
    };
    if depth == 0 {
        let numeric = items.iter().all(|ordinate| ordinate.as_f64().is_some());
        return if items.len() >= 2 && numeric {
            Ok(())
        } else {
            Err(GeometryError::InvalidPosition {
                kind: kind.to_owned(),
            })
        };
    }
    items
        .iter()
        .try_for_each(|item| validate_nesting(kind, item, depth - 1))
}

fn coord(value: &Value) -> Option<Coord<f64>> {
    let position = value.as_array()?;
    Some(Coord {
        x: position.first()?.as_f64()?,
        y: position.get(1)?.as_f64()?,
    })
}

fn coords(value: &Value) -> Option<Vec<Coord<f64>>> {
    value.as_array()?.iter().map(coord).collect()
}

fn line(value: &Value) -> Option<LineString<f64>> {
    coords(value).map(LineString::new)
}

fn polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value
        .as_array()?
        .iter()
        .map(line)
        .collect::<Option<Vec<_>>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Some(Polygon::new(exterior, rings.collect()))
}

fn each<T>(value: &Value, convert: fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    value.as_array()?.iter().map(convert).collect()
}

fn to_geo(value: &Value) -> Option<geo::Geometry<f64>> {
    let kind = value.get("type")?.as_str()?;
    if kind == "GeometryCollection" {
        let members = each(value.get("geometries")?, to_geo)?;
        return Some(geo::Geometry::GeometryCollection(geo::GeometryCollection(members)));
    }
    let coordinates = value.get("coordinates")?;
    let geometry = match kind {
        "Point" => geo::Geometry::Point(Point::from(coord(coordinates)?)),
        "MultiPoint" => geo::Geometry::MultiPoint(MultiPoint::new(
            coords(coordinates)?.into_iter().map(Point::from).collect(),
        )),
        "LineString" => geo::Geometry::LineString(line(coordinates)?),
        "MultiLineString" => {
            geo::Geometry::MultiLineString(MultiLineString::new(each(coordinates, line)?))
        }
        "Polygon" => geo::Geometry::Polygon(polygon(coordinates)?),
        "MultiPolygon" => {
            geo::Geometry::MultiPolygon(MultiPolygon::new(each(coordinates, polygon)?))
        }
        _ => return None,
    };
    Some(geometry)
}
