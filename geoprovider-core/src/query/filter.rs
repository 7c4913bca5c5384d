//! Filter criteria applied before sorting and paging.

use geo::{Coord, Rect};
use serde_json::Value;

use super::cql::{self, Expr};
use super::value::loose_eq;
use crate::ProviderError;

/// Filter dimensions combined with logical AND.
///
/// A feature is kept only when it satisfies every supplied dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// Keep features whose geometry intersects this rectangle (WGS84,
    /// `x = longitude`, `y = latitude`). Features without geometry are
    /// dropped when a bbox is supplied.
    pub bbox: Option<Rect<f64>>,
    /// Property equality predicates.
    pub properties: Vec<(String, Value)>,
    /// CQL2-text expression, parsed when the query runs.
    pub cql: Option<String>,
}

impl QueryFilter {
    /// Whether no dimension is set.
    pub fn is_empty(&self) -> bool {
        self.bbox.is_none() && self.properties.is_empty() && self.cql.is_none()
    }

    /// Parse a `minx,miny,maxx,maxy` bounding box.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoprovider_core::query::QueryFilter;
    ///
    /// let bbox = QueryFilter::parse_bbox("120,5,130,15")?;
    /// assert_eq!(bbox.min().x, 120.0);
    /// assert!(QueryFilter::parse_bbox("1,2,3").is_err());
    /// # Ok::<(), geoprovider_core::ProviderError>(())
    /// ```
    pub fn parse_bbox(input: &str) -> Result<Rect<f64>, ProviderError> {
        let values = input
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect::<Option<Vec<_>>>();
        match values.as_deref() {
            Some(&[min_x, min_y, max_x, max_y]) => Ok(Rect::new(
                Coord { x: min_x, y: min_y },
                Coord { x: max_x, y: max_y },
            )),
            _ => Err(ProviderError::InvalidFilterSyntax {
                offset: 0,
                message: format!("bbox `{input}` must be four comma-separated numbers"),
            }),
        }
    }

    /// Parse the CQL expression, if any.
    pub(crate) fn compile(&self) -> Result<Option<Expr>, ProviderError> {
        self.cql.as_deref().map(cql::parse).transpose()
    }
}

/// A filter ready to evaluate: its CQL already parsed.
pub(crate) struct CompiledFilter<'f> {
    filter: &'f QueryFilter,
    expr: Option<Expr>,
}

impl<'f> CompiledFilter<'f> {
    pub(crate) fn new(filter: &'f QueryFilter) -> Result<Self, ProviderError> {
        Ok(Self {
            filter,
            expr: filter.compile()?,
        })
    }

    /// Evaluate every dimension; `resolve` looks up a property value.
    pub(crate) fn matches<F>(
        &self,
        geometry_hit: impl FnOnce(&Rect<f64>) -> bool,
        resolve: &F,
    ) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        if let Some(bbox) = &self.filter.bbox {
            if !geometry_hit(bbox) {
                return false;
            }
        }
        let properties_hold = self.filter.properties.iter().all(|(name, expected)| {
            resolve(name).is_some_and(|actual| loose_eq(&actual, expected))
        });
        properties_hold && self.expr.as_ref().is_none_or(|expr| expr.evaluate(resolve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("1,2,3,4")]
    #[case(" -180 , -90, 180, 90 ")]
    #[case("3,4,1,2")]
    fn parses_bboxes(#[case] input: &str) {
        assert!(QueryFilter::parse_bbox(input).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("1,2,3")]
    #[case("1,2,3,4,5")]
    #[case("a,b,c,d")]
    #[case("1,2,inf,4")]
    fn rejects_malformed_bboxes(#[case] input: &str) {
        assert!(matches!(
            QueryFilter::parse_bbox(input),
            Err(ProviderError::InvalidFilterSyntax { .. })
        ));
    }

    #[rstest]
    fn all_dimensions_must_hold() {
        let filter = QueryFilter {
            bbox: None,
            properties: vec![("kind".into(), json!("island"))],
            cql: Some("pop > 10".into()),
        };
        let compiled = CompiledFilter::new(&filter).expect("compile");
        let island = json!({"kind": "island", "pop": 20});
        let small = json!({"kind": "island", "pop": 5});
        let lake = json!({"kind": "lake", "pop": 20});
        let matches =
            |row: &Value| compiled.matches(|_| true, &|name: &str| row.get(name).cloned());
        assert!(matches(&island));
        assert!(!matches(&small));
        assert!(!matches(&lake));
    }

    #[rstest]
    fn bbox_miss_excludes_feature() {
        let filter = QueryFilter {
            bbox: QueryFilter::parse_bbox("0,0,1,1").ok(),
            ..QueryFilter::default()
        };
        let compiled = CompiledFilter::new(&filter).expect("compile");
        assert!(!compiled.matches(|_| false, &|_: &str| None));
        assert!(compiled.matches(|_| true, &|_: &str| None));
    }
}
