use std::collections::BTreeMap;

use geo::{Area, MultiPolygon};

use crate::{
    error::EstimateError,
    geom::{check_shape, union_all},
    layer::FeatureKey,
};

/// One dissolved study area: the union of every input polygon sharing `key`.
#[derive(Debug, Clone)]
pub struct StudyAreaPolygon {
    pub key: FeatureKey,
    pub shape: MultiPolygon<f64>,
}

/// Merge study-area polygons into one shape per key. Features without a key fall
/// under `implicit_key`. Output is ordered by key.
///
/// Every input must be a valid polygon/multipolygon; inputs are numbered by position
/// in error messages.
pub fn dissolve<'a, I>(features: I, implicit_key: &FeatureKey) -> Result<Vec<StudyAreaPolygon>, EstimateError>
where
    I: IntoIterator<Item = (&'a MultiPolygon<f64>, Option<FeatureKey>)>,
{
    let mut groups: BTreeMap<FeatureKey, Vec<&MultiPolygon<f64>>> = BTreeMap::new();
    for (i, (shape, key)) in features.into_iter().enumerate() {
        check_shape(shape).map_err(|problem| EstimateError::Geometry {
            feature: format!("#{i}"),
            reason: problem.to_string(),
        })?;
        groups.entry(key.unwrap_or_else(|| implicit_key.clone())).or_default().push(shape);
    }

    groups.into_iter()
        .map(|(key, shapes)| {
            let shape = union_all(&shapes);
            if shape.0.is_empty() {
                return Err(EstimateError::DissolveFailure {
                    key: key.to_string(),
                    reason: format!("union of {} polygons is empty", shapes.len()),
                })
            }
            if shape.unsigned_area() <= 0.0 {
                return Err(EstimateError::DegenerateGeometry { feature: key.to_string() })
            }
            tracing::debug!(key = %key, parts = shapes.len(), polygons = shape.0.len(), "dissolved study area");
            Ok(StudyAreaPolygon { key, shape })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{Area, Coord, LineString, MultiPolygon, Polygon, Rect, coord};

    use super::dissolve;
    use crate::{error::EstimateError, layer::FeatureKey};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
    }

    #[test]
    fn one_output_per_distinct_key() {
        let shapes = [rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0), rect(5.0, 5.0, 6.0, 6.0)];
        let keys = ["b", "b", "a"];
        let dissolved = dissolve(
            shapes.iter().zip(keys).map(|(shape, key)| (shape, Some(FeatureKey::from(key)))),
            &FeatureKey::from("unused"),
        ).unwrap();

        assert_eq!(dissolved.len(), 2);
        assert_eq!(dissolved[0].key.as_str(), "a");
        assert_eq!(dissolved[1].key.as_str(), "b");
        assert_relative_eq!(dissolved[1].shape.unsigned_area(), 2.0, epsilon = 1e-9);
        assert_eq!(dissolved[1].shape.0.len(), 1);
    }

    #[test]
    fn unkeyed_features_merge_under_implicit_key() {
        let shapes = [rect(0.0, 0.0, 1.0, 1.0), rect(3.0, 0.0, 4.0, 1.0)];
        let dissolved = dissolve(shapes.iter().map(|shape| (shape, None)), &FeatureKey::from("1")).unwrap();

        assert_eq!(dissolved.len(), 1);
        assert_eq!(dissolved[0].key.as_str(), "1");
        assert_eq!(dissolved[0].shape.0.len(), 2);
    }

    #[test]
    fn invalid_geometry_is_reported_by_position() {
        let shapes = [rect(0.0, 0.0, 1.0, 1.0), MultiPolygon(vec![])];
        let err = dissolve(shapes.iter().map(|shape| (shape, None)), &FeatureKey::from("1")).unwrap_err();
        assert!(matches!(err, EstimateError::Geometry { feature, .. } if feature == "#1"));
    }

    #[test]
    fn flat_polygon_is_a_geometry_error() {
        let flat = LineString(vec![
            Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }, Coord { x: 2.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 },
        ]);
        let shapes = [MultiPolygon(vec![Polygon::new(flat, vec![])])];
        let err = dissolve(shapes.iter().map(|shape| (shape, None)), &FeatureKey::from("1")).unwrap_err();
        assert!(matches!(err, EstimateError::Geometry { .. }));
    }
}
