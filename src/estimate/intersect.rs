use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rayon::prelude::*;

use crate::{
    error::EstimateError,
    estimate::{dissolve::StudyAreaPolygon, validate},
    geom::{check_shape, Geometries, ShapeProblem},
    layer::{FeatureKey, FeatureLayer},
};

/// Overlaps smaller than this fraction of the population polygon are boundary noise
/// from clipping, not real overlap.
const RELATIVE_AREA_TOLERANCE: f64 = 1e-12;

/// A population polygon borrowed from its layer, with its validated population.
#[derive(Debug, Clone, Copy)]
pub struct PopulationPolygon<'a> {
    pub id: &'a FeatureKey,
    pub shape: &'a MultiPolygon<f64>,
    pub population: u64,
}

/// Population polygons with their R-tree, ready to be clipped against study areas.
#[derive(Debug)]
pub struct PopulationIndex<'a> {
    geoms: &'a Geometries,
    ids: &'a [FeatureKey],
    populations: Vec<u64>,
}

impl<'a> PopulationIndex<'a> {
    /// Index `layer`, reading and validating its population attribute `field`.
    pub fn from_layer(layer: &'a FeatureLayer, field: &str) -> Result<Self, EstimateError> {
        let populations = validate::population_values(layer, field)?;
        Ok(Self::with_values(layer, populations))
    }

    /// `populations` must hold one value per feature of `layer`.
    pub(crate) fn with_values(layer: &'a FeatureLayer, populations: Vec<u64>) -> Self {
        debug_assert_eq!(layer.len(), populations.len(), "one population value per feature");
        Self { geoms: layer.geoms(), ids: layer.ids(), populations }
    }

    #[inline] pub fn len(&self) -> usize { self.populations.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.populations.is_empty() }

    pub fn get(&self, idx: usize) -> Option<PopulationPolygon<'a>> {
        Some(PopulationPolygon {
            id: self.ids.get(idx)?,
            shape: self.geoms.get(idx)?,
            population: *self.populations.get(idx)?,
        })
    }

    /// Grand total of the indexed population.
    pub fn total(&self) -> u64 { self.populations.iter().sum() }
}

/// Overlap of one study area with one population polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionRecord {
    pub area_key: FeatureKey,
    pub population_id: FeatureKey,
    pub intersection_area: f64,
    pub source_area: f64,
    pub population: u64,
}

/// Counters from one intersect pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntersectStats {
    /// Pairs whose bounding boxes touch.
    pub candidates: usize,
    /// Pairs that overlap with positive area.
    pub intersecting: usize,
}

/// Clip one candidate pair. None when the overlap has no area.
fn clip(area: &StudyAreaPolygon, polygon: PopulationPolygon<'_>) -> Result<Option<IntersectionRecord>, EstimateError> {
    check_shape(polygon.shape).map_err(|problem| match problem {
        ShapeProblem::FlatExterior { .. } => EstimateError::DegenerateGeometry { feature: polygon.id.to_string() },
        other => EstimateError::Geometry { feature: polygon.id.to_string(), reason: other.to_string() },
    })?;

    let source_area = polygon.shape.unsigned_area();
    let intersection_area = area.shape.intersection(polygon.shape).unsigned_area();
    if intersection_area <= 0.0 || intersection_area <= source_area * RELATIVE_AREA_TOLERANCE {
        return Ok(None)
    }

    Ok(Some(IntersectionRecord {
        area_key: area.key.clone(),
        population_id: polygon.id.clone(),
        intersection_area,
        source_area,
        population: polygon.population,
    }))
}

/// Compute every study-area/population-polygon overlap with positive area.
/// Records come out ordered by study area, then by population polygon index,
/// whether or not the clipping runs in parallel.
pub fn intersect(
    study_areas: &[StudyAreaPolygon],
    population: &PopulationIndex<'_>,
    parallel: bool,
) -> Result<(Vec<IntersectionRecord>, IntersectStats), EstimateError> {
    let mut records = Vec::new();
    let mut stats = IntersectStats::default();

    for area in study_areas {
        let Some(rect) = area.shape.bounding_rect() else { continue };
        let candidates = population.geoms.candidates(&rect);
        stats.candidates += candidates.len();

        let pair = |idx: usize| match population.get(idx) {
            Some(polygon) => clip(area, polygon),
            None => Ok(None),
        };
        let clipped = if parallel {
            candidates.par_iter().map(|&idx| pair(idx)).collect::<Result<Vec<_>, _>>()?
        } else {
            candidates.iter().map(|&idx| pair(idx)).collect::<Result<Vec<_>, _>>()?
        };

        let before = records.len();
        records.extend(clipped.into_iter().flatten());
        let hits = records.len() - before;
        if hits == 0 {
            tracing::warn!(key = %area.key, "study area does not overlap any population polygon");
        }
        tracing::debug!(key = %area.key, candidates = candidates.len(), hits, "intersected study area");
    }

    stats.intersecting = records.len();
    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{MultiPolygon, Rect, coord};
    use polars::prelude::Column;

    use super::{intersect, PopulationIndex};
    use crate::{
        estimate::dissolve::StudyAreaPolygon,
        layer::{FeatureKey, FeatureLayer},
    };

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
    }

    fn blocks(shapes: Vec<MultiPolygon<f64>>, pops: Vec<i64>) -> FeatureLayer {
        let features = shapes.into_iter().enumerate()
            .map(|(i, shape)| (FeatureKey::new((i + 1).to_string()), shape))
            .collect();
        FeatureLayer::from_polygons("blocks", "OBJECTID", features, vec![Column::new("POP".into(), pops)]).unwrap()
    }

    fn study(shape: MultiPolygon<f64>) -> Vec<StudyAreaPolygon> {
        vec![StudyAreaPolygon { key: FeatureKey::from("1"), shape }]
    }

    #[test]
    fn half_overlap_yields_half_area() {
        let layer = blocks(vec![rect(0.5, 0.0, 1.5, 1.0)], vec![1000]);
        let index = PopulationIndex::from_layer(&layer, "POP").unwrap();

        let (records, stats) = intersect(&study(rect(0.0, 0.0, 1.0, 1.0)), &index, false).unwrap();
        assert_eq!(stats.candidates, 1);
        assert_eq!(records.len(), 1);
        assert_relative_eq!(records[0].intersection_area, 0.5, epsilon = 1e-9);
        assert_relative_eq!(records[0].source_area, 1.0, epsilon = 1e-12);
        assert_eq!(records[0].population, 1000);
        assert_eq!(records[0].population_id.as_str(), "1");
    }

    #[test]
    fn touching_and_disjoint_pairs_are_excluded() {
        let layer = blocks(
            vec![rect(1.0, 0.0, 2.0, 1.0), rect(5.0, 5.0, 6.0, 6.0), rect(0.0, 0.0, 0.5, 0.5)],
            vec![10, 20, 30],
        );
        let index = PopulationIndex::from_layer(&layer, "POP").unwrap();

        let (records, stats) = intersect(&study(rect(0.0, 0.0, 1.0, 1.0)), &index, false).unwrap();
        // The edge-sharing block is a bounding-box candidate but has no overlap area.
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.intersecting, 1);
        assert_eq!(records[0].population_id.as_str(), "3");
    }

    #[test]
    fn parallel_matches_sequential() {
        let shapes = (0..20)
            .map(|i| rect(i as f64 * 0.5, 0.0, i as f64 * 0.5 + 0.5, 1.0))
            .collect::<Vec<_>>();
        let layer = blocks(shapes, (0..20).collect());
        let index = PopulationIndex::from_layer(&layer, "POP").unwrap();
        let areas = study(rect(0.25, 0.25, 7.75, 0.75));

        let (sequential, _) = intersect(&areas, &index, false).unwrap();
        let (parallel, _) = intersect(&areas, &index, true).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 16);
    }
}
