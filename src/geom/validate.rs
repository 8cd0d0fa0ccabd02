use std::fmt;

use geo::{LineString, MultiPolygon};

/// Structural defect found in a polygonal shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShapeProblem {
    Empty,
    TooFewCoords { ring: usize, count: usize },
    NonFinite { ring: usize },
    FlatExterior { polygon: usize },
}

impl fmt::Display for ShapeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeProblem::Empty => f.write_str("empty geometry"),
            ShapeProblem::TooFewCoords { ring, count } =>
                write!(f, "ring {ring} has {count} coordinates, at least 4 required"),
            ShapeProblem::NonFinite { ring } => write!(f, "ring {ring} has a non-finite coordinate"),
            ShapeProblem::FlatExterior { polygon } =>
                write!(f, "exterior ring of polygon {polygon} encloses no area"),
        }
    }
}

/// Get the signed area of a closed ring (negative for clockwise)
fn signed_area(ring: &LineString<f64>) -> f64 {
    ring.0.windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum::<f64>() / 2.0
}

/// Check that a ring is finite and has at least four coordinates.
/// `geo` closes rings on construction, so closure is not rechecked here.
fn check_ring(ring: &LineString<f64>, index: usize) -> Result<(), ShapeProblem> {
    let count = ring.0.len();
    if count < 4 { return Err(ShapeProblem::TooFewCoords { ring: index, count }) }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(ShapeProblem::NonFinite { ring: index })
    }
    Ok(())
}

/// Check that `shape` is a usable polygon/multipolygon. Rings are numbered across the
/// whole shape (exterior first, then holes, per polygon).
pub(crate) fn check_shape(shape: &MultiPolygon<f64>) -> Result<(), ShapeProblem> {
    if shape.0.is_empty() { return Err(ShapeProblem::Empty) }

    let mut ring = 0;
    for (i, polygon) in shape.0.iter().enumerate() {
        check_ring(polygon.exterior(), ring)?;
        if signed_area(polygon.exterior()) == 0.0 {
            return Err(ShapeProblem::FlatExterior { polygon: i })
        }
        ring += 1;
        for hole in polygon.interiors() {
            check_ring(hole, ring)?;
            ring += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use geo::{Coord, LineString, MultiPolygon, Polygon};

    use super::{check_shape, ShapeProblem};

    fn ring(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString(coords.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    fn raw_polygon(exterior: LineString<f64>) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(exterior, vec![])])
    }

    #[test]
    fn accepts_closed_square() {
        let shape = raw_polygon(ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]));
        assert_eq!(check_shape(&shape), Ok(()));
    }

    #[test]
    fn rejects_empty_and_short_rings() {
        assert_eq!(check_shape(&MultiPolygon(vec![])), Err(ShapeProblem::Empty));

        let shape = raw_polygon(ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]));
        assert_eq!(check_shape(&shape), Err(ShapeProblem::TooFewCoords { ring: 0, count: 3 }));
    }

    #[test]
    fn rejects_nan_and_flat_rings() {
        let shape = raw_polygon(ring(&[(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0), (0.0, 0.0)]));
        assert_eq!(check_shape(&shape), Err(ShapeProblem::NonFinite { ring: 0 }));

        let shape = raw_polygon(ring(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.0, 0.0)]));
        assert_eq!(check_shape(&shape), Err(ShapeProblem::FlatExterior { polygon: 0 }));
    }
}
