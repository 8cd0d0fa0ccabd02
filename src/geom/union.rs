use geo::{BooleanOps, MultiPolygon};

/// Union a set of MultiPolygons by pairwise merging in a balanced tree, so that
/// each boolean op works on inputs of similar size.
pub(crate) fn union_all(shapes: &[&MultiPolygon<f64>]) -> MultiPolygon<f64> {
    match shapes {
        [] => MultiPolygon(vec![]),
        [single] => (*single).clone(),
        [a, b] => a.union(*b),
        _ => {
            let (left, right) = shapes.split_at(shapes.len() / 2);
            union_all(left).union(&union_all(right))
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{Area, MultiPolygon, Rect, coord};

    use super::union_all;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
    }

    #[test]
    fn union_of_adjacent_strips_is_one_polygon() {
        let strips = (0..5).map(|i| rect(i as f64, 0.0, i as f64 + 1.0, 1.0)).collect::<Vec<_>>();
        let merged = union_all(&strips.iter().collect::<Vec<_>>());
        assert_eq!(merged.0.len(), 1);
        assert_relative_eq!(merged.unsigned_area(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn overlapping_area_is_counted_once() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(1.0, 1.0, 3.0, 3.0);
        assert_relative_eq!(union_all(&[&a, &b]).unsigned_area(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn disjoint_parts_stay_separate() {
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(5.0, 5.0, 6.0, 6.0);
        let c = rect(10.0, 0.0, 11.0, 1.0);
        let merged = union_all(&[&a, &b, &c]);
        assert_eq!(merged.0.len(), 3);
        assert_relative_eq!(merged.unsigned_area(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_input_gives_empty_shape() {
        assert!(union_all(&[]).0.is_empty());
    }
}
