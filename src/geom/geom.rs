use geo::{Area, BoundingRect, Coord, MultiPolygon, Rect};
use rstar::{RTree, AABB};

use super::BoundingBox;

/// An indexed collection of MultiPolygons, one per feature of a layer.
/// Empty shapes are kept (so indices line up with features) but never returned by queries.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons
    pub fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| BoundingBox::of_shape(i, shape))
                    .collect()
            ),
            shapes,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn get(&self, idx: usize) -> Option<&MultiPolygon<f64>> { self.shapes.get(idx) }

    /// Planar area of the shape at `idx`.
    #[inline]
    pub fn area(&self, idx: usize) -> f64 {
        self.shapes.get(idx).map_or(0.0, |shape| shape.unsigned_area())
    }

    /// Indices of every shape whose bounding box intersects `rect`, in ascending order.
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut found = self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|bbox| bbox.idx())
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                }
            ))
    }
}
