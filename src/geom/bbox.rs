use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{RTreeObject, AABB};

/// A bounding box in an R-tree, associated with a MultiPolygon by index.
#[derive(Debug, Clone)]
pub(super) struct BoundingBox {
    idx: usize, // Index of corresponding MultiPolygon in shapes
    bbox: Rect<f64>,
}

impl BoundingBox {
    /// Box the shape at `idx`, or None for an empty shape.
    pub(super) fn of_shape(idx: usize, shape: &MultiPolygon<f64>) -> Option<Self> {
        shape.bounding_rect().map(|bbox| Self { idx, bbox })
    }

    /// Get the index of the corresponding MultiPolygon.
    pub(super) fn idx(&self) -> usize { self.idx }
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}
