use std::fmt;

use anyhow::{ensure, Result};
use geo::{MultiPolygon, Rect};
use polars::{frame::DataFrame, prelude::{Column, IdxCa, IdxSize, NewChunkedArray}};

use crate::{error::EstimateError, geom::Geometries, layer::FeatureKey};

/// Geometry type of a layer, as declared by its features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Polygon,
    Point,
    Multipoint,
    Polyline,
    Mixed,
    /// No feature carries a geometry.
    Unknown,
}

impl GeometryKind {
    /// Combine the kinds of two features of the same layer.
    pub fn merge(self, other: GeometryKind) -> GeometryKind {
        match (self, other) {
            (GeometryKind::Unknown, kind) | (kind, GeometryKind::Unknown) => kind,
            (a, b) if a == b => a,
            _ => GeometryKind::Mixed,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Polygon => "polygon",
            GeometryKind::Point => "point",
            GeometryKind::Multipoint => "multipoint",
            GeometryKind::Polyline => "polyline",
            GeometryKind::Mixed => "mixed geometry",
            GeometryKind::Unknown => "no geometry",
        };
        f.write_str(name)
    }
}

/// An in-memory feature layer: one shape, one identifier and one attribute row per feature.
/// Non-polygonal features keep an empty shape so that indices stay aligned.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    name: String,
    kind: GeometryKind,
    id_field: String,
    ids: Vec<FeatureKey>,
    geoms: Geometries,
    data: DataFrame,
}

impl FeatureLayer {
    /// Assemble a layer. `columns` may be empty; otherwise every column must have one
    /// value per feature.
    pub fn new(
        name: impl Into<String>,
        kind: GeometryKind,
        id_field: impl Into<String>,
        ids: Vec<FeatureKey>,
        shapes: Vec<MultiPolygon<f64>>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        let name = name.into();
        ensure!(ids.len() == shapes.len(),
            "[layer] {name}: {} identifiers for {} shapes", ids.len(), shapes.len());

        let data = DataFrame::new(columns)?;
        ensure!(data.width() == 0 || data.height() == ids.len(),
            "[layer] {name}: attribute table has {} rows for {} features", data.height(), ids.len());

        Ok(Self {
            name,
            kind,
            id_field: id_field.into(),
            ids,
            geoms: Geometries::new(shapes),
            data,
        })
    }

    /// Build a polygon layer from (identifier, shape) pairs.
    pub fn from_polygons(
        name: impl Into<String>,
        id_field: impl Into<String>,
        features: Vec<(FeatureKey, MultiPolygon<f64>)>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        let kind = if features.is_empty() { GeometryKind::Unknown } else { GeometryKind::Polygon };
        let (ids, shapes) = features.into_iter().unzip();
        Self::new(name, kind, id_field, ids, shapes, columns)
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn kind(&self) -> GeometryKind { self.kind }

    /// Name of the field the native identifiers come from (e.g. "FID", "OBJECTID").
    #[inline] pub fn id_field(&self) -> &str { &self.id_field }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[FeatureKey] { &self.ids }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Names of the attribute fields.
    pub fn fields(&self) -> Vec<String> {
        self.data.get_column_names().into_iter().map(|name| name.to_string()).collect()
    }

    /// Look up an attribute column by name.
    pub fn column(&self, field: &str) -> Result<&Column, EstimateError> {
        self.data.column(field).map_err(|_| EstimateError::FieldNotFound {
            layer: self.name.clone(),
            field: field.to_string(),
        })
    }

    /// Bounding rectangle of all features.
    #[inline] pub fn extent(&self) -> Option<Rect<f64>> { self.geoms.bounds() }

    /// Keep only the features whose bounding box intersects `extent`.
    pub fn within(&self, extent: &Rect<f64>) -> Result<FeatureLayer> {
        let keep = self.geoms.candidates(extent);
        let rows = IdxCa::from_vec("idx".into(), keep.iter().map(|&i| i as IdxSize).collect());
        let data = if self.data.width() == 0 { DataFrame::empty() } else { self.data.take(&rows)? };

        Ok(Self {
            name: self.name.clone(),
            kind: self.kind,
            id_field: self.id_field.clone(),
            ids: keep.iter().map(|&i| self.ids[i].clone()).collect(),
            geoms: Geometries::new(keep.iter().map(|&i| self.shapes()[i].clone()).collect()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use geo::{BoundingRect, MultiPolygon, Rect, coord};
    use polars::prelude::Column;

    use super::{FeatureLayer, GeometryKind};
    use crate::{error::EstimateError, layer::FeatureKey};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon()])
    }

    #[test]
    fn merge_kinds() {
        assert_eq!(GeometryKind::Unknown.merge(GeometryKind::Polygon), GeometryKind::Polygon);
        assert_eq!(GeometryKind::Polygon.merge(GeometryKind::Polygon), GeometryKind::Polygon);
        assert_eq!(GeometryKind::Polygon.merge(GeometryKind::Point), GeometryKind::Mixed);
    }

    #[test]
    fn rejects_mismatched_attribute_rows() {
        let result = FeatureLayer::from_polygons(
            "blocks",
            "OBJECTID",
            vec![(FeatureKey::from("1"), unit_square())],
            vec![Column::new("POP".into(), vec![1i64, 2])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_column_is_field_not_found() {
        let layer = FeatureLayer::from_polygons(
            "blocks",
            "OBJECTID",
            vec![(FeatureKey::from("1"), unit_square())],
            vec![Column::new("POP".into(), vec![10i64])],
        ).unwrap();

        assert_eq!(layer.fields(), vec!["POP".to_string()]);
        assert!(layer.column("POP").is_ok());
        assert!(matches!(
            layer.column("P0010001"),
            Err(EstimateError::FieldNotFound { field, .. }) if field == "P0010001"
        ));
    }

    #[test]
    fn within_keeps_features_near_extent() {
        let far = MultiPolygon(vec![Rect::new(coord! { x: 9.0, y: 9.0 }, coord! { x: 10.0, y: 10.0 }).to_polygon()]);
        let layer = FeatureLayer::from_polygons(
            "blocks",
            "OBJECTID",
            vec![(FeatureKey::from("1"), unit_square()), (FeatureKey::from("2"), far)],
            vec![Column::new("POP".into(), vec![10i64, 20])],
        ).unwrap();

        let near = layer.within(&Rect::new(coord! { x: 0.5, y: 0.5 }, coord! { x: 2.0, y: 2.0 })).unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near.ids()[0].as_str(), "1");
        assert_eq!(near.column("POP").unwrap().i64().unwrap().get(0), Some(10));
        assert_eq!(near.extent(), layer.shapes()[0].bounding_rect());
    }
}
