//! ESRI Shapefile reading (`.shp` geometry + `.dbf` attributes).

use std::path::Path;

use anyhow::{Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{
    dbase::{FieldValue, Record},
    PolygonRing, Reader, Shape,
};

use crate::{
    io::attrs::{AttrValue, AttributeTable},
    layer::{FeatureKey, FeatureLayer, GeometryKind},
};

/// Shapefiles have no stored identifier; features are numbered from 0 by position.
pub(crate) const FEATURE_ID_FIELD: &str = "FID";

/// Read a shapefile and its attribute table into a layer named after the file stem.
pub fn read_shapefile(path: &Path) -> Result<FeatureLayer> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut kind = GeometryKind::Unknown;
    let mut ids = Vec::new();
    let mut shapes = Vec::new();
    let mut table = AttributeTable::default();

    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp] Error reading shape+record #{i} of {}", path.display()))?;
        let (shape_kind, shape) = shape_to_multipolygon(shape);
        kind = kind.merge(shape_kind);
        ids.push(FeatureKey::new(i.to_string()));
        shapes.push(shape);
        table.push_row(record_values(record));
    }

    let name = path.file_stem().map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
    tracing::debug!(layer = %name, features = ids.len(), %kind, "read shapefile");
    FeatureLayer::new(name, kind, FEATURE_ID_FIELD, ids, shapes, table.finish())
}

/// Attribute values of one record, in field-name order.
fn record_values(record: Record) -> Vec<(String, AttrValue)> {
    let mut values = record.into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Character(Some(s)) => AttrValue::Text(s.trim().to_string()),
                FieldValue::Memo(s) => AttrValue::Text(s),
                FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => numeric(n),
                FieldValue::Float(Some(n)) => numeric(n as f64),
                FieldValue::Integer(n) => AttrValue::Int(n as i64),
                FieldValue::Logical(Some(b)) => AttrValue::Bool(b),
                _ => AttrValue::Null,
            };
            (name, value)
        })
        .collect::<Vec<_>>();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    values
}

/// dBASE stores every number as decimal text; whole values are read back as integers.
fn numeric(n: f64) -> AttrValue {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        AttrValue::Int(n as i64)
    } else {
        AttrValue::Float(n)
    }
}

/// Group rings into polygons: each outer ring with the inner rings that follow it.
fn rings_to_multipolygon<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut polys = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        let line = LineString(ring.points().iter().map(&xy).collect());
        match ring {
            PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.replace(line) {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
            }
            PolygonRing::Inner(_) => holes.push(line),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }
    MultiPolygon(polys)
}

/// Convert a shapefile shape to a multipolygon. Non-polygon shapes keep an empty
/// geometry and report their kind.
fn shape_to_multipolygon(shape: Shape) -> (GeometryKind, MultiPolygon<f64>) {
    let empty = || MultiPolygon(vec![]);
    match shape {
        Shape::Polygon(p) => (GeometryKind::Polygon, rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::PolygonM(p) => (GeometryKind::Polygon, rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::PolygonZ(p) => (GeometryKind::Polygon, rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::Point(_) | Shape::PointM(_) | Shape::PointZ(_) => (GeometryKind::Point, empty()),
        Shape::Multipoint(_) | Shape::MultipointM(_) | Shape::MultipointZ(_) => (GeometryKind::Multipoint, empty()),
        Shape::Polyline(_) | Shape::PolylineM(_) | Shape::PolylineZ(_) => (GeometryKind::Polyline, empty()),
        Shape::Multipatch(_) => (GeometryKind::Mixed, empty()),
        Shape::NullShape => (GeometryKind::Unknown, empty()),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{Area, MultiPolygon, Rect, coord};
    use shapefile::{
        dbase::{FieldValue, Record, TableWriterBuilder},
        Point, Polygon, PolygonRing, Shape, Writer,
    };

    use super::{numeric, read_shapefile, shape_to_multipolygon};
    use crate::{
        estimate::{estimate, EstimateParams},
        io::attrs::AttrValue,
        layer::{FeatureKey, FeatureLayer, GeometryKind},
    };

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point { x, y }).collect()
    }

    #[test]
    fn outer_rings_start_new_polygons() {
        let polygon = Polygon::with_rings(vec![
            PolygonRing::Outer(ring(&[(0., 0.), (0., 4.), (4., 4.), (4., 0.), (0., 0.)])),
            PolygonRing::Inner(ring(&[(1., 1.), (2., 1.), (2., 2.), (1., 2.), (1., 1.)])),
            PolygonRing::Outer(ring(&[(10., 10.), (10., 11.), (11., 11.), (11., 10.), (10., 10.)])),
        ]);
        let (kind, shape) = shape_to_multipolygon(Shape::Polygon(polygon));

        assert_eq!(kind, GeometryKind::Polygon);
        assert_eq!(shape.0.len(), 2);
        assert_eq!(shape.0[0].interiors().len(), 1);
        assert!((shape.unsigned_area() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn points_keep_their_kind() {
        let (kind, shape) = shape_to_multipolygon(Shape::Point(Point { x: 1.0, y: 2.0 }));
        assert_eq!(kind, GeometryKind::Point);
        assert!(shape.0.is_empty());
    }

    #[test]
    fn whole_numbers_read_as_integers() {
        assert_eq!(numeric(1250.0), AttrValue::Int(1250));
        assert_eq!(numeric(0.5), AttrValue::Float(0.5));
    }

    #[test]
    fn reads_shapes_and_records_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.shp");
        {
            let table = TableWriterBuilder::new()
                .add_numeric_field("POP".try_into().unwrap(), 10, 0)
                .add_character_field("NAME".try_into().unwrap(), 20);
            let mut writer = Writer::from_path(&path, table).unwrap();
            let block = Polygon::new(PolygonRing::Outer(ring(&[(0.5, 0.), (0.5, 1.), (1.5, 1.), (1.5, 0.), (0.5, 0.)])));
            let mut record = Record::default();
            record.insert("POP".to_string(), FieldValue::Numeric(Some(1000.0)));
            record.insert("NAME".to_string(), FieldValue::Character(Some("block 1000".to_string())));
            writer.write_shape_and_record(&block, &record).unwrap();
        }

        let layer = read_shapefile(&path).unwrap();
        assert_eq!(layer.name(), "blocks");
        assert_eq!(layer.kind(), GeometryKind::Polygon);
        assert_eq!(layer.id_field(), "FID");
        assert_eq!(layer.ids(), [FeatureKey::from("0")]);
        assert_eq!(layer.fields(), ["NAME", "POP"]);
        assert_eq!(layer.column("POP").unwrap().i64().unwrap().get(0), Some(1000));
        assert_eq!(layer.column("NAME").unwrap().str().unwrap().get(0), Some("block 1000"));

        let study = FeatureLayer::from_polygons(
            "city", "FID",
            vec![(FeatureKey::from("0"),
                MultiPolygon(vec![Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon()]))],
            vec![],
        ).unwrap();
        let result = estimate(&study, &layer, &EstimateParams::new("POP")).unwrap();
        assert_relative_eq!(result.table.total(), 500.0, epsilon = 1e-6);
    }
}
