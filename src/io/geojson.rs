//! GeoJSON FeatureCollection reading and writing.

use std::{io::Write, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

use crate::{
    estimate::Estimate,
    io::{attrs::{AttrValue, AttributeTable}, PendingWrite},
    layer::{FeatureKey, FeatureLayer, GeometryKind},
};

/// Identifier property used by feature services, and by this reader when features carry no id.
pub(crate) const OBJECT_ID_FIELD: &str = "OBJECTID";

/// One parsed feature before it is assembled into a layer.
#[derive(Debug, Clone)]
pub(crate) struct RawFeature {
    pub id: Option<FeatureKey>,
    pub kind: GeometryKind,
    pub shape: MultiPolygon<f64>,
    pub properties: Map<String, Value>,
}

/// One parsed FeatureCollection document.
#[derive(Debug, Clone, Default)]
pub(crate) struct FeaturePage {
    pub features: Vec<RawFeature>,
    /// The server truncated the result and more pages follow.
    pub exceeded_transfer_limit: bool,
}

/// Read a GeoJSON file into a layer named after the file stem.
pub fn read_geojson(path: &Path) -> Result<FeatureLayer> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::geojson] Failed to read {}", path.display()))?;
    let name = path.file_stem().map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
    let page = parse_feature_page(&bytes)
        .with_context(|| format!("[io::geojson] Failed to parse {}", path.display()))?;
    layer_from_features(name, page.features)
}

/// Parse a FeatureCollection (or a single Feature).
pub(crate) fn parse_feature_page(bytes: &[u8]) -> Result<FeaturePage> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] Invalid JSON")?;
    if let Some(error) = value.get("error") {
        bail!("[io::geojson] Server returned an error: {error}");
    }

    let features = match value["type"].as_str() {
        Some("FeatureCollection") => value["features"].as_array()
            .ok_or_else(|| anyhow!("[io::geojson] FeatureCollection without a features array"))?
            .iter()
            .enumerate()
            .map(|(i, feature)| parse_feature(feature).with_context(|| format!("[io::geojson] feature #{i}")))
            .collect::<Result<Vec<_>>>()?,
        Some("Feature") => vec![parse_feature(&value)?],
        other => bail!("[io::geojson] Expected a FeatureCollection, found {other:?}"),
    };

    let exceeded_transfer_limit = value["exceededTransferLimit"].as_bool()
        .or_else(|| value["properties"]["exceededTransferLimit"].as_bool())
        .unwrap_or(false);

    Ok(FeaturePage { features, exceeded_transfer_limit })
}

fn parse_feature(feature: &Value) -> Result<RawFeature> {
    let id = match &feature["id"] {
        Value::String(s) => Some(FeatureKey::new(s.as_str())),
        Value::Number(n) => Some(FeatureKey::new(n.to_string())),
        _ => None,
    };
    let properties = feature["properties"].as_object().cloned().unwrap_or_default();
    let (kind, shape) = parse_geometry(&feature["geometry"])?;
    Ok(RawFeature { id, kind, shape, properties })
}

/// Polygonal geometries become shapes; every other type keeps an empty shape and is
/// only recorded through its kind.
fn parse_geometry(geometry: &Value) -> Result<(GeometryKind, MultiPolygon<f64>)> {
    if geometry.is_null() {
        return Ok((GeometryKind::Unknown, MultiPolygon(vec![])))
    }
    let coords = &geometry["coordinates"];
    match geometry["type"].as_str() {
        Some("Polygon") => Ok((GeometryKind::Polygon, MultiPolygon(vec![parse_polygon(coords)?]))),
        Some("MultiPolygon") => {
            let polygons = coords.as_array()
                .ok_or_else(|| anyhow!("MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?;
            Ok((GeometryKind::Polygon, MultiPolygon(polygons)))
        }
        Some("Point") => Ok((GeometryKind::Point, MultiPolygon(vec![]))),
        Some("MultiPoint") => Ok((GeometryKind::Multipoint, MultiPolygon(vec![]))),
        Some("LineString" | "MultiLineString") => Ok((GeometryKind::Polyline, MultiPolygon(vec![]))),
        Some("GeometryCollection") => Ok((GeometryKind::Mixed, MultiPolygon(vec![]))),
        other => bail!("unsupported geometry type {other:?}"),
    }
}

/// `[exterior, hole, hole, ...]`
fn parse_polygon(rings: &Value) -> Result<Polygon<f64>> {
    let rings = rings.as_array().ok_or_else(|| anyhow!("Polygon coordinates must be an array of rings"))?;
    let Some((exterior, holes)) = rings.split_first() else {
        bail!("Polygon has no exterior ring")
    };
    Ok(Polygon::new(
        parse_ring(exterior)?,
        holes.iter().map(parse_ring).collect::<Result<Vec<_>>>()?,
    ))
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
    let points = ring.as_array().ok_or_else(|| anyhow!("ring must be an array of positions"))?;
    points.iter()
        .map(|position| {
            let x = position[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
            let y = position[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString)
}

/// Assemble parsed features into a layer. Identifiers come from the `OBJECTID`
/// property when every feature has one, else from feature ids, else from 1-based
/// positions.
pub(crate) fn layer_from_features(name: impl Into<String>, features: Vec<RawFeature>) -> Result<FeatureLayer> {
    let name = name.into();
    let has_object_ids = !features.is_empty()
        && features.iter().all(|f| f.properties.get(OBJECT_ID_FIELD).is_some_and(|v| !v.is_null()));
    let has_feature_ids = !features.is_empty() && features.iter().all(|f| f.id.is_some());

    let id_field = if !has_object_ids && has_feature_ids { "id" } else { OBJECT_ID_FIELD };
    let mut kind = GeometryKind::Unknown;
    let mut ids = Vec::with_capacity(features.len());
    let mut shapes = Vec::with_capacity(features.len());
    let mut table = AttributeTable::default();

    for (i, feature) in features.into_iter().enumerate() {
        let object_id = feature.properties.get(OBJECT_ID_FIELD).filter(|_| has_object_ids);
        let id = match (object_id, feature.id.filter(|_| has_feature_ids)) {
            (Some(Value::String(s)), _) => FeatureKey::new(s.as_str()),
            (Some(other), _) => FeatureKey::new(other.to_string()),
            (None, Some(id)) => id,
            (None, None) => FeatureKey::new((i + 1).to_string()),
        };
        ids.push(id);
        kind = kind.merge(feature.kind);
        shapes.push(feature.shape);
        table.push_row(feature.properties.iter().map(|(key, value)| (key, AttrValue::from(value))));
    }

    tracing::debug!(layer = %name, features = ids.len(), %kind, id_field, "read GeoJSON features");
    FeatureLayer::new(name, kind, id_field, ids, shapes, table.finish())
}

fn multipolygon_coordinates(shape: &MultiPolygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| ls.coords().map(|c| json!([c.x, c.y])).collect::<Vec<_>>();
    Value::Array(shape.0.iter()
        .map(|polygon| {
            let mut rings = vec![ring(polygon.exterior())];
            rings.extend(polygon.interiors().iter().map(ring));
            json!(rings)
        })
        .collect())
}

/// Write the dissolved study areas with their estimated totals as a FeatureCollection.
pub fn write_estimates_geojson(estimate: &Estimate, path: &Path) -> Result<()> {
    let table = &estimate.table;
    // Result rows start with the study areas, in the same order.
    let features = estimate.study_areas.iter().zip(table.rows())
        .map(|(area, row)| {
            debug_assert_eq!(area.key, row.key);
            let total = if table.is_rounded() { json!(row.pop_total as i64) } else { json!(row.pop_total) };
            let mut properties = Map::new();
            properties.insert(table.key_column().to_string(), json!(area.key.as_str()));
            properties.insert(table.sum_column().to_string(), total);
            json!({
                "type": "Feature",
                "geometry": { "type": "MultiPolygon", "coordinates": multipolygon_coordinates(&area.shape) },
                "properties": properties,
            })
        })
        .collect::<Vec<_>>();

    let collection = json!({ "type": "FeatureCollection", "features": features });
    let mut out = PendingWrite::open(path)?;
    serde_json::to_writer(&mut out, &collection)
        .with_context(|| format!("[io::geojson] Failed to write {}", path.display()))?;
    out.flush()?;
    out.commit()
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Rect, coord};
    use polars::prelude::{Column, DataType};
    use serde_json::Value;

    use super::{layer_from_features, parse_feature_page, write_estimates_geojson};
    use crate::{
        estimate::{estimate, EstimateParams},
        layer::{FeatureKey, FeatureLayer, GeometryKind},
    };

    const BLOCKS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "id": 7,
              "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] },
              "properties": { "P0010001": 12, "GEOID": "480010001001000" } },
            { "type": "Feature", "id": 9,
              "geometry": { "type": "MultiPolygon", "coordinates": [
                  [[[2,0],[3,0],[3,1],[2,1],[2,0]], [[2.2,0.2],[2.4,0.2],[2.4,0.4],[2.2,0.2]]],
                  [[[5,5],[6,5],[6,6],[5,5]]]
              ] },
              "properties": { "P0010001": 0, "GEOID": "480010001001001" } }
        ],
        "properties": { "exceededTransferLimit": true }
    }"#;

    #[test]
    fn reads_polygons_ids_and_attributes() {
        let page = parse_feature_page(BLOCKS.as_bytes()).unwrap();
        assert!(page.exceeded_transfer_limit);

        let layer = layer_from_features("blocks", page.features).unwrap();
        assert_eq!(layer.kind(), GeometryKind::Polygon);
        assert_eq!(layer.id_field(), "id");
        assert_eq!(layer.ids()[1].as_str(), "9");
        assert_eq!(layer.shapes()[1].0.len(), 2);
        assert_eq!(layer.shapes()[1].0[0].interiors().len(), 1);
        assert_eq!(layer.column("P0010001").unwrap().dtype(), &DataType::Int64);
        assert_eq!(layer.column("GEOID").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn object_ids_take_precedence() {
        let doc = r#"{ "type": "FeatureCollection", "features": [
            { "type": "Feature", "id": "a", "geometry": null, "properties": { "OBJECTID": 5 } },
            { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0, 0] }, "properties": { "OBJECTID": 6 } }
        ] }"#;
        let layer = layer_from_features("pts", parse_feature_page(doc.as_bytes()).unwrap().features).unwrap();
        assert_eq!(layer.id_field(), "OBJECTID");
        assert_eq!(layer.ids()[0].as_str(), "5");
        assert_eq!(layer.kind(), GeometryKind::Point);
    }

    #[test]
    fn positional_ids_without_any_id() {
        let doc = r#"{ "type": "FeatureCollection", "features": [
            { "type": "Feature", "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] }, "properties": {} }
        ] }"#;
        let layer = layer_from_features("city", parse_feature_page(doc.as_bytes()).unwrap().features).unwrap();
        assert_eq!(layer.id_field(), "OBJECTID");
        assert_eq!(layer.ids()[0].as_str(), "1");
    }

    #[test]
    fn service_errors_are_reported() {
        let doc = r#"{ "error": { "code": 400, "message": "Invalid query parameters" } }"#;
        assert!(parse_feature_page(doc.as_bytes()).is_err());
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
    }

    #[test]
    fn exported_areas_carry_their_own_totals() {
        let study = FeatureLayer::from_polygons(
            "cities", "FID",
            vec![
                (FeatureKey::from("0"), rect(0.0, 0.0, 1.0, 1.0)),
                (FeatureKey::from("1"), rect(2.0, 0.0, 3.0, 1.0)),
                (FeatureKey::from("2"), rect(9.0, 9.0, 10.0, 10.0)),
            ],
            vec![Column::new("CITY".into(), vec!["Wimberley", "Buda", "Kyle"])],
        ).unwrap();
        let blocks = FeatureLayer::from_polygons(
            "blocks", "FID",
            vec![(FeatureKey::from("0"), rect(0.0, 0.0, 4.0, 1.0))],
            vec![Column::new("POP".into(), vec![400i64])],
        ).unwrap();
        let result = estimate(&study, &blocks, &EstimateParams::new("POP").with_dissolve_field("CITY").rounded(true))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.geojson");
        write_estimates_geojson(&result, &path).unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let totals = doc["features"].as_array().unwrap().iter()
            .map(|f| {
                let props = &f["properties"];
                (props["studyAreaID"].as_str().unwrap().to_string(), props["popTotal"].as_i64().unwrap())
            })
            .collect::<Vec<_>>();
        assert_eq!(totals, [("Buda".to_string(), 100), ("Kyle".to_string(), 0), ("Wimberley".to_string(), 100)]);
    }
}
