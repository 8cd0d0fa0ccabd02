//! IO module for format-specific reading and writing operations.
//!
//! # Format Modules
//!
//! - `geojson` - GeoJSON FeatureCollections, for input layers and the study-area export
//! - `shp` - Shapefile format for input layers
//! - `table` - CSV / JSON result and tabulation tables
//! - `pending` - atomic replacement of output files

mod attrs;
pub(crate) mod geojson;
mod pending;
mod shp;
mod table;

use std::path::Path;

use anyhow::{bail, Result};

use crate::layer::FeatureLayer;

pub use geojson::{read_geojson, write_estimates_geojson};
pub use pending::PendingWrite;
pub use shp::read_shapefile;
pub use table::{write_dataframe, write_table, write_tabulation, TableFormat, TabulationColumns};

/// Read a feature layer, choosing the reader by file extension.
pub fn read_layer(path: &Path) -> Result<FeatureLayer> {
    let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("geojson" | "json") => read_geojson(path),
        Some("shp") => read_shapefile(path),
        _ => bail!("[io] Unsupported layer format: {} (expected .geojson, .json or .shp)", path.display()),
    }
}
