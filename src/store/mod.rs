//! Where layers come from and where results go.
//!
//! The estimator itself only sees in-memory layers; a [`FeatureStore`] resolves the
//! user's input paths, the default population layer and the output destination.

mod disk;
mod memory;
#[cfg(feature = "download")]
mod service;

use std::path::Path;

use anyhow::Result;
use geo::Rect;

use crate::{estimate::ResultTable, layer::{FeatureLayer, LayerInfo}};

pub use disk::DiskStore;
pub use memory::MemStore;
#[cfg(feature = "download")]
pub use service::ServiceStore;

/// Source of input layers and sink for result tables.
pub trait FeatureStore {
    /// Load a user-supplied layer.
    fn load_layer(&self, path: &Path) -> Result<FeatureLayer>;

    /// Name and schema of every layer in the default population group.
    fn describe_default_layers(&self) -> Result<Vec<LayerInfo>>;

    /// Load the default population layer. With an `extent`, only features whose
    /// bounding box intersects it need to be returned.
    fn load_default_layer(&self, extent: Option<Rect<f64>>) -> Result<FeatureLayer>;

    /// Write the result table. Either the whole table lands at `path` or nothing does.
    fn persist_output(&mut self, table: &ResultTable, path: &Path) -> Result<()>;
}
