use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use geo::Rect;

use crate::{
    estimate::ResultTable,
    layer::{FeatureLayer, LayerInfo, LayerSelector},
    store::FeatureStore,
};

/// Simple in-memory store. Input layers are keyed by path; persisted tables are
/// kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    inputs: HashMap<PathBuf, FeatureLayer>,
    group: Vec<FeatureLayer>,
    selector: Option<LayerSelector>,
    outputs: HashMap<PathBuf, ResultTable>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }

    /// Register a layer under `path`.
    pub fn with_input(mut self, path: impl Into<PathBuf>, layer: FeatureLayer) -> Self {
        self.inputs.insert(path.into(), layer);
        self
    }

    /// Use `layers` as the default population group.
    pub fn with_group(mut self, layers: Vec<FeatureLayer>, selector: LayerSelector) -> Self {
        self.group = layers;
        self.selector = Some(selector);
        self
    }

    /// Table persisted at `path`, if any.
    pub fn output(&self, path: &Path) -> Option<&ResultTable> { self.outputs.get(path) }

    #[inline] pub fn outputs(&self) -> usize { self.outputs.len() }
}

impl FeatureStore for MemStore {
    fn load_layer(&self, path: &Path) -> Result<FeatureLayer> {
        self.inputs.get(path).cloned()
            .ok_or_else(|| anyhow!("[store::memory] missing layer: {}", path.display()))
    }

    fn describe_default_layers(&self) -> Result<Vec<LayerInfo>> {
        Ok(self.group.iter()
            .map(|layer| LayerInfo { name: layer.name().to_string(), fields: layer.fields() })
            .collect())
    }

    fn load_default_layer(&self, extent: Option<Rect<f64>>) -> Result<FeatureLayer> {
        let selector = self.selector.as_ref()
            .ok_or_else(|| anyhow!("[store::memory] No default population group configured"))?;
        let layer = &self.group[selector.select(&self.describe_default_layers()?)?];
        match extent {
            Some(extent) => layer.within(&extent),
            None => Ok(layer.clone()),
        }
    }

    fn persist_output(&mut self, table: &ResultTable, path: &Path) -> Result<()> {
        self.outputs.insert(path.to_path_buf(), table.clone());
        Ok(())
    }
}
