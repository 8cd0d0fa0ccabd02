use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use geo::Rect;

use crate::{
    estimate::ResultTable,
    io,
    layer::{FeatureLayer, LayerInfo, LayerSelector},
    store::FeatureStore,
};

/// Local files. The default population group is a directory of layer files
/// (`.geojson`, `.json`, `.shp`), each named by its file stem.
#[derive(Debug, Clone, Default)]
pub struct DiskStore {
    group: Option<PathBuf>,
    selector: Option<LayerSelector>,
}

impl DiskStore {
    /// A store without a default population group.
    pub fn new() -> Self { Self::default() }

    /// Use the layers in `dir` as the default population group.
    pub fn with_group(dir: impl Into<PathBuf>, selector: LayerSelector) -> Self {
        Self { group: Some(dir.into()), selector: Some(selector) }
    }

    /// Layer files of the group, sorted by path.
    fn group_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.group.as_ref()
            .ok_or_else(|| anyhow!("[store::disk] No default population directory configured"))?;
        let mut files = fs::read_dir(dir)
            .with_context(|| format!("[store::disk] Failed to list {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
                matches!(ext.as_deref(), Some("geojson" | "json" | "shp"))
            })
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}

impl FeatureStore for DiskStore {
    fn load_layer(&self, path: &Path) -> Result<FeatureLayer> {
        io::read_layer(path)
    }

    fn describe_default_layers(&self) -> Result<Vec<LayerInfo>> {
        self.group_files()?.iter()
            .map(|path| Ok(LayerInfo { name: stem(path), fields: io::read_layer(path)?.fields() }))
            .collect()
    }

    fn load_default_layer(&self, extent: Option<Rect<f64>>) -> Result<FeatureLayer> {
        let selector = self.selector.as_ref()
            .ok_or_else(|| anyhow!("[store::disk] No default layer selector configured"))?;
        let files = self.group_files()?;

        let layer = match selector {
            // Names can be matched without opening every file.
            LayerSelector::Name(_) => {
                let infos = files.iter().map(|path| LayerInfo { name: stem(path), fields: vec![] }).collect::<Vec<_>>();
                io::read_layer(&files[selector.select(&infos)?])?
            }
            // Fields need every file parsed; keep the parsed layers so the chosen one is read once.
            LayerSelector::HasField(_) => {
                let mut layers = files.iter().map(|path| io::read_layer(path)).collect::<Result<Vec<_>>>()?;
                let infos = files.iter().zip(&layers)
                    .map(|(path, layer)| LayerInfo { name: stem(path), fields: layer.fields() })
                    .collect::<Vec<_>>();
                layers.swap_remove(selector.select(&infos)?)
            }
        };

        tracing::info!(layer = layer.name(), features = layer.len(), "loaded default population layer");
        match extent {
            Some(extent) => layer.within(&extent),
            None => Ok(layer),
        }
    }

    fn persist_output(&mut self, table: &ResultTable, path: &Path) -> Result<()> {
        io::write_table(table, path)
    }
}
