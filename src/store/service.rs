//! ArcGIS REST feature service as the default population group.

use std::{path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use geo::Rect;
use reqwest::{blocking::Client, redirect::Policy};
use serde::Deserialize;

use crate::{
    estimate::ResultTable,
    io::{self, geojson::{layer_from_features, parse_feature_page, OBJECT_ID_FIELD}},
    layer::{FeatureLayer, LayerInfo, LayerSelector},
    store::FeatureStore,
};

/// Upper bound on pages fetched for a single query.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct ServiceLayerRef {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceDescription {
    #[serde(default)]
    layers: Vec<ServiceLayerRef>,
}

#[derive(Debug, Deserialize)]
struct FieldDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpatialReference {
    wkid: Option<u32>,
    #[serde(rename = "latestWkid")]
    latest_wkid: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LayerExtent {
    #[serde(rename = "spatialReference")]
    spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Deserialize)]
struct LayerDescription {
    #[serde(default)]
    fields: Vec<FieldDescription>,
    #[serde(rename = "maxRecordCount")]
    max_record_count: Option<usize>,
    extent: Option<LayerExtent>,
}

impl LayerDescription {
    /// WKID the layer's geometry is stored in.
    fn wkid(&self) -> Option<u32> {
        let sr = self.extent.as_ref()?.spatial_reference.as_ref()?;
        sr.latest_wkid.or(sr.wkid)
    }
}

/// Remote population layers, queried page by page and restricted to the study
/// area's envelope. User layers and outputs stay on local disk.
#[derive(Debug, Clone)]
pub struct ServiceStore {
    url: String,
    selector: LayerSelector,
    out_fields: Vec<String>,
    page_size: usize,
    spatial_reference: Option<u32>,
    client: Client,
}

impl ServiceStore {
    pub fn new(url: impl Into<String>, selector: LayerSelector, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("popest/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::limited(10))
            .timeout(timeout)
            .build()
            .context("[store::service] Failed to build HTTP client")?;

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            selector,
            out_fields: vec![],
            page_size: 2000,
            spatial_reference: None,
            client,
        })
    }

    /// Attribute fields to request. Empty means all fields.
    pub fn with_out_fields(mut self, fields: Vec<String>) -> Self {
        self.out_fields = fields;
        self
    }

    /// Features per request; capped by the service's own maximum.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// WKID of the study area's coordinates, used for both the query envelope and the
    /// returned geometry.
    pub fn with_spatial_reference(mut self, wkid: Option<u32>) -> Self {
        self.spatial_reference = wkid;
        self
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let bytes = self.get_bytes(url, query)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("[store::service] GET {url} returned invalid JSON"))?;
        if let Some(error) = value.get("error") {
            bail!("[store::service] GET {url} failed: {error}");
        }
        serde_json::from_value(value).with_context(|| format!("[store::service] unexpected response from {url}"))
    }

    fn get_bytes(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let resp = self.client.get(url)
            .query(query)
            .send()
            .with_context(|| format!("[store::service] GET {url}"))?
            .error_for_status()
            .with_context(|| format!("[store::service] GET {url} returned error status"))?;
        Ok(resp.bytes().with_context(|| format!("[store::service] read body of {url}"))?.to_vec())
    }

    fn service_layers(&self) -> Result<Vec<ServiceLayerRef>> {
        let description: ServiceDescription = self.get_json(&self.url, &[("f", "json".to_string())])?;
        if description.layers.is_empty() {
            bail!("[store::service] {} lists no layers", self.url);
        }
        Ok(description.layers)
    }

    fn describe_layer(&self, id: u32) -> Result<LayerDescription> {
        self.get_json(&format!("{}/{id}", self.url), &[("f", "json".to_string())])
    }

    fn envelope_query(&self, extent: Option<&Rect<f64>>, offset: usize, count: usize) -> Vec<(&'static str, String)> {
        let out_fields = if self.out_fields.is_empty() { "*".to_string() } else { self.out_fields.join(",") };
        let mut query = vec![
            ("where", "1=1".to_string()),
            ("outFields", out_fields),
            ("returnGeometry", "true".to_string()),
            ("orderByFields", OBJECT_ID_FIELD.to_string()),
            ("resultOffset", offset.to_string()),
            ("resultRecordCount", count.to_string()),
            ("f", "geojson".to_string()),
        ];
        if let Some(extent) = extent {
            let (min, max) = (extent.min(), extent.max());
            query.push(("geometry", format!("{},{},{},{}", min.x, min.y, max.x, max.y)));
            query.push(("geometryType", "esriGeometryEnvelope".to_string()));
            query.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
        }
        if let Some(wkid) = self.spatial_reference {
            query.push(("inSR", wkid.to_string()));
            query.push(("outSR", wkid.to_string()));
        }
        query
    }
}

impl FeatureStore for ServiceStore {
    fn load_layer(&self, path: &Path) -> Result<FeatureLayer> {
        io::read_layer(path)
    }

    fn describe_default_layers(&self) -> Result<Vec<LayerInfo>> {
        self.service_layers()?.into_iter()
            .map(|layer| {
                let fields = self.describe_layer(layer.id)?.fields.into_iter().map(|f| f.name).collect();
                Ok(LayerInfo { name: layer.name, fields })
            })
            .collect()
    }

    fn load_default_layer(&self, extent: Option<Rect<f64>>) -> Result<FeatureLayer> {
        // The service layers are nationwide; an unrestricted query would page through all of it.
        let extent = extent.context("[store::service] A study area extent is required to query the service")?;
        let layers = self.service_layers()?;
        let idx = match &self.selector {
            LayerSelector::Name(_) => {
                let infos = layers.iter().map(|l| LayerInfo { name: l.name.clone(), fields: vec![] }).collect::<Vec<_>>();
                self.selector.select(&infos)?
            }
            LayerSelector::HasField(_) => self.selector.select(&self.describe_default_layers()?)?,
        };
        let layer = &layers[idx];
        let description = self.describe_layer(layer.id)?;
        match self.spatial_reference {
            Some(wkid) => tracing::info!(layer = %layer.name, service_wkid = ?description.wkid(), wkid,
                "querying in study area coordinates"),
            None => tracing::info!(layer = %layer.name, service_wkid = ?description.wkid(),
                "no spatial reference given, study area must be in the service's coordinates"),
        }
        let page_size = description.max_record_count.map_or(self.page_size, |max| self.page_size.min(max.max(1)));

        let query_url = format!("{}/{}/query", self.url, layer.id);
        let mut features = Vec::new();
        for page in 0..MAX_PAGES {
            let query = self.envelope_query(Some(&extent), features.len(), page_size);
            let bytes = self.get_bytes(&query_url, &query)?;
            let result = parse_feature_page(&bytes)
                .with_context(|| format!("[store::service] page {page} of {}", layer.name))?;
            let received = result.features.len();
            features.extend(result.features);
            tracing::debug!(layer = %layer.name, page, received, total = features.len(), "fetched page");

            if received == 0 || (!result.exceeded_transfer_limit && received < page_size) {
                let layer = layer_from_features(layer.name.clone(), features)?;
                tracing::info!(layer = layer.name(), features = layer.len(), "loaded default population layer");
                return Ok(layer)
            }
        }
        Err(anyhow!("[store::service] {} returned more than {MAX_PAGES} pages", layer.name))
    }

    fn persist_output(&mut self, table: &ResultTable, path: &Path) -> Result<()> {
        io::write_table(table, path)
    }
}
