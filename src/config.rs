//! Run configuration: every command-line parameter plus the default population source,
//! loadable from a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::{EstimateError, FieldRole},
    estimate::{single_field, EstimateParams, OutputNaming, DEFAULT_POPULATION_FIELD},
    layer::LayerSelector,
};

/// WKID of WGS 84, the coordinate system of GeoJSON.
pub const WGS84_WKID: u32 = 4326;

/// Nationwide 2020 census blocks with the redistricting population counts.
pub const DEFAULT_SERVICE_URL: &str =
    "https://services.arcgis.com/P3ePLMYs2RVChkJx/arcgis/rest/services/USA_Census_2020_Redistricting_Blocks/FeatureServer";

/// Where the population layer comes from when the user does not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultSource {
    /// Feature service holding the population layer group.
    pub url: String,
    /// Local directory of layer files used instead of the service.
    pub directory: Option<PathBuf>,
    /// Which layer of the group holds the population polygons.
    pub selector: LayerSelector,
    pub population_field: String,
    /// Features requested per service page.
    pub page_size: usize,
    /// WKID of the study area's coordinates, passed to the service. GeoJSON study
    /// areas default to WGS 84.
    pub spatial_reference: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for DefaultSource {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            directory: None,
            selector: LayerSelector::Name("Blocks".to_string()),
            population_field: DEFAULT_POPULATION_FIELD.to_string(),
            page_size: 2000,
            spatial_reference: None,
            timeout_secs: 120,
        }
    }
}

/// One estimate run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimateConfig {
    /// Study-area polygon layer.
    pub study_area: Option<PathBuf>,
    pub dissolve_field: Option<String>,
    /// Population polygon layer; the default source is used when absent.
    pub population_layer: Option<PathBuf>,
    /// Required together with `population_layer`.
    pub population_field: Option<String>,
    /// Result table (`.csv` or `.json`).
    pub output: Option<PathBuf>,
    /// Per-pair tabulation table.
    pub tabulation: Option<PathBuf>,
    /// Dissolved study areas with their totals.
    pub geojson: Option<PathBuf>,
    pub naming: OutputNaming,
    pub round: bool,
    pub parallel: bool,
    pub default_source: DefaultSource,
}

impl EstimateConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Failed to parse {}", path.display()))
    }

    pub fn study_area(&self) -> Result<&Path> {
        self.study_area.as_deref().context("[config] A study area layer is required")
    }

    pub fn output(&self) -> Result<&Path> {
        self.output.as_deref().context("[config] An output table path is required")
    }

    /// Coordinate system of the study area as sent to the feature service: the
    /// configured WKID, else WGS 84 for GeoJSON study areas, else the service's own.
    pub fn spatial_reference(&self) -> Option<u32> {
        self.default_source.spatial_reference.or_else(|| {
            let ext = self.study_area.as_deref()?.extension()?.to_str()?.to_ascii_lowercase();
            matches!(ext.as_str(), "geojson" | "json").then_some(WGS84_WKID)
        })
    }

    /// Check the field parameters and resolve them into estimate parameters.
    /// A population layer and its population field must be given together.
    pub fn params(&self) -> Result<EstimateParams, EstimateError> {
        let dissolve_field = single_field(FieldRole::Dissolve, self.dissolve_field.as_deref())?;
        let population_field = single_field(FieldRole::Population, self.population_field.as_deref())?;

        let population_field = match (&self.population_layer, population_field) {
            (Some(_), Some(field)) => field,
            (None, None) => self.default_source.population_field.clone(),
            (Some(layer), None) => return Err(EstimateError::MissingField(format!(
                "population layer {} given without a population field", layer.display(),
            ))),
            (None, Some(field)) => return Err(EstimateError::MissingField(format!(
                "population field {field:?} given without a population layer",
            ))),
        };

        let mut params = EstimateParams::new(population_field)
            .with_naming(self.naming.clone())
            .rounded(self.round)
            .parallel(self.parallel);
        params.dissolve_field = dissolve_field;
        Ok(params)
    }

    /// Everything that can be checked before reading any layer.
    pub fn validate(&self) -> Result<EstimateParams> {
        self.study_area()?;
        self.output()?;
        Ok(self.params()?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::EstimateConfig;
    use crate::{error::EstimateError, estimate::KeyColumnRule, layer::LayerSelector};

    #[test]
    fn defaults_use_census_blocks() {
        let config = EstimateConfig::default();
        let params = config.params().unwrap();
        assert_eq!(params.population_field, "P0010001");
        assert_eq!(config.default_source.selector, LayerSelector::Name("Blocks".into()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn population_layer_and_field_go_together() {
        let config = EstimateConfig { population_layer: Some(PathBuf::from("tracts.shp")), ..Default::default() };
        assert!(matches!(config.params(), Err(EstimateError::MissingField(_))));

        let config = EstimateConfig { population_field: Some("TOTPOP".into()), ..Default::default() };
        assert!(matches!(config.params(), Err(EstimateError::MissingField(_))));

        let config = EstimateConfig {
            population_layer: Some(PathBuf::from("tracts.shp")),
            population_field: Some("TOTPOP".into()),
            ..Default::default()
        };
        assert_eq!(config.params().unwrap().population_field, "TOTPOP");
    }

    #[test]
    fn multiple_dissolve_fields_are_rejected() {
        let config = EstimateConfig { dissolve_field: Some("CITY;COUNTY".into()), ..Default::default() };
        assert!(matches!(config.params(), Err(EstimateError::InvalidKey { .. })));
    }

    #[test]
    fn parses_partial_json() {
        let config: EstimateConfig = serde_json::from_str(r#"{
            "study_area": "kyle.geojson",
            "output": "out/kyle.csv",
            "naming": { "rule": "always" },
            "default_source": { "selector": { "has_field": "P0010001" }, "spatial_reference": 4269 }
        }"#).unwrap();

        assert_eq!(config.naming.rule, KeyColumnRule::Always);
        assert_eq!(config.naming.sum_column, "popTotal");
        assert_eq!(config.default_source.selector, LayerSelector::HasField("P0010001".into()));
        assert_eq!(config.default_source.spatial_reference, Some(4269));
        assert_eq!(config.default_source.page_size, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn geojson_study_areas_are_wgs84() {
        let mut config = EstimateConfig { study_area: Some(PathBuf::from("kyle.GeoJSON")), ..Default::default() };
        assert_eq!(config.spatial_reference(), Some(4326));

        config.default_source.spatial_reference = Some(2277);
        assert_eq!(config.spatial_reference(), Some(2277));

        let config = EstimateConfig { study_area: Some(PathBuf::from("kyle.shp")), ..Default::default() };
        assert_eq!(config.spatial_reference(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<EstimateConfig>(r#"{ "studyArea": "x" }"#).is_err());
    }
}
