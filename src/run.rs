//! One complete run: configuration in, persisted result table out.

use anyhow::{Context, Result};

use crate::{
    config::EstimateConfig,
    estimate::{estimate, validate_study, Estimate},
    io::{self, TabulationColumns},
    store::{DiskStore, FeatureStore},
};

/// Build the store for `config`: a local group directory when configured, else the
/// feature service (with the `download` feature), else local files only.
pub fn open_store(config: &EstimateConfig) -> Result<Box<dyn FeatureStore>> {
    let source = &config.default_source;
    match &source.directory {
        Some(dir) => Ok(Box::new(DiskStore::with_group(dir, source.selector.clone()))),
        None => service_store(config),
    }
}

#[cfg(feature = "download")]
fn service_store(config: &EstimateConfig) -> Result<Box<dyn FeatureStore>> {
    let source = &config.default_source;
    let store = crate::store::ServiceStore::new(
        source.url.as_str(), source.selector.clone(), std::time::Duration::from_secs(source.timeout_secs),
    )?
    .with_out_fields(vec![io::geojson::OBJECT_ID_FIELD.to_string(), source.population_field.clone()])
    .with_page_size(source.page_size)
    .with_spatial_reference(config.spatial_reference());
    Ok(Box::new(store))
}

#[cfg(not(feature = "download"))]
fn service_store(config: &EstimateConfig) -> Result<Box<dyn FeatureStore>> {
    tracing::warn!(url = %config.default_source.url, "built without the download feature; a population layer must be supplied");
    Ok(Box::new(DiskStore::new()))
}

/// Validate `config`, load both layers, estimate and persist the result table
/// (plus the optional tabulation and GeoJSON exports).
///
/// Nothing is written unless the estimate succeeds.
pub fn run(config: &EstimateConfig, store: &mut dyn FeatureStore) -> Result<Estimate> {
    let params = config.validate()?;
    let study_path = config.study_area()?;
    let output = config.output()?;

    let study = store.load_layer(study_path)
        .with_context(|| format!("[run] Failed to load study area {}", study_path.display()))?;
    // Reject a bad study area before any population data is fetched.
    validate_study(&study, &params)?;

    let population = match &config.population_layer {
        Some(path) => store.load_layer(path)
            .with_context(|| format!("[run] Failed to load population layer {}", path.display()))?,
        None => store.load_default_layer(study.extent())
            .context("[run] Failed to load the default population layer")?,
    };

    let result = estimate(&study, &population, &params)?;

    store.persist_output(&result.table, output)
        .with_context(|| format!("[run] Failed to write {}", output.display()))?;

    if let Some(path) = &config.tabulation {
        let columns = TabulationColumns {
            zone: result.table.key_column().to_string(),
            class: population.id_field().to_string(),
            population: params.population_field.clone(),
        };
        io::write_tabulation(&result.contributions, &columns, path)?;
    }
    if let Some(path) = &config.geojson {
        io::write_estimates_geojson(&result, path)?;
    }

    tracing::info!(output = %output.display(), "{}", result.report);
    Ok(result)
}
