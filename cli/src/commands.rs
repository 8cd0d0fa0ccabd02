pub mod estimate;
pub mod layers;

use anyhow::Result;
use popest::EstimateConfig;

use crate::cli::{Cli, SourceArgs};

/// The `--config` file if given, else defaults.
pub(crate) fn load_config(cli: &Cli) -> Result<EstimateConfig> {
    match &cli.config {
        Some(path) => EstimateConfig::load(path),
        None => Ok(EstimateConfig::default()),
    }
}

/// Apply default-source flags on top of the configuration.
pub(crate) fn apply_source(config: &mut EstimateConfig, args: &SourceArgs) {
    let source = &mut config.default_source;
    if let Some(dir) = &args.default_dir { source.directory = Some(dir.clone()) }
    if let Some(url) = &args.service_url { source.url = url.clone() }
    if let Some(selector) = &args.selector { source.selector = selector.clone() }
    if let Some(wkid) = args.spatial_reference { source.spatial_reference = Some(wkid) }
}
