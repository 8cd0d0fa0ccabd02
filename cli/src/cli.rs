use std::path::PathBuf;

use popest::{estimate::KeyColumnRule, LayerSelector};

/// Population estimation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "popest", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Estimate the population inside each study area
    Estimate(EstimateArgs),

    /// List the layers of the default population source
    Layers(SourceArgs),
}

/// Renaming rule for the study-area key column.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum KeyRule {
    /// Rename to studyAreaID only when a dissolve field is used
    WhenDissolved,
    Always,
    Never,
}

impl From<KeyRule> for KeyColumnRule {
    fn from(rule: KeyRule) -> Self {
        match rule {
            KeyRule::WhenDissolved => KeyColumnRule::WhenDissolved,
            KeyRule::Always => KeyColumnRule::Always,
            KeyRule::Never => KeyColumnRule::Never,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Directory of population layer files used instead of the feature service
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub default_dir: Option<PathBuf>,

    /// Feature service URL of the default population source
    #[arg(long)]
    pub service_url: Option<String>,

    /// Default layer to use: name:<layer> or field:<field>
    #[arg(long)]
    pub selector: Option<LayerSelector>,

    /// WKID of the study area's coordinate system, sent to the feature service
    #[arg(long)]
    pub spatial_reference: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct EstimateArgs {
    /// Study-area polygon layer (.geojson, .json or .shp)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub study_area: Option<PathBuf>,

    /// Output table (.csv or .json)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Study-area field to dissolve by (at most one)
    #[arg(short, long)]
    pub dissolve: Option<String>,

    /// Population polygon layer; requires --population-field
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub population_layer: Option<PathBuf>,

    /// Integer population field of --population-layer
    #[arg(long)]
    pub population_field: Option<String>,

    /// Also write the per-pair tabulation table
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub tabulation: Option<PathBuf>,

    /// Also write the dissolved study areas with their totals as GeoJSON
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub geojson: Option<PathBuf>,

    /// Round totals to whole persons
    #[arg(long)]
    pub round: bool,

    /// Clip candidate pairs in parallel
    #[arg(long)]
    pub parallel: bool,

    /// When to rename the key column to studyAreaID
    #[arg(long, value_enum)]
    pub key_rule: Option<KeyRule>,

    #[command(flatten)]
    pub source: SourceArgs,
}
