#![doc = "popest public API: area-weighted population estimates for study-area polygons"]
mod error;
mod geom;

pub mod config;
pub mod estimate;
pub mod io;
pub mod layer;
pub mod run;
pub mod store;

#[doc(inline)]
pub use error::{EstimateError, FieldRole};

#[doc(inline)]
pub use geom::Geometries;

#[doc(inline)]
pub use config::{DefaultSource, EstimateConfig};

#[doc(inline)]
pub use estimate::{estimate, validate_study, Estimate, EstimateParams, EstimateReport, ResultTable};

#[doc(inline)]
pub use layer::{FeatureKey, FeatureLayer, GeometryKind, LayerSelector};

#[doc(inline)]
pub use run::{open_store, run};

#[doc(inline)]
pub use store::{DiskStore, FeatureStore, MemStore};
