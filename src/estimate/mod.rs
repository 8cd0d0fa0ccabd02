mod aggregate;
mod dissolve;
mod intersect;
mod params;
mod pipeline;
mod tabulate;
mod validate;

pub use aggregate::{aggregate, ResultRow, ResultTable};
pub use dissolve::{dissolve, StudyAreaPolygon};
pub use intersect::{intersect, IntersectStats, IntersectionRecord, PopulationIndex, PopulationPolygon};
pub use params::{single_field, EstimateParams, KeyColumnRule, OutputNaming, DEFAULT_POPULATION_FIELD};
pub use pipeline::{estimate, Estimate, EstimateReport, Stage};
pub use tabulate::{tabulate, Contribution};
pub use validate::validate_study;
