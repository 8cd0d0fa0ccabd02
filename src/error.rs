//! Error kinds raised while validating inputs or running the estimate.

use std::fmt;

use polars::error::PolarsError;
use thiserror::Error;

/// Which user-supplied field a key error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Dissolve,
    Population,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Dissolve => f.write_str("dissolve"),
            FieldRole::Population => f.write_str("population"),
        }
    }
}

/// Errors that abort an estimate. Every variant is fatal; the pipeline never
/// produces partial results.
#[derive(Debug, Error)]
pub enum EstimateError {
    /// Study-area or population input does not hold polygon geometry.
    #[error("{layer} must be of type polygon (found {found})")]
    InputType { layer: String, found: String },

    /// Several study-area features but nothing to group them by.
    #[error("study area has {count} features, dissolve field required")]
    MultiFeatureWithoutKey { count: usize },

    /// More than one dissolve or population field was given.
    #[error("a maximum of one {role} field is allowed (got {given:?})")]
    InvalidKey { role: FieldRole, given: String },

    /// Population layer and population field must be supplied together.
    #[error("{0}")]
    MissingField(String),

    /// A named field does not exist on the layer.
    #[error("{layer} has no field named {field:?}")]
    FieldNotFound { layer: String, field: String },

    /// Population attribute holds a null, fractional or negative value.
    #[error("population field {field:?} contains null or non-integer values (feature {feature}: {value})")]
    PopulationValue { field: String, feature: String, value: String },

    /// A required layer has no features.
    #[error("{layer} has no features")]
    EmptyLayer { layer: String },

    /// Malformed polygon.
    #[error("invalid geometry for feature {feature}: {reason}")]
    Geometry { feature: String, reason: String },

    /// Polygon with zero area where an area is needed as a divisor or result.
    #[error("zero-area geometry for feature {feature}")]
    DegenerateGeometry { feature: String },

    /// Union of a dissolve group failed.
    #[error("dissolve failed for key {key:?}: {reason}")]
    DissolveFailure { key: String, reason: String },

    /// No layer in a group matched the selector.
    #[error("no layer matches selector {selector}")]
    LayerNotFound { selector: String },

    /// Attribute table failure.
    #[error("attribute table error: {0}")]
    Table(#[from] PolarsError),
}
