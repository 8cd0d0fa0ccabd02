use polars::prelude::DataType;

use crate::{
    error::{EstimateError, FieldRole},
    estimate::{single_field, EstimateParams},
    layer::{FeatureKey, FeatureLayer, GeometryKind},
};

/// Require a non-empty polygon layer. `role` names the layer in messages.
pub(crate) fn require_polygons(layer: &FeatureLayer, role: &str) -> Result<(), EstimateError> {
    if layer.is_empty() {
        return Err(EstimateError::EmptyLayer { layer: format!("{role} {}", layer.name()) })
    }
    if layer.kind() != GeometryKind::Polygon {
        return Err(EstimateError::InputType {
            layer: format!("{role} {}", layer.name()),
            found: layer.kind().to_string(),
        })
    }
    Ok(())
}

/// Check the study-area layer on its own: polygon geometry, a usable extent and a
/// dissolve field that exists when several features must be grouped.
pub fn validate_study(study: &FeatureLayer, params: &EstimateParams) -> Result<(), EstimateError> {
    require_polygons(study, "study area")?;
    let dissolve_field = single_field(FieldRole::Dissolve, params.dissolve_field.as_deref())?;
    study_area_keys(study, dissolve_field.as_deref())?;
    if study.extent().is_none() {
        return Err(EstimateError::Geometry {
            feature: study.name().to_string(),
            reason: "study area has no extent".to_string(),
        })
    }
    Ok(())
}

/// Dissolve key of every study-area feature, or None when no dissolve field is used.
/// Null keys form their own group under the empty key.
pub(crate) fn study_area_keys(
    layer: &FeatureLayer,
    dissolve_field: Option<&str>,
) -> Result<Option<Vec<FeatureKey>>, EstimateError> {
    let Some(field) = dissolve_field else {
        if layer.len() > 1 {
            return Err(EstimateError::MultiFeatureWithoutKey { count: layer.len() })
        }
        return Ok(None)
    };

    let column = layer.column(field)?.cast(&DataType::String)?;
    let mut nulls = 0;
    let keys = column.str()?.into_iter()
        .map(|value| {
            if value.is_none() { nulls += 1 }
            FeatureKey::new(value.unwrap_or_default())
        })
        .collect::<Vec<_>>();

    if nulls > 0 {
        tracing::warn!(field, nulls, "null dissolve keys are grouped together under an empty key");
    }
    Ok(Some(keys))
}

/// Read the population attribute as non-negative whole numbers. Integer columns and
/// float columns holding whole numbers are accepted; nulls, fractions, negatives and
/// non-numeric columns are rejected.
pub(crate) fn population_values(layer: &FeatureLayer, field: &str) -> Result<Vec<u64>, EstimateError> {
    let column = layer.column(field)?;
    let reject = |idx: usize, value: String| EstimateError::PopulationValue {
        field: field.to_string(),
        feature: layer.ids().get(idx).map_or_else(|| idx.to_string(), |id| id.to_string()),
        value,
    };

    let dtype = column.dtype().clone();
    if dtype.is_integer() {
        let ints = column.cast(&DataType::Int64)?;
        ints.i64()?.into_iter().enumerate()
            .map(|(idx, value)| match value {
                Some(n) if n >= 0 => Ok(n as u64),
                Some(n) => Err(reject(idx, n.to_string())),
                None => Err(reject(idx, "null".to_string())),
            })
            .collect()
    } else if dtype.is_float() {
        let floats = column.cast(&DataType::Float64)?;
        floats.f64()?.into_iter().enumerate()
            .map(|(idx, value)| match value {
                Some(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 => Ok(x as u64),
                Some(x) => Err(reject(idx, x.to_string())),
                None => Err(reject(idx, "null".to_string())),
            })
            .collect()
    } else {
        Err(reject(0, format!("{dtype} column")))
    }
}
