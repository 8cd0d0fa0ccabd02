use std::fmt;

use crate::{
    error::{EstimateError, FieldRole},
    estimate::{
        aggregate::{aggregate, ResultTable},
        dissolve::{dissolve, StudyAreaPolygon},
        intersect::{intersect, PopulationIndex},
        params::{single_field, EstimateParams},
        tabulate::{tabulate, Contribution},
        validate,
    },
    layer::{FeatureKey, FeatureLayer},
};

/// Progress of one run. Stages only move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Dissolved,
    Intersected,
    Tabulated,
    Aggregated,
    Done,
}

impl Stage {
    /// The stage that follows `self`. `Done` is terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::Idle => Stage::Dissolved,
            Stage::Dissolved => Stage::Intersected,
            Stage::Intersected => Stage::Tabulated,
            Stage::Tabulated => Stage::Aggregated,
            Stage::Aggregated | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Dissolved => "dissolved",
            Stage::Intersected => "intersected",
            Stage::Tabulated => "tabulated",
            Stage::Aggregated => "aggregated",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary counters of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateReport {
    pub study_areas: usize,
    pub population_features: usize,
    pub candidate_pairs: usize,
    pub intersecting_pairs: usize,
    /// Grand total over all study areas.
    pub total: f64,
}

impl fmt::Display for EstimateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
            "{} study areas, {} population features, {} candidate pairs, {} intersecting, total {:.2}",
            self.study_areas, self.population_features, self.candidate_pairs, self.intersecting_pairs, self.total,
        )
    }
}

/// Everything a run produces: the result table plus the intermediate products that
/// can be exported alongside it.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub table: ResultTable,
    pub study_areas: Vec<StudyAreaPolygon>,
    pub contributions: Vec<Contribution>,
    pub report: EstimateReport,
}

/// Estimate the population of every study area in `study` from the population
/// polygons in `population`.
///
/// All inputs are validated before any geometry is touched; any failure aborts the
/// run without a partial result.
pub fn estimate(
    study: &FeatureLayer,
    population: &FeatureLayer,
    params: &EstimateParams,
) -> Result<Estimate, EstimateError> {
    validate::require_polygons(study, "study area")?;
    validate::require_polygons(population, "population layer")?;

    let dissolve_field = single_field(FieldRole::Dissolve, params.dissolve_field.as_deref())?;
    let population_field = single_field(FieldRole::Population, Some(&params.population_field))?
        .ok_or_else(|| EstimateError::MissingField("population field must not be blank".to_string()))?;

    let keys = validate::study_area_keys(study, dissolve_field.as_deref())?;
    let populations = validate::population_values(population, &population_field)?;
    let index = PopulationIndex::with_values(population, populations);

    let mut stage = Stage::Idle;
    tracing::info!(
        study = study.name(), features = study.len(),
        population = population.name(), polygons = index.len(),
        field = %population_field, "inputs validated",
    );

    // Study areas without a dissolve field are a single feature, keyed by its own id.
    let implicit_key = study.ids().first().cloned().unwrap_or_else(|| FeatureKey::new(""));
    let study_areas = match &keys {
        Some(keys) => dissolve(study.shapes().iter().zip(keys.iter().cloned().map(Some)), &implicit_key)?,
        None => dissolve(study.shapes().iter().map(|shape| (shape, None)), &implicit_key)?,
    };
    stage = stage.next();
    tracing::info!(%stage, study_areas = study_areas.len());

    let (records, stats) = intersect(&study_areas, &index, params.parallel)?;
    stage = stage.next();
    tracing::info!(%stage, candidates = stats.candidates, intersecting = stats.intersecting);

    let contributions = tabulate(records)?;
    stage = stage.next();
    tracing::info!(%stage, contributions = contributions.len());

    let native = dissolve_field.as_deref().unwrap_or(study.id_field());
    let key_column = params.naming.key_column_for(dissolve_field.is_some(), native);
    let area_keys = study_areas.iter().map(|area| area.key.clone()).collect::<Vec<_>>();
    let mut table = aggregate(&area_keys, &contributions, key_column, params.naming.sum_column.as_str());
    if params.round {
        table = table.round();
    }
    stage = stage.next();
    tracing::info!(%stage, rows = table.len(), key_column = table.key_column());

    let report = EstimateReport {
        study_areas: study_areas.len(),
        population_features: index.len(),
        candidate_pairs: stats.candidates,
        intersecting_pairs: stats.intersecting,
        total: table.total(),
    };
    stage = stage.next();
    tracing::info!(%stage, "{report}");

    Ok(Estimate { table, study_areas, contributions, report })
}
