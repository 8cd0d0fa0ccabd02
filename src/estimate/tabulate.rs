use crate::{error::EstimateError, estimate::intersect::IntersectionRecord};

/// An intersection weighted by the share of its population polygon it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub record: IntersectionRecord,
    /// Share of the population polygon inside the study area, in percent.
    pub percentage: f64,
    /// `population * intersection_area / source_area`.
    pub weighted: f64,
}

/// Weight every record by its coverage fraction.
pub fn tabulate(records: Vec<IntersectionRecord>) -> Result<Vec<Contribution>, EstimateError> {
    records.into_iter()
        .map(|record| {
            if record.source_area <= 0.0 || !record.source_area.is_finite() {
                return Err(EstimateError::DegenerateGeometry { feature: record.population_id.to_string() })
            }
            let fraction = record.intersection_area / record.source_area;
            Ok(Contribution {
                percentage: fraction * 100.0,
                weighted: record.population as f64 * fraction,
                record,
            })
        })
        .collect()
}
