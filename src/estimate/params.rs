use serde::{Deserialize, Serialize};

use crate::error::{EstimateError, FieldRole};

/// Population attribute of the default census-block layer (2020 total population).
pub const DEFAULT_POPULATION_FIELD: &str = "P0010001";

/// When the grouping column of the output is renamed to `key_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyColumnRule {
    /// Only when a dissolve field was supplied; otherwise keep the native identifier name.
    #[default]
    WhenDissolved,
    Always,
    Never,
}

/// Column names of the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNaming {
    pub sum_column: String,
    pub key_column: String,
    pub rule: KeyColumnRule,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            sum_column: "popTotal".to_string(),
            key_column: "studyAreaID".to_string(),
            rule: KeyColumnRule::default(),
        }
    }
}

impl OutputNaming {
    /// Resolve the grouping column name. `native` is the field the keys came from: the
    /// dissolve field if one was used, else the study area's identifier field.
    pub fn key_column_for(&self, dissolved: bool, native: &str) -> String {
        let rename = match self.rule {
            KeyColumnRule::WhenDissolved => dissolved,
            KeyColumnRule::Always => true,
            KeyColumnRule::Never => false,
        };
        if rename { self.key_column.clone() } else { native.to_string() }
    }
}

/// Parameters of a single estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateParams {
    /// Study-area field to dissolve by. At most one.
    pub dissolve_field: Option<String>,
    /// Integer population attribute of the population layer.
    pub population_field: String,
    pub naming: OutputNaming,
    /// Round totals to whole persons.
    pub round: bool,
    /// Clip candidate pairs on the rayon thread pool.
    pub parallel: bool,
}

impl EstimateParams {
    pub fn new(population_field: impl Into<String>) -> Self {
        Self {
            dissolve_field: None,
            population_field: population_field.into(),
            naming: OutputNaming::default(),
            round: false,
            parallel: false,
        }
    }

    pub fn with_dissolve_field(mut self, field: impl Into<String>) -> Self {
        self.dissolve_field = Some(field.into());
        self
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn rounded(mut self, round: bool) -> Self {
        self.round = round;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Parse a user field parameter that may name at most one field. Blank means none;
/// a `;` or `,` separated list is rejected.
pub fn single_field(role: FieldRole, raw: Option<&str>) -> Result<Option<String>, EstimateError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else { return Ok(None) };

    if raw.contains([';', ',']) {
        return Err(EstimateError::InvalidKey { role, given: raw.to_string() })
    }
    Ok(Some(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{single_field, KeyColumnRule, OutputNaming};
    use crate::error::{EstimateError, FieldRole};

    #[test]
    fn single_field_accepts_one_name() {
        assert_eq!(single_field(FieldRole::Dissolve, Some(" CITY ")).unwrap(), Some("CITY".to_string()));
        assert_eq!(single_field(FieldRole::Dissolve, Some("   ")).unwrap(), None);
        assert_eq!(single_field(FieldRole::Dissolve, None).unwrap(), None);
    }

    #[test]
    fn single_field_rejects_lists() {
        for given in ["CITY;COUNTY", "CITY,COUNTY"] {
            let err = single_field(FieldRole::Population, Some(given)).unwrap_err();
            assert!(matches!(err, EstimateError::InvalidKey { role: FieldRole::Population, .. }));
        }
    }

    #[test]
    fn key_column_rules() {
        let mut naming = OutputNaming::default();
        assert_eq!(naming.key_column_for(true, "CITY"), "studyAreaID");
        assert_eq!(naming.key_column_for(false, "FID"), "FID");

        naming.rule = KeyColumnRule::Always;
        assert_eq!(naming.key_column_for(false, "FID"), "studyAreaID");

        naming.rule = KeyColumnRule::Never;
        assert_eq!(naming.key_column_for(true, "CITY"), "CITY");
    }
}
