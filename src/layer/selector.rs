use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Name and schema of one layer in a layer group (a service or a directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    pub fields: Vec<String>,
}

/// Picks one layer out of a group by a declared predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSelector {
    /// Layer name, case-insensitive. Also matches the last path segment of nested
    /// names such as `USA_BLOCK_GROUPS//Blocks`.
    Name(String),
    /// First layer whose schema has this field.
    HasField(String),
}

impl LayerSelector {
    pub fn matches(&self, layer: &LayerInfo) -> bool {
        match self {
            LayerSelector::Name(name) => {
                let leaf = layer.name.rsplit('/').next().unwrap_or(&layer.name);
                layer.name.eq_ignore_ascii_case(name) || leaf.eq_ignore_ascii_case(name)
            }
            LayerSelector::HasField(field) => layer.fields.iter().any(|f| f == field),
        }
    }

    /// Index of the first matching layer.
    pub fn select(&self, layers: &[LayerInfo]) -> Result<usize, EstimateError> {
        let mut matching = layers.iter().enumerate().filter(|(_, layer)| self.matches(layer));
        let (idx, chosen) = matching.next()
            .ok_or_else(|| EstimateError::LayerNotFound { selector: self.to_string() })?;

        let others = matching.count();
        if others > 0 {
            tracing::warn!(selector = %self, layer = %chosen.name, others, "several layers match, using the first");
        }
        Ok(idx)
    }
}

impl fmt::Display for LayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSelector::Name(name) => write!(f, "name:{name}"),
            LayerSelector::HasField(field) => write!(f, "field:{field}"),
        }
    }
}

impl FromStr for LayerSelector {
    type Err = String;

    /// Parse `name:<layer>` or `field:<field>`. A bare value is a layer name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("name", name)) if !name.is_empty() => Ok(LayerSelector::Name(name.to_string())),
            Some(("field", field)) if !field.is_empty() => Ok(LayerSelector::HasField(field.to_string())),
            Some((prefix, _)) => Err(format!("unknown or empty selector {prefix:?}, expected name:<layer> or field:<field>")),
            None if !s.is_empty() => Ok(LayerSelector::Name(s.to_string())),
            None => Err("empty layer selector".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerInfo, LayerSelector};
    use crate::error::EstimateError;

    fn group() -> Vec<LayerInfo> {
        vec![
            LayerInfo { name: "States".into(), fields: vec!["OBJECTID".into(), "NAME".into()] },
            LayerInfo { name: "USA_BLOCK_GROUPS//Blocks".into(), fields: vec!["OBJECTID".into(), "P0010001".into()] },
            LayerInfo { name: "Tracts".into(), fields: vec!["OBJECTID".into(), "P0010001".into()] },
        ]
    }

    #[test]
    fn selects_by_nested_name() {
        assert_eq!(LayerSelector::Name("blocks".into()).select(&group()).unwrap(), 1);
    }

    #[test]
    fn selects_first_layer_with_field() {
        assert_eq!(LayerSelector::HasField("P0010001".into()).select(&group()).unwrap(), 1);
    }

    #[test]
    fn no_match_is_an_error() {
        let err = LayerSelector::Name("Counties".into()).select(&group()).unwrap_err();
        assert!(matches!(err, EstimateError::LayerNotFound { .. }));
    }

    #[test]
    fn parses_and_displays() {
        let sel: LayerSelector = "field:P0010001".parse().unwrap();
        assert_eq!(sel, LayerSelector::HasField("P0010001".into()));
        assert_eq!(sel.to_string(), "field:P0010001");
        assert_eq!("Blocks".parse::<LayerSelector>().unwrap(), LayerSelector::Name("Blocks".into()));
        assert!("field:".parse::<LayerSelector>().is_err());
        assert!("".parse::<LayerSelector>().is_err());
    }
}
