//! Writing result and tabulation tables as CSV or JSON.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{Column, CsvWriter, JsonFormat, JsonWriter},
};

use crate::{
    estimate::{Contribution, ResultTable},
    io::PendingWrite,
};

/// On-disk table format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    Json,
}

impl TableFormat {
    /// `.json` selects JSON; anything else is written as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TableFormat::Json,
            _ => TableFormat::Csv,
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => f.write_str("csv"),
            TableFormat::Json => f.write_str("json"),
        }
    }
}

/// Write `df` to `path` atomically in the format implied by its extension.
pub fn write_dataframe(df: &mut DataFrame, path: &Path) -> Result<()> {
    let format = TableFormat::from_path(path);
    let mut out = PendingWrite::open(path)?;
    match format {
        TableFormat::Csv => CsvWriter::new(&mut out).finish(df),
        TableFormat::Json => JsonWriter::new(&mut out).with_json_format(JsonFormat::Json).finish(df),
    }
    .with_context(|| format!("[io::table] Failed to write {format} to {}", path.display()))?;
    out.commit()
}

/// Write the result table: the key column and the total column.
pub fn write_table(table: &ResultTable, path: &Path) -> Result<()> {
    let mut df = table.to_dataframe().context("[io::table] Failed to build result table")?;
    write_dataframe(&mut df, path)?;
    tracing::info!(path = %path.display(), rows = table.len(), "wrote result table");
    Ok(())
}

/// Column names of the tabulation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabulationColumns {
    /// Study-area key.
    pub zone: String,
    /// Population polygon identifier.
    pub class: String,
    /// Population attribute.
    pub population: String,
}

/// Write one row per intersecting pair: zone key, class id, `AREA`, `PERCENTAGE`,
/// population and its weighted contribution. A class column named like the zone
/// column gets a `_1` suffix.
pub fn write_tabulation(contributions: &[Contribution], columns: &TabulationColumns, path: &Path) -> Result<()> {
    let class = if columns.class == columns.zone { format!("{}_1", columns.class) } else { columns.class.clone() };
    let mut df = DataFrame::new(vec![
        Column::new(columns.zone.as_str().into(),
            contributions.iter().map(|c| c.record.area_key.as_str()).collect::<Vec<_>>()),
        Column::new(class.as_str().into(),
            contributions.iter().map(|c| c.record.population_id.as_str()).collect::<Vec<_>>()),
        Column::new("AREA".into(),
            contributions.iter().map(|c| c.record.intersection_area).collect::<Vec<_>>()),
        Column::new("PERCENTAGE".into(),
            contributions.iter().map(|c| c.percentage).collect::<Vec<_>>()),
        Column::new(columns.population.as_str().into(),
            contributions.iter().map(|c| c.record.population).collect::<Vec<_>>()),
        Column::new("contribution".into(),
            contributions.iter().map(|c| c.weighted).collect::<Vec<_>>()),
    ]).context("[io::table] Failed to build tabulation table")?;

    write_dataframe(&mut df, path)?;
    tracing::info!(path = %path.display(), rows = contributions.len(), "wrote tabulation table");
    Ok(())
}
