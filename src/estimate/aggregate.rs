use ahash::AHashMap;
use polars::{error::PolarsResult, frame::DataFrame, prelude::Column};

use crate::{estimate::tabulate::Contribution, layer::FeatureKey};

/// Neumaier compensated sum, so that totals barely depend on summation order.
#[derive(Debug, Clone, Copy, Default)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }

    fn value(&self) -> f64 { self.sum + self.compensation }
}

/// Estimated population of one study area.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub key: FeatureKey,
    pub pop_total: f64,
}

/// Final output: one row per study-area key, plus the resolved column names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    key_column: String,
    sum_column: String,
    rows: Vec<ResultRow>,
    rounded: bool,
}

impl ResultTable {
    pub fn new(key_column: impl Into<String>, sum_column: impl Into<String>, rows: Vec<ResultRow>) -> Self {
        Self { key_column: key_column.into(), sum_column: sum_column.into(), rows, rounded: false }
    }

    #[inline] pub fn key_column(&self) -> &str { &self.key_column }

    #[inline] pub fn sum_column(&self) -> &str { &self.sum_column }

    #[inline] pub fn rows(&self) -> &[ResultRow] { &self.rows }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    #[inline] pub fn is_rounded(&self) -> bool { self.rounded }

    /// Total for one study area.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.rows.iter().find(|row| row.key.as_str() == key).map(|row| row.pop_total)
    }

    /// Sum over all study areas.
    pub fn total(&self) -> f64 { self.rows.iter().map(|row| row.pop_total).sum() }

    /// Round every total to whole persons.
    pub fn round(mut self) -> Self {
        for row in &mut self.rows { row.pop_total = row.pop_total.round() }
        self.rounded = true;
        self
    }

    /// Two-column table: key as text, total as Float64 (Int64 once rounded).
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let keys = self.rows.iter().map(|row| row.key.as_str()).collect::<Vec<_>>();
        let totals = if self.rounded {
            Column::new(self.sum_column.as_str().into(),
                self.rows.iter().map(|row| row.pop_total as i64).collect::<Vec<_>>())
        } else {
            Column::new(self.sum_column.as_str().into(),
                self.rows.iter().map(|row| row.pop_total).collect::<Vec<_>>())
        };
        DataFrame::new(vec![Column::new(self.key_column.as_str().into(), keys), totals])
    }
}

/// Sum contributions per study-area key. `keys` fixes the output rows and their order,
/// so study areas without any contribution still get a zero row; contributions for
/// keys not listed are appended in first-seen order.
pub fn aggregate(
    keys: &[FeatureKey],
    contributions: &[Contribution],
    key_column: impl Into<String>,
    sum_column: impl Into<String>,
) -> ResultTable {
    let mut order = keys.to_vec();
    let mut slots: AHashMap<FeatureKey, usize> = keys.iter().cloned()
        .enumerate()
        .map(|(i, key)| (key, i))
        .collect();
    let mut sums = vec![CompensatedSum::default(); keys.len()];

    for contribution in contributions {
        let key = &contribution.record.area_key;
        let slot = match slots.get(key) {
            Some(&slot) => slot,
            None => {
                order.push(key.clone());
                sums.push(CompensatedSum::default());
                slots.insert(key.clone(), order.len() - 1);
                order.len() - 1
            }
        };
        sums[slot].add(contribution.weighted);
    }

    let rows = order.into_iter().zip(sums)
        .map(|(key, sum)| ResultRow { key, pop_total: sum.value() })
        .collect();
    ResultTable::new(key_column, sum_column, rows)
}
