//! Attribute values read from feature files, collected into typed polars columns.

use polars::prelude::Column;

/// One attribute value as found in a source file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Int(n) => Some(n.to_string()),
            AttrValue::Float(x) => Some(x.to_string()),
            AttrValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&serde_json::Value> for AttrValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => n.as_f64().map_or(AttrValue::Null, AttrValue::Float),
            },
            Value::String(s) => AttrValue::Text(s.clone()),
            other => AttrValue::Text(other.to_string()),
        }
    }
}

/// Narrowest column type that holds every non-null value seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Empty,
    Bool,
    Int,
    Float,
    Text,
}

impl Inferred {
    fn widen(self, value: &AttrValue) -> Inferred {
        let seen = match value {
            AttrValue::Null => return self,
            AttrValue::Bool(_) => Inferred::Bool,
            AttrValue::Int(_) => Inferred::Int,
            AttrValue::Float(_) => Inferred::Float,
            AttrValue::Text(_) => Inferred::Text,
        };
        match (self, seen) {
            (Inferred::Empty, seen) => seen,
            (a, b) if a == b => a,
            (Inferred::Int, Inferred::Float) | (Inferred::Float, Inferred::Int) => Inferred::Float,
            _ => Inferred::Text,
        }
    }
}

/// Accumulates the values of one field, one per feature, and infers its type.
#[derive(Debug, Clone)]
pub(crate) struct ColumnBuilder {
    name: String,
    values: Vec<AttrValue>,
    inferred: Inferred,
}

impl ColumnBuilder {
    /// A builder for a field first seen at feature `offset`; earlier features get null.
    pub fn new(name: impl Into<String>, offset: usize) -> Self {
        Self { name: name.into(), values: vec![AttrValue::Null; offset], inferred: Inferred::Empty }
    }

    pub fn push(&mut self, value: AttrValue) {
        self.inferred = self.inferred.widen(&value);
        self.values.push(value);
    }

    /// Pad with nulls up to `len` values.
    pub fn fill_to(&mut self, len: usize) {
        self.values.resize(len, AttrValue::Null);
    }

    #[inline] pub fn len(&self) -> usize { self.values.len() }

    pub fn finish(self) -> Column {
        let name = self.name.as_str().into();
        match self.inferred {
            Inferred::Bool => Column::new(name, self.values.iter()
                .map(|v| match v { AttrValue::Bool(b) => Some(*b), _ => None })
                .collect::<Vec<_>>()),
            Inferred::Int => Column::new(name, self.values.iter()
                .map(|v| match v { AttrValue::Int(n) => Some(*n), _ => None })
                .collect::<Vec<_>>()),
            Inferred::Float => Column::new(name, self.values.iter()
                .map(|v| match v {
                    AttrValue::Int(n) => Some(*n as f64),
                    AttrValue::Float(x) => Some(*x),
                    _ => None,
                })
                .collect::<Vec<_>>()),
            Inferred::Empty | Inferred::Text => Column::new(name, self.values.iter()
                .map(AttrValue::as_text)
                .collect::<Vec<_>>()),
        }
    }
}

/// Collects per-feature attribute rows into aligned columns, in first-seen field order.
#[derive(Debug, Clone, Default)]
pub(crate) struct AttributeTable {
    columns: Vec<ColumnBuilder>,
    rows: usize,
}

impl AttributeTable {
    /// Append one feature's attributes.
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = (S, AttrValue)>,
        S: AsRef<str>,
    {
        for (name, value) in row {
            let name = name.as_ref();
            let idx = match self.columns.iter().position(|column| column.name == name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(ColumnBuilder::new(name, self.rows));
                    self.columns.len() - 1
                }
            };
            let column = &mut self.columns[idx];
            // Repeated names within one row keep the first value.
            if column.len() == self.rows { column.push(value) }
        }
        self.rows += 1;
        for column in &mut self.columns { column.fill_to(self.rows) }
    }

    #[inline] pub fn rows(&self) -> usize { self.rows }

    pub fn finish(self) -> Vec<Column> {
        self.columns.into_iter().map(ColumnBuilder::finish).collect()
    }
}
