//! Vector data structures
//!
//! A [`Dataset`] is an ordered geometry collection plus an [`AttributeTable`]
//! aligned with it by row index. Analyses read datasets through shared
//! references; anything they derive (numeric columns, z-scores) is an owned
//! copy, and result tables are built from a clone of the original table.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value.
    ///
    /// `Null` and non-finite floats are missing (`Some(NaN)` is never
    /// returned for them). Strings are categorical and yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) if v.is_finite() => Some(*v),
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Whether the value counts as missing for numeric extraction.
    pub fn is_missing(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Float(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Short type name used in error messages and `info` output.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::String(_) => "string",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// A named column of attribute values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<AttributeValue>,
}

/// Ordered collection of equally long named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl AttributeTable {
    /// Create an empty table with a fixed row count.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            index: HashMap::new(),
            rows,
        }
    }

    /// Number of rows (observations)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Append a column. Its length must equal the row count and its name
    /// must be new.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<AttributeValue>,
    ) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows {
            return Err(Error::LengthMismatch {
                name,
                expected: self.rows,
                actual: values.len(),
            });
        }
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Append a float column
    pub fn push_f64_column(&mut self, name: impl Into<String>, values: &[f64]) -> Result<()> {
        self.push_column(name, values.iter().map(|&v| AttributeValue::Float(v)).collect())
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Get a single cell
    pub fn value(&self, name: &str, row: usize) -> Option<&AttributeValue> {
        self.column(name).and_then(|c| c.values.get(row))
    }

    /// Extract a numeric column as an owned vector.
    ///
    /// Missing entries become NaN. Categorical (string) entries are an error.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name).ok_or_else(|| Error::MissingColumn {
            name: name.to_string(),
        })?;

        column
            .values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                AttributeValue::String(_) => Err(Error::NonNumericColumn {
                    name: name.to_string(),
                    row,
                    found: v.to_string(),
                }),
                other => Ok(other.as_f64().unwrap_or(f64::NAN)),
            })
            .collect()
    }

    /// Extract a numeric column that must be complete.
    ///
    /// An all-missing column is [`Error::InsufficientData`]; a partially
    /// missing one is [`Error::MissingValues`].
    pub fn complete_numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let values = self.numeric_column(name)?;
        let missing = values.iter().filter(|v| !v.is_finite()).count();
        if missing == 0 {
            return Ok(values);
        }
        if missing == values.len() {
            return Err(Error::InsufficientData(format!(
                "column '{}' has no valid values",
                name
            )));
        }
        Err(Error::MissingValues {
            name: name.to_string(),
            missing,
            total: values.len(),
        })
    }

    /// Infer a display type for a column from its first non-null value.
    pub fn column_type(&self, name: &str) -> Option<&'static str> {
        self.column(name).map(|c| {
            c.values
                .iter()
                .find(|v| !matches!(v, AttributeValue::Null))
                .map(AttributeValue::type_name)
                .unwrap_or("null")
        })
    }

    /// Rename columns through a mapping. Names not in the map are kept.
    pub fn renamed(&self, mapping: &HashMap<String, String>) -> Result<Self> {
        let mut out = AttributeTable::with_rows(self.rows);
        for column in &self.columns {
            let name = mapping.get(&column.name).unwrap_or(&column.name);
            out.push_column(name.clone(), column.values.clone())?;
        }
        Ok(out)
    }
}

/// A geometry collection with its aligned attribute table
#[derive(Debug, Clone)]
pub struct Dataset {
    geometries: Vec<Geometry<f64>>,
    table: AttributeTable,
}

impl Dataset {
    /// Create a dataset. Geometry count and table rows must agree.
    pub fn new(geometries: Vec<Geometry<f64>>, table: AttributeTable) -> Result<Self> {
        if geometries.len() != table.rows() {
            return Err(Error::Format(format!(
                "{} geometries but {} attribute rows",
                geometries.len(),
                table.rows()
            )));
        }
        Ok(Self { geometries, table })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Replace the attribute table, keeping geometries.
    pub fn with_table(&self, table: AttributeTable) -> Result<Self> {
        Dataset::new(self.geometries.clone(), table)
    }

    /// Count geometries by kind, in first-seen order.
    pub fn geometry_kinds(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for g in &self.geometries {
            let kind = geometry_kind(g);
            match counts.iter_mut().find(|(k, _)| *k == kind) {
                Some(entry) => entry.1 += 1,
                None => counts.push((kind, 1)),
            }
        }
        counts
    }
}

/// GeoJSON-style name of a geometry's kind
pub fn geometry_kind(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
