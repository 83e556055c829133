// Tabular results: ordered columns, ordered rows of loosely typed values.
//
// Rows are kept positional; `Table::cell` resolves a column name to its
// index so callers can treat a row as a column -> value mapping.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// A single cell value as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Ordered rows sharing one column layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Table with no columns and no rows (the loader's failure fallback)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `column` in `row`; `None` if either is out of range
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Same columns, only the rows for which `keep` returns true
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Iterate rows as (column, value) pairs
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |row| Record {
            columns: &self.columns,
            values: row,
        })
    }
}

/// Borrowed view of one row, serialized as a column -> value map
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec!["id".to_string(), "species".to_string()]);
        table.push_row(vec![Value::Integer(1), "Human".into()]);
        table.push_row(vec![Value::Integer(2)]);
        table
    }

    #[test]
    fn test_short_rows_are_padded_with_null() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "species"), Some(&Value::Null));
        assert_eq!(table.cell(0, "species"), Some(&Value::Text("Human".to_string())));
        assert_eq!(table.cell(0, "missing"), None);
        assert_eq!(table.cell(5, "id"), None);
    }

    #[test]
    fn test_retain_rows_keeps_columns() {
        let table = sample();
        let kept = table.retain_rows(|row| row[1].is_null());

        assert_eq!(kept.columns(), table.columns());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.cell(0, "id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_serializes_as_list_of_records() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"id": 1, "species": "Human"},
                {"id": 2, "species": null}
            ])
        );
    }
}
