//! Rows and result sets returned by statements.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column index.
    pub index: usize,
}

/// A row from a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl Row {
    /// Get a value by column index.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| Error::TypeMismatch {
            expected: "valid column index",
            actual: format!("index {index} out of bounds"),
        })?;
        T::from_value(value)
    }

    /// Get a value by column name (case-insensitive).
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self.position(name).ok_or_else(|| Error::TypeMismatch {
            expected: "valid column name",
            actual: format!("column '{name}' not found"),
        })?;
        self.get(index)
    }

    /// Get a value by column name, returning `None` if NULL, missing, or
    /// of another type.
    pub fn try_get_by_name<T: FromValue>(&self, name: &str) -> Option<T> {
        let value = self.values.get(self.position(name)?)?;
        T::from_value_nullable(value).ok().flatten()
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Rows produced by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Create an empty result set with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Arc<[Column]> = columns
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column {
                name: name.into(),
                index,
            })
            .collect();
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// A result with no columns and no rows, as returned by writes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a row. Missing trailing values are filled with `NULL`.
    pub fn push_row(&mut self, values: impl IntoIterator<Item = Value>) {
        let mut values: Vec<Value> = values.into_iter().collect();
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            values,
        });
    }

    /// Builder form of [`push_row`](Self::push_row).
    #[must_use]
    pub fn with_row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.push_row(values);
        self
    }

    /// Column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in server order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
