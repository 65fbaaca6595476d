//! Table columns and schema
//!
//! A [`TableSchema`] fixes the field set of every row in a table. The row
//! managers consult it to fill defaults, to decide which fields are sent to
//! the server and which fields are summed into group and markup rows.

use crate::error::RowError;
use crate::value::{CellValue, RowData};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a column's values come about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// User-entered and persisted
    #[default]
    Body,
    /// Derived locally from other fields; never sent to the server
    Calculated,
    /// Supplied by the server; never sent back
    ReadOnly,
}

/// Aggregation applied to a column in group and markup rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Sum of the children's numeric values
    Sum,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Field name in row data and payloads
    pub field: String,
    /// Header label
    pub label: String,
    /// Value origin
    #[serde(default)]
    pub kind: ColumnKind,
    /// Value given to new placeholder rows
    #[serde(default)]
    pub default_value: Option<CellValue>,
    /// Aggregation for group/markup rows
    #[serde(default)]
    pub aggregate: Option<Aggregate>,
}

impl Column {
    /// Create a body column
    #[inline]
    #[must_use]
    pub fn body(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            label: label.into(),
            kind: ColumnKind::Body,
            default_value: None,
            aggregate: None,
        }
    }

    /// Create a calculated column
    #[inline]
    #[must_use]
    pub fn calculated(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Calculated,
            ..Self::body(field, label)
        }
    }

    /// Create a read-only column
    #[inline]
    #[must_use]
    pub fn read_only(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::ReadOnly,
            ..Self::body(field, label)
        }
    }

    /// With default value for placeholders
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<CellValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sum column into aggregate rows
    #[inline]
    #[must_use]
    pub fn summed(mut self) -> Self {
        self.aggregate = Some(Aggregate::Sum);
        self
    }

    /// Whether users may write this column
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.kind == ColumnKind::Body
    }

    /// Value a fresh row starts with
    #[inline]
    #[must_use]
    pub fn initial_value(&self) -> CellValue {
        self.default_value.clone().unwrap_or_default()
    }
}

/// Fields that drive markup computations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupFields {
    /// Field of child rows a percent markup is applied to
    pub base: String,
    /// Field of child rows receiving their share of markups
    pub contribution: String,
    /// Field of the markup row holding the markup amount
    pub amount: String,
}

impl Default for MarkupFields {
    fn default() -> Self {
        Self {
            base: "estimated".to_string(),
            contribution: "markup_contribution".to_string(),
            amount: "estimated".to_string(),
        }
    }
}

/// Ordered set of columns for one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<Column>,
    #[serde(default)]
    markup: MarkupFields,
}

impl TableSchema {
    /// Create schema from columns
    ///
    /// # Errors
    /// Returns error if two columns share a field name
    pub fn new(columns: Vec<Column>) -> Result<Self, RowError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.field.as_str()) {
                return Err(RowError::DuplicateColumn(column.field.clone()));
            }
        }
        Ok(Self {
            columns,
            markup: MarkupFields::default(),
        })
    }

    /// With custom markup fields
    #[inline]
    #[must_use]
    pub fn with_markup_fields(mut self, markup: MarkupFields) -> Self {
        self.markup = markup;
        self
    }

    /// All columns in display order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Markup field configuration
    #[inline]
    #[must_use]
    pub fn markup_fields(&self) -> &MarkupFields {
        &self.markup
    }

    /// Lookup column by field
    #[must_use]
    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Check that a field exists and is editable
    ///
    /// # Errors
    /// - `RowError::UnknownField` if the field is not in the schema
    /// - `RowError::ReadOnlyField` if the column is calculated or read-only
    pub fn require_editable(&self, field: &str) -> Result<&Column, RowError> {
        let column = self
            .column(field)
            .ok_or_else(|| RowError::UnknownField(field.to_string()))?;
        if !column.is_editable() {
            return Err(RowError::ReadOnlyField(field.to_string()));
        }
        Ok(column)
    }

    /// Fields users may write, in display order
    pub fn editable_fields(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.is_editable())
            .map(|c| c.field.as_str())
    }

    /// Fields summed into aggregate rows
    pub fn aggregate_fields(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.aggregate.is_some())
            .map(|c| c.field.as_str())
    }

    /// Row data with every field at its initial value
    #[must_use]
    pub fn blank_data(&self) -> RowData {
        self.columns
            .iter()
            .map(|c| (c.field.clone(), c.initial_value()))
            .collect()
    }

    /// Project arbitrary data onto the schema's field set
    ///
    /// Unknown fields are dropped; missing fields take `fallback(column)`.
    #[must_use]
    pub fn shape(&self, mut data: RowData, fallback: impl Fn(&Column) -> CellValue) -> RowData {
        self.columns
            .iter()
            .map(|c| {
                let value = data.remove(&c.field).unwrap_or_else(|| fallback(c));
                (c.field.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::body("description", "Description").with_default(""),
            Column::body("quantity", "Qty").with_default(1.0),
            Column::calculated("estimated", "Estimated").summed(),
            Column::read_only("actual", "Actual").summed(),
        ])
        .unwrap()
    }

    #[test]
    fn schema_rejects_duplicate_fields() {
        let result = TableSchema::new(vec![Column::body("a", "A"), Column::body("a", "B")]);
        assert_eq!(result.unwrap_err(), RowError::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn editable_and_aggregate_fields() {
        let schema = schema();
        let editable: Vec<_> = schema.editable_fields().collect();
        let aggregate: Vec<_> = schema.aggregate_fields().collect();

        assert_eq!(editable, vec!["description", "quantity"]);
        assert_eq!(aggregate, vec!["estimated", "actual"]);
    }

    #[test]
    fn require_editable_classifies_fields() {
        let schema = schema();
        assert!(schema.require_editable("quantity").is_ok());
        assert!(matches!(
            schema.require_editable("estimated"),
            Err(RowError::ReadOnlyField(_))
        ));
        assert!(matches!(
            schema.require_editable("nope"),
            Err(RowError::UnknownField(_))
        ));
    }

    #[test]
    fn blank_data_uses_defaults() {
        let data = schema().blank_data();
        assert_eq!(data.len(), 4);
        assert_eq!(data["quantity"], CellValue::Number(1.0));
        assert_eq!(data["estimated"], CellValue::Null);
    }

    #[test]
    fn shape_drops_unknown_and_fills_missing() {
        let mut data = RowData::new();
        data.insert("quantity".to_string(), CellValue::Number(4.0));
        data.insert("bogus".to_string(), CellValue::Bool(true));

        let shaped = schema().shape(data, |_| CellValue::Null);
        assert_eq!(shaped.len(), 4);
        assert!(!shaped.contains_key("bogus"));
        assert_eq!(shaped["quantity"], CellValue::Number(4.0));
        assert_eq!(shaped["description"], CellValue::Null);
    }
}
