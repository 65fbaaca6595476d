//! Table rows
//!
//! A table's row collection is a `Vec<Row>` where [`Row`] is a closed sum
//! over the four row variants. Aggregate rows reference their children by
//! id, never by pointer; lookups always go through the current collection.

use crate::id::{EditableRowId, GroupId, MarkupId, ModelId, PlaceholderId, RowId};
use crate::model::MarkupUnit;
use crate::value::{CellValue, RowData};
use serde::{Deserialize, Serialize};

/// Row variant discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowType {
    /// Backed by a persisted model
    Model,
    /// Awaiting persistence
    Placeholder,
    /// Group aggregate
    Group,
    /// Markup aggregate
    Markup,
}

/// Row backed by a persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    /// Row id
    pub id: ModelId,
    /// Id of the originating model
    pub model_id: ModelId,
    /// Field values (full schema field set)
    pub data: RowData,
}

/// Row created locally, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderRow {
    /// Temporary client id
    pub id: PlaceholderId,
    /// Field values entered so far (full schema field set)
    pub data: RowData,
}

/// Aggregate over a set of child rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    /// Group id
    pub id: GroupId,
    /// Display name
    pub name: String,
    /// Display color
    pub color: Option<String>,
    /// Member rows
    pub children: Vec<EditableRowId>,
    /// Aggregated values (aggregate fields only)
    pub data: RowData,
}

/// Percentage or flat adjustment over a set of child rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupRow {
    /// Markup id
    pub id: MarkupId,
    /// Short identifier
    pub identifier: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Percent or flat
    pub unit: MarkupUnit,
    /// Fraction (percent) or amount (flat)
    pub rate: f64,
    /// Rows the markup applies to
    pub children: Vec<EditableRowId>,
    /// Aggregated values, including the markup amount
    pub data: RowData,
}

/// Any row in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "row_type", rename_all = "lowercase")]
pub enum Row {
    /// Persisted line item
    Model(ModelRow),
    /// Local line item
    Placeholder(PlaceholderRow),
    /// Group aggregate
    Group(GroupRow),
    /// Markup aggregate
    Markup(MarkupRow),
}

impl Row {
    /// Row id
    #[must_use]
    pub fn id(&self) -> RowId {
        match self {
            Self::Model(r) => RowId::Model(r.id),
            Self::Placeholder(r) => RowId::Placeholder(r.id),
            Self::Group(r) => RowId::Group(r.id),
            Self::Markup(r) => RowId::Markup(r.id),
        }
    }

    /// Row discriminant
    #[must_use]
    pub fn row_type(&self) -> RowType {
        match self {
            Self::Model(_) => RowType::Model,
            Self::Placeholder(_) => RowType::Placeholder,
            Self::Group(_) => RowType::Group,
            Self::Markup(_) => RowType::Markup,
        }
    }

    /// Id if the row accepts edits
    #[inline]
    #[must_use]
    pub fn editable_id(&self) -> Option<EditableRowId> {
        self.id().editable()
    }

    /// Field values
    #[must_use]
    pub fn data(&self) -> &RowData {
        match self {
            Self::Model(r) => &r.data,
            Self::Placeholder(r) => &r.data,
            Self::Group(r) => &r.data,
            Self::Markup(r) => &r.data,
        }
    }

    /// Mutable field values of an editable row
    #[must_use]
    pub fn editable_data_mut(&mut self) -> Option<&mut RowData> {
        match self {
            Self::Model(r) => Some(&mut r.data),
            Self::Placeholder(r) => Some(&mut r.data),
            Self::Group(_) | Self::Markup(_) => None,
        }
    }

    /// Field value (`Null` if absent)
    #[must_use]
    pub fn get(&self, field: &str) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.data().get(field).unwrap_or(&NULL)
    }

    /// Group row view
    #[inline]
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupRow> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Markup row view
    #[inline]
    #[must_use]
    pub fn as_markup(&self) -> Option<&MarkupRow> {
        match self {
            Self::Markup(m) => Some(m),
            _ => None,
        }
    }
}

/// Read-only lookups over a row collection
pub trait RowsExt {
    /// Position of a row by id
    fn position_of(&self, id: RowId) -> Option<usize>;

    /// Row by id
    fn find_row(&self, id: RowId) -> Option<&Row>;

    /// Group the row currently belongs to
    fn group_of(&self, id: EditableRowId) -> Option<&GroupRow>;

    /// Markups the row currently belongs to
    fn markups_of(&self, id: EditableRowId) -> Vec<&MarkupRow>;

    /// Editable rows in collection order
    fn editable_rows(&self) -> Vec<&Row>;
}

impl RowsExt for [Row] {
    fn position_of(&self, id: RowId) -> Option<usize> {
        self.iter().position(|r| r.id() == id)
    }

    fn find_row(&self, id: RowId) -> Option<&Row> {
        self.iter().find(|r| r.id() == id)
    }

    fn group_of(&self, id: EditableRowId) -> Option<&GroupRow> {
        self.iter()
            .filter_map(Row::as_group)
            .find(|g| g.children.contains(&id))
    }

    fn markups_of(&self, id: EditableRowId) -> Vec<&MarkupRow> {
        self.iter()
            .filter_map(Row::as_markup)
            .filter(|m| m.children.contains(&id))
            .collect()
    }

    fn editable_rows(&self) -> Vec<&Row> {
        self.iter().filter(|r| r.editable_id().is_some()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_row(id: u64) -> Row {
        Row::Model(ModelRow {
            id: ModelId(id),
            model_id: ModelId(id),
            data: RowData::new(),
        })
    }

    fn group_row(id: u64, children: &[u64]) -> Row {
        Row::Group(GroupRow {
            id: GroupId(id),
            name: "G".to_string(),
            color: None,
            children: children.iter().map(|c| EditableRowId::Model(ModelId(*c))).collect(),
            data: RowData::new(),
        })
    }

    #[test]
    fn row_identity_and_type() {
        let row = model_row(3);
        assert_eq!(row.id(), RowId::Model(ModelId(3)));
        assert_eq!(row.row_type(), RowType::Model);
        assert!(row.editable_id().is_some());

        let group = group_row(3, &[]);
        assert_eq!(group.row_type(), RowType::Group);
        assert!(group.editable_id().is_none());
    }

    #[test]
    fn aggregates_expose_no_mutable_data() {
        let mut group = group_row(1, &[]);
        assert!(group.editable_data_mut().is_none());

        let mut model = model_row(1);
        assert!(model.editable_data_mut().is_some());
    }

    #[test]
    fn lookups_over_collection() {
        let rows = vec![group_row(1, &[2]), model_row(2), model_row(3)];

        assert_eq!(rows.position_of(RowId::Model(ModelId(3))), Some(2));
        assert!(rows.find_row(RowId::Model(ModelId(9))).is_none());
        assert_eq!(
            rows.group_of(EditableRowId::Model(ModelId(2))).map(|g| g.id),
            Some(GroupId(1))
        );
        assert!(rows.group_of(EditableRowId::Model(ModelId(3))).is_none());
        assert_eq!(rows.editable_rows().len(), 2);
    }

    #[test]
    fn row_serializes_with_discriminant() {
        let json = serde_json::to_value(model_row(5)).unwrap();
        assert_eq!(json["row_type"], "model");
        assert_eq!(json["id"], 5);
    }
}
