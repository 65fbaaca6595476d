//! Event vocabulary
//!
//! Two closed sets of events drive a table:
//! - [`ChangeEvent`]: user-driven mutations applied optimistically
//! - [`ControlEvent`]: server confirmations reconciling optimistic state
//!
//! Every change event carries enough to both apply and, for history,
//! invert the mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabling_rows::{
    CellValue, EditableRowId, GroupId, GroupModel, MarkupModel, Model, ModelId, PlaceholderId,
    RowData, RowId,
};

/// Old and new value of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    /// Value before the edit
    pub old_value: CellValue,
    /// Value after the edit
    pub new_value: CellValue,
}

impl CellChange {
    /// Create cell change
    #[inline]
    #[must_use]
    pub fn new(old_value: impl Into<CellValue>, new_value: impl Into<CellValue>) -> Self {
        Self {
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    /// Same change, reversed
    #[inline]
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }
}

/// Field changes targeting one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    /// Target row (never an aggregate)
    pub id: EditableRowId,
    /// Field -> change
    pub fields: BTreeMap<String, CellChange>,
}

impl RowChange {
    /// Create empty row change
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EditableRowId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// With field change
    #[inline]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, change: CellChange) -> Self {
        self.fields.insert(field.into(), change);
        self
    }
}

/// User edit of one or more cells
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataChangeEvent {
    /// Changes in the order they were made
    pub changes: Vec<RowChange>,
}

impl DataChangeEvent {
    /// Create event from row changes
    #[inline]
    #[must_use]
    pub fn new(changes: Vec<RowChange>) -> Self {
        Self { changes }
    }

    /// Event editing a single cell
    #[must_use]
    pub fn single(
        id: impl Into<EditableRowId>,
        field: impl Into<String>,
        old_value: impl Into<CellValue>,
        new_value: impl Into<CellValue>,
    ) -> Self {
        Self::new(vec![
            RowChange::new(id).with(field, CellChange::new(old_value, new_value))
        ])
    }

    /// Check whether the event changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|c| c.fields.is_empty())
    }

    /// Event undoing this one: old/new swapped, changes in reverse order
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            changes: self
                .changes
                .iter()
                .rev()
                .map(|c| RowChange {
                    id: c.id,
                    fields: c
                        .fields
                        .iter()
                        .map(|(f, change)| (f.clone(), change.inverse()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rows touched by the event
    #[must_use]
    pub fn row_ids(&self) -> Vec<EditableRowId> {
        let mut ids = Vec::new();
        for change in &self.changes {
            if !ids.contains(&change.id) {
                ids.push(change.id);
            }
        }
        ids
    }

    /// Rewrite references to a placeholder that became a model
    pub fn rename(&mut self, placeholder: PlaceholderId, model: ModelId) {
        for change in &mut self.changes {
            if change.id == EditableRowId::Placeholder(placeholder) {
                change.id = EditableRowId::Model(model);
            }
        }
    }
}

/// What rows a [`RowAddEvent`] creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAddPayload {
    /// Explicit partial rows, appended at the end
    Rows(Vec<RowData>),
    /// Blank rows, appended at the end
    Count(usize),
    /// Blank rows, inserted at a position in the row collection
    At {
        /// Position of the first new row
        index: usize,
        /// Number of rows
        count: usize,
    },
}

/// User adds rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowAddEvent {
    /// Rows to create
    pub payload: RowAddPayload,
    /// Pre-allocated ids, exactly one per created row
    pub placeholder_ids: Vec<PlaceholderId>,
}

impl RowAddEvent {
    /// Add `count` blank rows at the end, allocating ids
    #[must_use]
    pub fn count(count: usize) -> Self {
        Self {
            payload: RowAddPayload::Count(count),
            placeholder_ids: PlaceholderId::generate(count),
        }
    }

    /// Insert `count` blank rows at `index`, allocating ids
    #[must_use]
    pub fn at(index: usize, count: usize) -> Self {
        Self {
            payload: RowAddPayload::At { index, count },
            placeholder_ids: PlaceholderId::generate(count),
        }
    }

    /// Add explicit rows at the end, allocating ids
    #[must_use]
    pub fn rows(rows: Vec<RowData>) -> Self {
        let ids = PlaceholderId::generate(rows.len());
        Self {
            payload: RowAddPayload::Rows(rows),
            placeholder_ids: ids,
        }
    }

    /// Number of rows the payload asks for
    #[must_use]
    pub fn requested(&self) -> usize {
        match &self.payload {
            RowAddPayload::Rows(rows) => rows.len(),
            RowAddPayload::Count(count) | RowAddPayload::At { count, .. } => *count,
        }
    }
}

/// User deletes rows
///
/// Deleting a group row removes only the aggregate; its children stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDeleteEvent {
    /// Rows to delete
    pub rows: Vec<RowId>,
}

/// User moves rows into a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowAddToGroupEvent {
    /// Destination group
    pub group: GroupId,
    /// Rows to move
    pub rows: Vec<EditableRowId>,
}

/// User takes rows out of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRemoveFromGroupEvent {
    /// Group to remove from
    pub group: GroupId,
    /// Rows to remove
    pub rows: Vec<EditableRowId>,
}

/// User-driven table mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Cell edits
    DataChange(DataChangeEvent),
    /// New placeholder rows
    RowAdd(RowAddEvent),
    /// Row removal
    RowDelete(RowDeleteEvent),
    /// Group membership gained
    RowAddToGroup(RowAddToGroupEvent),
    /// Group membership lost
    RowRemoveFromGroup(RowRemoveFromGroupEvent),
}

impl ChangeEvent {
    /// Event name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataChange(_) => "data_change",
            Self::RowAdd(_) => "row_add",
            Self::RowDelete(_) => "row_delete",
            Self::RowAddToGroup(_) => "row_add_to_group",
            Self::RowRemoveFromGroup(_) => "row_remove_from_group",
        }
    }
}

impl From<DataChangeEvent> for ChangeEvent {
    fn from(event: DataChangeEvent) -> Self {
        Self::DataChange(event)
    }
}

impl From<RowAddEvent> for ChangeEvent {
    fn from(event: RowAddEvent) -> Self {
        Self::RowAdd(event)
    }
}

impl From<RowDeleteEvent> for ChangeEvent {
    fn from(event: RowDeleteEvent) -> Self {
        Self::RowDelete(event)
    }
}

impl From<RowAddToGroupEvent> for ChangeEvent {
    fn from(event: RowAddToGroupEvent) -> Self {
        Self::RowAddToGroup(event)
    }
}

impl From<RowRemoveFromGroupEvent> for ChangeEvent {
    fn from(event: RowRemoveFromGroupEvent) -> Self {
        Self::RowRemoveFromGroup(event)
    }
}

/// Server created the model behind a placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderActivation {
    /// Placeholder being replaced
    pub placeholder: PlaceholderId,
    /// Created model
    pub model: Model,
}

/// Model arriving from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddedModel {
    /// Line item, optionally inside a group
    Model {
        /// The model
        model: Model,
        /// Group to route it into
        #[serde(default)]
        group: Option<GroupId>,
    },
    /// Group; its children take precedence over prior groupings
    Group(GroupModel),
    /// Markup; its children take precedence over prior markups
    Markup(MarkupModel),
}

/// Group membership change carried by a model update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupChange {
    /// Membership untouched
    #[default]
    Unchanged,
    /// Explicitly removed from its group
    Removed,
    /// Moved to a group
    MoveTo(GroupId),
}

impl From<Option<Option<GroupId>>> for GroupChange {
    /// `None` = no change, `Some(None)` = removal, `Some(Some(g))` = move
    fn from(value: Option<Option<GroupId>>) -> Self {
        match value {
            None => Self::Unchanged,
            Some(None) => Self::Removed,
            Some(Some(group)) => Self::MoveTo(group),
        }
    }
}

/// Model updated on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdatedModel {
    /// Line item
    Model {
        /// The model
        model: Model,
        /// Membership change
        #[serde(default)]
        group: GroupChange,
    },
    /// Group
    Group(GroupModel),
    /// Markup; child contributions are recomputed
    Markup(MarkupModel),
}

/// Server-driven reconciliation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlEvent {
    /// New models
    ModelsAdded(Vec<AddedModel>),
    /// Changed models
    ModelsUpdated(Vec<UpdatedModel>),
    /// Placeholders persisted
    PlaceholdersActivated(Vec<PlaceholderActivation>),
}

impl ControlEvent {
    /// Event name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModelsAdded(_) => "models_added",
            Self::ModelsUpdated(_) => "models_updated",
            Self::PlaceholdersActivated(_) => "placeholders_activated",
        }
    }
}
