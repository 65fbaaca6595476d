//! Table store
//!
//! [`TableStore`] owns a table's rows and the state around them. Every
//! [`TableAction`] runs through the same fixed sequence of transitions:
//!
//! 1. flags (loading / saving / creating)
//! 2. response (wholesale replace)
//! 3. search
//! 4. change events
//! 5. control events
//! 6. history (undo / redo)
//! 7. field errors
//! 8. list sub-stores (groups / fringes)
//! 9. clear
//!
//! Each transition ignores actions it does not own, so an action is handled
//! by exactly one of them.

use crate::error::TableError;
use crate::event::{ChangeEvent, ControlEvent};
use crate::history::{History, DEFAULT_HISTORY_DEPTH};
use crate::list_store::{ListAction, ListStore};
use crate::reducer::TableReducer;
use serde::{Deserialize, Serialize};
use tabling_rows::{EditableRowId, GroupModel, Model, Row, RowId, TableResponse};

/// Server-reported validation error attached to one cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    /// Row the error belongs to
    pub row: RowId,
    /// Field the error belongs to
    pub field: String,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Table state transition
#[derive(Debug, Clone, PartialEq)]
pub enum TableAction {
    /// List fetch started or finished
    SetLoading(bool),
    /// Update request in flight
    SetSaving(bool),
    /// Create request in flight
    SetCreating(bool),
    /// Server list response; replaces all rows
    Response(TableResponse),
    /// Search text changed
    SetSearch(String),
    /// User change, applied optimistically
    Change(ChangeEvent),
    /// Server confirmation
    Control(ControlEvent),
    /// Step back in history
    Undo,
    /// Step forward in history
    Redo,
    /// Attach field errors, replacing earlier errors on the same cells
    AttachErrors(Vec<CellError>),
    /// Drop every field error of a row
    ClearErrors(RowId),
    /// Groups sub-store
    Groups(ListAction<GroupModel>),
    /// Fringes sub-store
    Fringes(ListAction<Model>),
    /// Back to empty
    Clear,
}

impl TableAction {
    /// Action name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetSaving(_) => "set_saving",
            Self::SetCreating(_) => "set_creating",
            Self::Response(_) => "response",
            Self::SetSearch(_) => "set_search",
            Self::Change(_) => "change",
            Self::Control(_) => "control",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::AttachErrors(_) => "attach_errors",
            Self::ClearErrors(_) => "clear_errors",
            Self::Groups(_) => "groups",
            Self::Fringes(_) => "fringes",
            Self::Clear => "clear",
        }
    }
}

impl From<ChangeEvent> for TableAction {
    fn from(event: ChangeEvent) -> Self {
        Self::Change(event)
    }
}

impl From<ControlEvent> for TableAction {
    fn from(event: ControlEvent) -> Self {
        Self::Control(event)
    }
}

/// State of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableStore {
    /// Rows in canonical order
    pub rows: Vec<Row>,
    /// Total line items on the server
    pub count: usize,
    /// Current search
    pub search: String,
    /// List fetch in flight
    pub loading: bool,
    /// Update request in flight
    pub saving: bool,
    /// Create request in flight
    pub creating: bool,
    /// Applied data changes
    pub history: History,
    /// Server-reported validation errors
    pub field_errors: Vec<CellError>,
    /// Groups of the table
    pub groups: ListStore<GroupModel>,
    /// Fringes of the table
    pub fringes: ListStore<Model>,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

type Transition = fn(&mut TableStore, &TableReducer, &TableAction) -> Result<(), TableError>;

const TRANSITIONS: [Transition; 9] = [
    flags,
    response,
    search,
    change,
    control,
    history,
    errors,
    lists,
    clear,
];

impl TableStore {
    /// Create empty store keeping `history_depth` undo entries
    #[must_use]
    pub fn new(history_depth: usize) -> Self {
        Self {
            rows: Vec::new(),
            count: 0,
            search: String::new(),
            loading: false,
            saving: false,
            creating: false,
            history: History::new(history_depth),
            field_errors: Vec::new(),
            groups: ListStore::default(),
            fringes: ListStore::default(),
        }
    }

    /// Next state after an action
    ///
    /// # Errors
    /// Returns the change reducer's contract violations; the store is left unchanged
    pub fn reduce(&self, reducer: &TableReducer, action: &TableAction) -> Result<Self, TableError> {
        let mut next = self.clone();
        for transition in TRANSITIONS {
            transition(&mut next, reducer, action)?;
        }
        Ok(next)
    }

    /// Apply an action in place
    ///
    /// # Errors
    /// Same as [`TableStore::reduce`]
    pub fn dispatch(&mut self, reducer: &TableReducer, action: &TableAction) -> Result<(), TableError> {
        tracing::trace!(action = action.name(), "dispatch");
        *self = self.reduce(reducer, action)?;
        Ok(())
    }

    /// History cursor, `-1` before the first entry
    #[inline]
    #[must_use]
    pub fn event_index(&self) -> isize {
        self.history.event_index()
    }

    /// Error attached to a cell
    #[must_use]
    pub fn error_for(&self, row: RowId, field: &str) -> Option<&CellError> {
        self.field_errors
            .iter()
            .find(|e| e.row == row && e.field == field)
    }

    fn rename_errors(&mut self, from: RowId, to: RowId) {
        for error in &mut self.field_errors {
            if error.row == from {
                error.row = to;
            }
        }
    }
}

fn flags(store: &mut TableStore, _: &TableReducer, action: &TableAction) -> Result<(), TableError> {
    match action {
        TableAction::SetLoading(v) => store.loading = *v,
        TableAction::SetSaving(v) => store.saving = *v,
        TableAction::SetCreating(v) => store.creating = *v,
        _ => {}
    }
    Ok(())
}

fn response(
    store: &mut TableStore,
    reducer: &TableReducer,
    action: &TableAction,
) -> Result<(), TableError> {
    if let TableAction::Response(response) = action {
        store.rows = reducer.populate(response);
        store.count = response.count;
        store.loading = false;
        store.history.clear();
        store.field_errors.clear();
        tracing::debug!(rows = store.rows.len(), count = store.count, "table populated");
    }
    Ok(())
}

fn search(store: &mut TableStore, _: &TableReducer, action: &TableAction) -> Result<(), TableError> {
    if let TableAction::SetSearch(search) = action {
        store.search.clone_from(search);
    }
    Ok(())
}

fn change(
    store: &mut TableStore,
    reducer: &TableReducer,
    action: &TableAction,
) -> Result<(), TableError> {
    let TableAction::Change(event) = action else {
        return Ok(());
    };
    let outcome = reducer.apply_change(&store.rows, event)?;
    let before = model_rows(&store.rows);
    store.rows = outcome.rows;
    if let Some(applied) = outcome.applied {
        store.history.push(applied);
    }
    if let ChangeEvent::RowDelete(delete) = event {
        store.field_errors.retain(|e| !delete.rows.contains(&e.row));
        let removed = before.saturating_sub(model_rows(&store.rows));
        store.count = store.count.saturating_sub(removed);
    }
    Ok(())
}

fn control(
    store: &mut TableStore,
    reducer: &TableReducer,
    action: &TableAction,
) -> Result<(), TableError> {
    let TableAction::Control(event) = action else {
        return Ok(());
    };
    let before = model_rows(&store.rows);
    store.rows = reducer.apply_control(&store.rows, event);
    // Only rows new to the table are new on the server; replacements are not
    store.count += model_rows(&store.rows).saturating_sub(before);
    match event {
        ControlEvent::PlaceholdersActivated(activations) => {
            for activation in activations {
                store.history.rename(activation.placeholder, activation.model.id);
                store.rename_errors(
                    EditableRowId::Placeholder(activation.placeholder).into(),
                    EditableRowId::Model(activation.model.id).into(),
                );
            }
        }
        ControlEvent::ModelsAdded(_) | ControlEvent::ModelsUpdated(_) => {}
    }
    Ok(())
}

fn model_rows(rows: &[Row]) -> usize {
    rows.iter().filter(|r| matches!(r, Row::Model(_))).count()
}

fn history(
    store: &mut TableStore,
    reducer: &TableReducer,
    action: &TableAction,
) -> Result<(), TableError> {
    match action {
        TableAction::Undo => {
            if let Some(inverse) = store.history.pending_undo() {
                store.rows = reducer.apply_data_change(&store.rows, &inverse).rows;
                store.history.step_back();
            }
        }
        TableAction::Redo => {
            if let Some(forward) = store.history.pending_redo() {
                store.rows = reducer.apply_data_change(&store.rows, &forward).rows;
                store.history.step_forward();
            }
        }
        _ => {}
    }
    Ok(())
}

fn errors(store: &mut TableStore, _: &TableReducer, action: &TableAction) -> Result<(), TableError> {
    match action {
        TableAction::AttachErrors(errors) => {
            for error in errors {
                store
                    .field_errors
                    .retain(|e| !(e.row == error.row && e.field == error.field));
                store.field_errors.push(error.clone());
            }
        }
        TableAction::ClearErrors(row) => store.field_errors.retain(|e| e.row != *row),
        _ => {}
    }
    Ok(())
}

fn lists(store: &mut TableStore, _: &TableReducer, action: &TableAction) -> Result<(), TableError> {
    match action {
        TableAction::Groups(action) => store.groups = store.groups.reduce(action),
        TableAction::Fringes(action) => store.fringes = store.fringes.reduce(action),
        _ => {}
    }
    Ok(())
}

fn clear(store: &mut TableStore, _: &TableReducer, action: &TableAction) -> Result<(), TableError> {
    if matches!(action, TableAction::Clear) {
        let depth = store.history.max_depth();
        *store = TableStore::new(depth);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        AddedModel, DataChangeEvent, PlaceholderActivation, RowAddEvent, RowAddPayload,
        RowDeleteEvent,
    };
    use pretty_assertions::assert_eq;
    use tabling_rows::{CellValue, Column, ModelId, PlaceholderId, TableSchema};

    fn reducer() -> TableReducer {
        TableReducer::new(
            TableSchema::new(vec![
                Column::body("description", "Description"),
                Column::body("rate", "Rate").summed(),
            ])
            .unwrap(),
        )
    }

    fn populated() -> TableStore {
        let mut store = TableStore::default();
        store
            .dispatch(&reducer(), &TableAction::SetLoading(true))
            .unwrap();
        store
            .dispatch(
                &reducer(),
                &TableAction::Response(TableResponse {
                    models: vec![
                        Model::new(ModelId(1)).with("rate", 1.0),
                        Model::new(ModelId(2)).with("rate", 2.0),
                    ],
                    count: 2,
                    ..TableResponse::default()
                }),
            )
            .unwrap();
        store
    }

    fn edit(id: u64, old: f64, new: f64) -> TableAction {
        TableAction::Change(DataChangeEvent::single(ModelId(id), "rate", old, new).into())
    }

    #[test]
    fn response_populates_and_stops_loading() {
        let store = populated();
        assert_eq!(store.rows.len(), 2);
        assert_eq!(store.count, 2);
        assert!(!store.loading);
        assert_eq!(store.event_index(), -1);
    }

    #[test]
    fn edits_are_recorded_and_undoable() {
        let reducer = reducer();
        let mut store = populated();
        store.dispatch(&reducer, &edit(1, 1.0, 5.0)).unwrap();
        store.dispatch(&reducer, &edit(2, 2.0, 6.0)).unwrap();
        assert_eq!(store.event_index(), 1);

        store.dispatch(&reducer, &TableAction::Undo).unwrap();
        store.dispatch(&reducer, &TableAction::Undo).unwrap();
        assert_eq!(store.rows, populated().rows);
        assert_eq!(store.event_index(), -1);

        // Undo at the start is a no-op
        store.dispatch(&reducer, &TableAction::Undo).unwrap();
        assert_eq!(store.event_index(), -1);

        store.dispatch(&reducer, &TableAction::Redo).unwrap();
        assert_eq!(store.rows[0].get("rate"), &CellValue::Number(5.0));
        assert_eq!(store.event_index(), 0);
    }

    #[test]
    fn contract_violation_leaves_store_untouched() {
        let store = populated();
        let action = TableAction::Change(ChangeEvent::RowAdd(RowAddEvent {
            payload: RowAddPayload::Count(2),
            placeholder_ids: vec![PlaceholderId::new()],
        }));
        assert!(store.reduce(&reducer(), &action).is_err());
        assert_eq!(store.rows.len(), 2);
    }

    #[test]
    fn activation_moves_errors_and_history_to_the_model() {
        let reducer = reducer();
        let mut store = populated();
        let add = RowAddEvent::count(1);
        let placeholder = add.placeholder_ids[0];
        store.dispatch(&reducer, &TableAction::Change(add.into())).unwrap();
        store
            .dispatch(
                &reducer,
                &TableAction::Change(DataChangeEvent::single(placeholder, "rate", 0.0, 3.0).into()),
            )
            .unwrap();
        store
            .dispatch(
                &reducer,
                &TableAction::AttachErrors(vec![CellError {
                    row: RowId::Placeholder(placeholder),
                    field: "rate".to_string(),
                    code: "invalid".to_string(),
                    message: "Rate is invalid".to_string(),
                }]),
            )
            .unwrap();

        store
            .dispatch(
                &reducer,
                &TableAction::Control(ControlEvent::PlaceholdersActivated(vec![
                    PlaceholderActivation {
                        placeholder,
                        model: Model::new(ModelId(3)).with("rate", 3.0),
                    },
                ])),
            )
            .unwrap();

        assert!(store.error_for(RowId::Model(ModelId(3)), "rate").is_some());
        store.dispatch(&reducer, &TableAction::Undo).unwrap();
        assert_eq!(store.rows[2].get("rate"), &CellValue::Null);
    }

    #[test]
    fn attach_replaces_and_delete_clears_errors() {
        let reducer = reducer();
        let mut store = populated();
        let error = |message: &str| CellError {
            row: RowId::Model(ModelId(1)),
            field: "rate".to_string(),
            code: "invalid".to_string(),
            message: message.to_string(),
        };
        store
            .dispatch(&reducer, &TableAction::AttachErrors(vec![error("a")]))
            .unwrap();
        store
            .dispatch(&reducer, &TableAction::AttachErrors(vec![error("b")]))
            .unwrap();
        assert_eq!(store.field_errors, vec![error("b")]);

        store
            .dispatch(
                &reducer,
                &TableAction::Change(
                    RowDeleteEvent {
                        rows: vec![RowId::Model(ModelId(1))],
                    }
                    .into(),
                ),
            )
            .unwrap();
        assert!(store.field_errors.is_empty());
    }

    fn activate(placeholder: PlaceholderId, id: u64) -> TableAction {
        TableAction::Control(ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
            placeholder,
            model: Model::new(ModelId(id)).with("rate", 1.0),
        }]))
    }

    #[test]
    fn activation_counts_the_created_model() {
        let reducer = reducer();
        let mut store = populated();
        let add = RowAddEvent::count(2);
        let (first, second) = (add.placeholder_ids[0], add.placeholder_ids[1]);
        store.dispatch(&reducer, &TableAction::Change(add.into())).unwrap();
        assert_eq!(store.count, 2);

        store.dispatch(&reducer, &activate(first, 3)).unwrap();
        assert_eq!(store.count, 3);

        // Activated onto a model already in the table: no new line item
        store.dispatch(&reducer, &activate(second, 1)).unwrap();
        assert_eq!(store.count, 3);

        // Unknown placeholder
        store.dispatch(&reducer, &activate(PlaceholderId::new(), 9)).unwrap();
        assert_eq!(store.count, 3);
    }

    #[test]
    fn models_added_counts_only_new_ids() {
        let reducer = reducer();
        let mut store = populated();
        let added = |id: u64| {
            TableAction::Control(ControlEvent::ModelsAdded(vec![AddedModel::Model {
                model: Model::new(ModelId(id)).with("rate", 4.0),
                group: None,
            }]))
        };
        store.dispatch(&reducer, &added(2)).unwrap();
        assert_eq!(store.count, 2);
        store.dispatch(&reducer, &added(7)).unwrap();
        assert_eq!(store.count, 3);
    }

    #[test]
    fn deleting_models_lowers_count() {
        let reducer = reducer();
        let mut store = populated();
        let add = RowAddEvent::count(1);
        let placeholder = add.placeholder_ids[0];
        store.dispatch(&reducer, &TableAction::Change(add.into())).unwrap();

        store
            .dispatch(
                &reducer,
                &TableAction::Change(
                    RowDeleteEvent {
                        rows: vec![RowId::Model(ModelId(1)), RowId::Placeholder(placeholder)],
                    }
                    .into(),
                ),
            )
            .unwrap();
        assert_eq!(store.count, 1);
        assert_eq!(store.rows.len(), 1);
    }

    #[test]
    fn clear_resets_everything_but_history_depth() {
        let reducer = reducer();
        let mut store = TableStore::new(3);
        store.dispatch(&reducer, &TableAction::SetSearch("lens".to_string())).unwrap();
        store.dispatch(&reducer, &TableAction::Clear).unwrap();
        assert_eq!(store, TableStore::new(3));
    }
}
