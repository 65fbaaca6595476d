//! Tabling Engine
//!
//! Pure reducers reconciling a budget table's rows with user edits and
//! server confirmations.
//!
//! # Core Concepts
//!
//! - [`ChangeEvent`]: User-driven mutation, applied optimistically
//! - [`ControlEvent`]: Server confirmation reconciling optimistic rows
//! - [`TableReducer`]: Schema, derived-field hook and diagnostics sink
//! - [`History`]: Applied data changes with an undo/redo cursor
//! - [`TableStore`]: Rows plus flags, history and field errors, driven by [`TableAction`]
//! - [`order_rows`]: Canonical, idempotent row order
//!
//! # Example
//!
//! ```rust,ignore
//! use tabling_engine::{ChangeEvent, RowAddToGroupEvent, TableAction, TableReducer, TableStore};
//! use tabling_rows::{EditableRowId, GroupId, ModelId};
//!
//! let reducer = TableReducer::new(schema);
//! let mut store = TableStore::default();
//! store.dispatch(&reducer, &TableAction::Response(response))?;
//!
//! let group = RowAddToGroupEvent {
//!     group: GroupId(1),
//!     rows: vec![EditableRowId::Model(ModelId(1)), EditableRowId::Model(ModelId(2))],
//! };
//! store.dispatch(&reducer, &TableAction::Change(ChangeEvent::RowAddToGroup(group)))?;
//! store.dispatch(&reducer, &TableAction::Undo)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod aggregates;
mod change;
mod consolidate;
mod control;
mod error;
mod event;
mod export;
mod history;
mod list_store;
mod ordering;
mod recalculate;
mod reducer;
mod store;

// Re-exports
pub use consolidate::consolidate;
pub use error::TableError;
pub use event::{
    AddedModel, CellChange, ChangeEvent, ControlEvent, DataChangeEvent, GroupChange,
    PlaceholderActivation, RowAddEvent, RowAddPayload, RowAddToGroupEvent, RowChange,
    RowDeleteEvent, RowRemoveFromGroupEvent, UpdatedModel,
};
pub use export::to_csv;
pub use history::{History, DEFAULT_HISTORY_DEPTH};
pub use list_store::{Identified, ListAction, ListStore};
pub use ordering::order_rows;
pub use recalculate::{BudgetRecalculation, RecalculateRow};
pub use reducer::{ChangeOutcome, TableReducer};
pub use store::{CellError, TableAction, TableStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabling_rows::{
        CellValue, Column, EditableRowId, GroupId, Model, ModelId, RowId, RowsExt, TableResponse,
        TableSchema,
    };

    fn reducer() -> TableReducer {
        TableReducer::new(
            TableSchema::new(vec![
                Column::body("description", "Description"),
                Column::body("val", "Val").summed(),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn group_delete_and_undo_through_the_store() {
        let reducer = reducer();
        let mut store = TableStore::default();
        store
            .dispatch(
                &reducer,
                &TableAction::Response(TableResponse {
                    models: vec![
                        Model::new(ModelId(1)).with("val", 10.0),
                        Model::new(ModelId(2)).with("val", 20.0),
                    ],
                    count: 2,
                    ..TableResponse::default()
                }),
            )
            .unwrap();

        let m1 = EditableRowId::Model(ModelId(1));
        let m2 = EditableRowId::Model(ModelId(2));
        store
            .dispatch(
                &reducer,
                &TableAction::Change(
                    RowAddToGroupEvent {
                        group: GroupId(1),
                        rows: vec![m1, m2],
                    }
                    .into(),
                ),
            )
            .unwrap();
        assert_eq!(store.rows[0].get("val"), &CellValue::Number(30.0));

        store
            .dispatch(
                &reducer,
                &TableAction::Change(DataChangeEvent::single(m2, "val", 20.0, 25.0).into()),
            )
            .unwrap();
        assert_eq!(store.rows[0].get("val"), &CellValue::Number(35.0));

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
        assert_eq!(store.rows.group_of(m2).map(|g| g.children.len()), Some(1));
        assert_eq!(store.rows[0].get("val"), &CellValue::Number(25.0));

        store.dispatch(&reducer, &TableAction::Undo).unwrap();
        assert_eq!(store.rows[0].get("val"), &CellValue::Number(20.0));
        assert!(!store.history.can_undo());
    }
}
