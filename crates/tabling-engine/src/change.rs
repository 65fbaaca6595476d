//! Change event reducer
//!
//! Applies one user-driven [`ChangeEvent`] to a row collection. Missing
//! targets are reported and skipped; only caller contract violations on row
//! add are errors. Every structural change ends with an aggregate refresh
//! and a re-order.

use crate::aggregates;
use crate::consolidate::consolidate;
use crate::error::TableError;
use crate::event::{
    CellChange, ChangeEvent, DataChangeEvent, RowAddEvent, RowAddPayload, RowAddToGroupEvent,
    RowChange, RowDeleteEvent, RowRemoveFromGroupEvent,
};
use crate::reducer::{ChangeOutcome, TableReducer};
use std::collections::HashSet;
use tabling_rows::{
    EditableRowId, Inconsistency, PlaceholderRowManager, Row, RowId, RowsExt,
};

impl TableReducer {
    /// Apply a change event
    ///
    /// # Errors
    /// - `TableError::PlaceholderCountMismatch` if a row add supplies the wrong number of ids
    /// - `TableError::DuplicateRowId` if a row add reuses an id already in the table
    pub fn apply_change(
        &self,
        rows: &[Row],
        event: &ChangeEvent,
    ) -> Result<ChangeOutcome, TableError> {
        tracing::debug!(event = event.name(), rows = rows.len(), "applying change event");
        match event {
            ChangeEvent::DataChange(e) => Ok(self.apply_data_change(rows, e)),
            ChangeEvent::RowAdd(e) => self.apply_row_add(rows, e).map(ChangeOutcome::structural),
            ChangeEvent::RowDelete(e) => Ok(ChangeOutcome::structural(self.apply_row_delete(rows, e))),
            ChangeEvent::RowAddToGroup(e) => {
                Ok(ChangeOutcome::structural(self.apply_add_to_group(rows, e)))
            }
            ChangeEvent::RowRemoveFromGroup(e) => {
                Ok(ChangeOutcome::structural(self.apply_remove_from_group(rows, e)))
            }
        }
    }

    /// Apply cell edits
    ///
    /// Changes are consolidated per row first. Fields that are not editable
    /// are ignored. The returned `applied` event records the old values read
    /// from the rows, so its inverse restores them exactly.
    #[must_use]
    pub fn apply_data_change(&self, rows: &[Row], event: &DataChangeEvent) -> ChangeOutcome {
        let mut rows = rows.to_vec();
        let mut applied = Vec::new();

        for change in consolidate(event) {
            let Some(index) = Self::position_of(&rows, change.id) else {
                self.sink.inconsistent(Inconsistency::RowNotFound {
                    id: change.id.into(),
                    context: "data_change",
                });
                continue;
            };
            let Some(data) = rows[index].editable_data_mut() else {
                continue;
            };

            let mut recorded = RowChange::new(change.id);
            for (field, cell) in &change.fields {
                if let Err(e) = self.schema.require_editable(field) {
                    tracing::debug!(row = %change.id, error = %e, "ignoring edit");
                    continue;
                }
                let old_value = data.get(field).cloned().unwrap_or_default();
                if old_value == cell.new_value {
                    continue;
                }
                data.insert(field.clone(), cell.new_value.clone());
                recorded
                    .fields
                    .insert(field.clone(), CellChange::new(old_value, cell.new_value.clone()));
            }

            if recorded.fields.is_empty() {
                continue;
            }
            let merged = std::mem::take(data);
            *data = self.recalculated(merged);
            applied.push(recorded);
        }

        if applied.is_empty() {
            return ChangeOutcome::structural(rows);
        }
        ChangeOutcome {
            rows: self.finish(rows),
            applied: Some(DataChangeEvent::new(applied)),
        }
    }

    /// Insert placeholder rows
    ///
    /// # Errors
    /// - `TableError::PlaceholderCountMismatch` if `placeholder_ids` does not match the rows requested
    /// - `TableError::DuplicateRowId` if a placeholder id is already in the table
    pub fn apply_row_add(&self, rows: &[Row], event: &RowAddEvent) -> Result<Vec<Row>, TableError> {
        let requested = event.requested();
        if event.placeholder_ids.len() != requested {
            return Err(TableError::PlaceholderCountMismatch {
                requested,
                supplied: event.placeholder_ids.len(),
            });
        }
        let mut seen = HashSet::new();
        for id in &event.placeholder_ids {
            let row_id = RowId::Placeholder(*id);
            if !seen.insert(*id) || rows.find_row(row_id).is_some() {
                return Err(TableError::DuplicateRowId(row_id));
            }
        }

        let placeholders = match &event.payload {
            RowAddPayload::Rows(data) => event
                .placeholder_ids
                .iter()
                .zip(data)
                .map(|(id, d)| PlaceholderRowManager::create(*id, d.clone(), &self.schema))
                .collect(),
            RowAddPayload::Count(_) | RowAddPayload::At { .. } => {
                PlaceholderRowManager::create_many(&event.placeholder_ids, &self.schema)
            }
        };
        let new_rows = placeholders.into_iter().map(|mut p| {
            p.data = self.recalculated(p.data);
            Row::Placeholder(p)
        });

        let mut rows = rows.to_vec();
        match event.payload {
            RowAddPayload::At { index, .. } => {
                let index = index.min(rows.len());
                rows.splice(index..index, new_rows);
            }
            RowAddPayload::Rows(_) | RowAddPayload::Count(_) => {
                // New rows go after the last editable or group row, before trailing markups
                let end = rows
                    .iter()
                    .rposition(|r| r.as_markup().is_none())
                    .map_or(0, |i| i + 1);
                rows.splice(end..end, new_rows);
            }
        }

        Ok(self.finish(rows))
    }

    /// Delete rows
    ///
    /// Grouped rows leave their group first; deleting a group or markup row
    /// removes only the aggregate.
    #[must_use]
    pub fn apply_row_delete(&self, rows: &[Row], event: &RowDeleteEvent) -> Vec<Row> {
        let mut rows = rows.to_vec();

        let mut targets = Vec::with_capacity(event.rows.len());
        for id in &event.rows {
            if rows.find_row(*id).is_none() {
                self.sink.inconsistent(Inconsistency::RowNotFound {
                    id: *id,
                    context: "row_delete",
                });
                continue;
            }
            targets.push(*id);
        }

        let editable: Vec<EditableRowId> = targets.iter().filter_map(RowId::editable).collect();
        aggregates::strip_from_groups(&mut rows, &editable, None);
        aggregates::strip_from_markups(&mut rows, &editable, None);
        rows.retain(|r| !targets.contains(&r.id()));

        self.finish(rows)
    }

    /// Move rows into a group, creating the group row if needed
    #[must_use]
    pub fn apply_add_to_group(&self, rows: &[Row], event: &RowAddToGroupEvent) -> Vec<Row> {
        let mut rows = rows.to_vec();
        aggregates::add_to_group(
            &mut rows,
            event.group,
            &event.rows,
            true,
            self.sink(),
            "row_add_to_group",
        );
        self.finish(rows)
    }

    /// Take rows out of a group
    #[must_use]
    pub fn apply_remove_from_group(
        &self,
        rows: &[Row],
        event: &RowRemoveFromGroupEvent,
    ) -> Vec<Row> {
        let mut rows = rows.to_vec();
        let Some(group) = rows.iter_mut().find_map(|r| match r {
            Row::Group(g) if g.id == event.group => Some(g),
            _ => None,
        }) else {
            self.sink.inconsistent(Inconsistency::GroupNotFound {
                id: event.group,
                context: "row_remove_from_group",
            });
            return rows;
        };

        for id in &event.rows {
            if group.children.contains(id) {
                group.children.retain(|c| c != id);
            } else {
                self.sink.inconsistent(Inconsistency::ChildNotFound {
                    parent: RowId::Group(event.group),
                    child: *id,
                });
            }
        }

        self.finish(rows)
    }
}
