//! Change consolidation
//!
//! Multiple changes to the same row inside one event are merged before they
//! are applied: the last new value wins per field, the first old value is
//! kept so the merged change still inverts to the original state.

use crate::event::{DataChangeEvent, RowChange};

/// Merge changes targeting the same row, keeping first-seen row order
#[must_use]
pub fn consolidate(event: &DataChangeEvent) -> Vec<RowChange> {
    let mut merged: Vec<RowChange> = Vec::new();

    for change in &event.changes {
        let Some(existing) = merged.iter_mut().find(|m| m.id == change.id) else {
            merged.push(change.clone());
            continue;
        };
        for (field, cell) in &change.fields {
            existing
                .fields
                .entry(field.clone())
                .and_modify(|c| c.new_value = cell.new_value.clone())
                .or_insert_with(|| cell.clone());
        }
    }

    merged
}
