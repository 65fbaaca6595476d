//! Shared membership and aggregate bookkeeping
//!
//! Used by both reducers so group/markup membership is enforced through a
//! single path.

use tabling_rows::{
    CellValue, DiagnosticSink, EditableRowId, GroupId, GroupRow, GroupRowManager, Inconsistency,
    MarkupId, MarkupRow, MarkupRowManager, Row, RowData, TableSchema,
};

/// Remove rows from every group except `except`
pub(crate) fn strip_from_groups(rows: &mut [Row], ids: &[EditableRowId], except: Option<GroupId>) {
    for row in rows.iter_mut() {
        if let Row::Group(group) = row {
            if Some(group.id) != except {
                group.children.retain(|c| !ids.contains(c));
            }
        }
    }
}

/// Remove rows from every markup except `except`
pub(crate) fn strip_from_markups(
    rows: &mut [Row],
    ids: &[EditableRowId],
    except: Option<MarkupId>,
) {
    for row in rows.iter_mut() {
        if let Row::Markup(markup) = row {
            if Some(markup.id) != except {
                markup.children.retain(|c| !ids.contains(c));
            }
        }
    }
}

/// Route rows into a group, enforcing single-group membership
///
/// Rows not present in the table are reported and skipped. When the group
/// does not exist it is created empty if `create_missing`, otherwise the
/// call is reported and ignored. Returns whether the group exists afterwards.
pub(crate) fn add_to_group(
    rows: &mut Vec<Row>,
    group: GroupId,
    ids: &[EditableRowId],
    create_missing: bool,
    sink: &dyn DiagnosticSink,
    context: &'static str,
) -> bool {
    let exists = rows.iter().any(|r| matches!(r, Row::Group(g) if g.id == group));
    if !exists {
        if !create_missing {
            sink.inconsistent(Inconsistency::GroupNotFound { id: group, context });
            return false;
        }
        tracing::debug!(group = %group, "creating group row for membership change");
        rows.push(Row::Group(GroupRow {
            id: group,
            name: String::new(),
            color: None,
            children: Vec::new(),
            data: RowData::new(),
        }));
    }

    let present: Vec<EditableRowId> = ids
        .iter()
        .copied()
        .filter(|id| {
            let found = rows.iter().any(|r| r.editable_id() == Some(*id));
            if !found {
                sink.inconsistent(Inconsistency::RowNotFound {
                    id: (*id).into(),
                    context,
                });
            }
            found
        })
        .collect();

    strip_from_groups(rows, &present, Some(group));
    for row in rows.iter_mut() {
        if let Row::Group(g) = row {
            if g.id == group {
                for id in &present {
                    if !g.children.contains(id) {
                        g.children.push(*id);
                    }
                }
            }
        }
    }
    true
}

/// Replace references to `from` with `to` in every aggregate's children
pub(crate) fn rename_child(rows: &mut [Row], from: EditableRowId, to: EditableRowId) {
    for row in rows.iter_mut() {
        let children = match row {
            Row::Group(g) => &mut g.children,
            Row::Markup(m) => &mut m.children,
            Row::Model(_) | Row::Placeholder(_) => continue,
        };
        for child in children.iter_mut() {
            if *child == from {
                *child = to;
            }
        }
        let mut seen = Vec::with_capacity(children.len());
        children.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(*c);
                true
            }
        });
    }
}

/// Recompute child markup contributions, then group and markup aggregates
pub(crate) fn refresh(rows: &mut [Row], schema: &TableSchema, sink: &dyn DiagnosticSink) {
    let contribution_field = schema.markup_fields().contribution.clone();
    if schema.column(&contribution_field).is_some() {
        let markups: Vec<MarkupRow> = rows
            .iter()
            .filter_map(Row::as_markup)
            .cloned()
            .collect();
        let markup_refs: Vec<&MarkupRow> = markups.iter().collect();
        for row in rows.iter_mut() {
            if row.editable_id().is_none() {
                continue;
            }
            let value = MarkupRowManager::contribution(row, &markup_refs, schema);
            if let Some(data) = row.editable_data_mut() {
                data.insert(contribution_field.clone(), CellValue::Number(value));
            }
        }
    }

    let refreshed: Vec<(usize, Row)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| match row {
            Row::Group(g) => Some((i, Row::Group(GroupRowManager::refreshed(g, rows, schema, sink)))),
            Row::Markup(m) => Some((
                i,
                Row::Markup(MarkupRowManager::refreshed(m, rows, schema, sink)),
            )),
            Row::Model(_) | Row::Placeholder(_) => None,
        })
        .collect();
    for (i, row) in refreshed {
        rows[i] = row;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabling_rows::{Column, ModelId, ModelRow, NullSink, RecordingSink, RowsExt};

    fn model(id: u64) -> Row {
        Row::Model(ModelRow {
            id: ModelId(id),
            model_id: ModelId(id),
            data: RowData::new(),
        })
    }

    fn m(id: u64) -> EditableRowId {
        EditableRowId::Model(ModelId(id))
    }

    #[test]
    fn add_to_group_moves_rows_out_of_other_groups() {
        let mut rows = vec![model(1), model(2)];
        assert!(add_to_group(&mut rows, GroupId(1), &[m(1), m(2)], true, &NullSink, "test"));
        assert!(add_to_group(&mut rows, GroupId(2), &[m(2)], true, &NullSink, "test"));

        assert_eq!(rows.group_of(m(1)).map(|g| g.id), Some(GroupId(1)));
        assert_eq!(rows.group_of(m(2)).map(|g| g.id), Some(GroupId(2)));
        let first = rows.iter().filter_map(Row::as_group).find(|g| g.id == GroupId(1)).unwrap();
        assert_eq!(first.children, vec![m(1)]);
    }

    #[test]
    fn add_to_missing_group_without_create_is_reported() {
        let mut rows = vec![model(1)];
        let sink = RecordingSink::new();
        assert!(!add_to_group(&mut rows, GroupId(3), &[m(1)], false, &sink, "test"));
        assert_eq!(sink.len(), 1);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn rename_child_rewrites_and_deduplicates() {
        let mut rows = vec![Row::Group(GroupRow {
            id: GroupId(1),
            name: String::new(),
            color: None,
            children: vec![m(1), m(2)],
            data: RowData::new(),
        })];
        rename_child(&mut rows, m(2), m(1));
        assert_eq!(rows[0].as_group().unwrap().children, vec![m(1)]);
    }

    #[test]
    fn refresh_sets_contributions_for_every_editable_row() {
        let schema = TableSchema::new(vec![
            Column::calculated("estimated", "Estimated").summed(),
            Column::calculated("markup_contribution", "Markup").summed(),
        ])
        .unwrap();
        let mut rows = vec![model(1)];
        refresh(&mut rows, &schema, &NullSink);
        assert_eq!(rows[0].get("markup_contribution"), &CellValue::Number(0.0));
    }
}
