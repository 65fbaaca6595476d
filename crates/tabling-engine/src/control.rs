//! Control event reducer
//!
//! Reconciles optimistic rows with server-confirmed models. A batch is
//! applied item by item and refreshed and ordered once at the end.

use crate::aggregates;
use crate::event::{AddedModel, ControlEvent, GroupChange, PlaceholderActivation, UpdatedModel};
use crate::reducer::TableReducer;
use tabling_rows::{
    EditableRowId, GroupModel, GroupRowManager, Inconsistency, MarkupModel, MarkupRowManager,
    Model, ModelRowManager, Row, RowId, RowsExt,
};

/// Replace the row with the same id in place, or append it
fn upsert(rows: &mut Vec<Row>, row: Row) {
    match rows.position_of(row.id()) {
        Some(index) => rows[index] = row,
        None => rows.push(row),
    }
}

impl TableReducer {
    /// Apply a control event
    #[must_use]
    pub fn apply_control(&self, rows: &[Row], event: &ControlEvent) -> Vec<Row> {
        tracing::debug!(event = event.name(), rows = rows.len(), "applying control event");
        let mut rows = rows.to_vec();
        match event {
            ControlEvent::PlaceholdersActivated(activations) => {
                for activation in activations {
                    self.activate(&mut rows, activation);
                }
            }
            ControlEvent::ModelsAdded(added) => {
                for item in added {
                    match item {
                        AddedModel::Model { model, group } => {
                            upsert(&mut rows, Row::Model(ModelRowManager::create(model, &self.schema)));
                            if let Some(group) = group {
                                aggregates::add_to_group(
                                    &mut rows,
                                    *group,
                                    &[EditableRowId::Model(model.id)],
                                    false,
                                    self.sink(),
                                    "models_added",
                                );
                            }
                        }
                        AddedModel::Group(group) => self.upsert_group(&mut rows, group),
                        AddedModel::Markup(markup) => self.upsert_markup(&mut rows, markup),
                    }
                }
            }
            ControlEvent::ModelsUpdated(updated) => {
                for item in updated {
                    match item {
                        UpdatedModel::Model { model, group } => {
                            self.update_model(&mut rows, model, *group);
                        }
                        UpdatedModel::Group(group) => self.upsert_group(&mut rows, group),
                        UpdatedModel::Markup(markup) => self.upsert_markup(&mut rows, markup),
                    }
                }
            }
        }
        self.finish(rows)
    }

    /// Swap a placeholder for its persisted model, keeping its position
    fn activate(&self, rows: &mut Vec<Row>, activation: &PlaceholderActivation) {
        let placeholder = activation.placeholder;
        let Some(index) = rows.position_of(RowId::Placeholder(placeholder)) else {
            self.sink
                .inconsistent(Inconsistency::PlaceholderNotFound { id: placeholder });
            return;
        };

        let model_id = activation.model.id;
        let row = Row::Model(ModelRowManager::create(&activation.model, &self.schema));
        match rows.position_of(RowId::Model(model_id)) {
            Some(existing) => {
                tracing::debug!(%placeholder, model = %model_id, "model already present, dropping placeholder");
                rows[existing] = row;
                rows.remove(index);
            }
            None => rows[index] = row,
        }
        aggregates::rename_child(
            rows,
            EditableRowId::Placeholder(placeholder),
            EditableRowId::Model(model_id),
        );
    }

    /// Replace a model row's content and apply its membership change
    fn update_model(&self, rows: &mut Vec<Row>, model: &Model, group: GroupChange) {
        let Some(index) = rows.position_of(RowId::Model(model.id)) else {
            self.sink.inconsistent(Inconsistency::RowNotFound {
                id: RowId::Model(model.id),
                context: "models_updated",
            });
            return;
        };
        rows[index] = Row::Model(ModelRowManager::create(model, &self.schema));

        let id = EditableRowId::Model(model.id);
        match group {
            GroupChange::Unchanged => {}
            GroupChange::Removed => aggregates::strip_from_groups(rows, &[id], None),
            GroupChange::MoveTo(group) => {
                aggregates::add_to_group(rows, group, &[id], false, self.sink(), "models_updated");
            }
        }
    }

    /// Insert or replace a group row; its children leave any other group
    fn upsert_group(&self, rows: &mut Vec<Row>, group: &GroupModel) {
        let row = GroupRowManager::create(group, rows, &self.schema, self.sink());
        aggregates::strip_from_groups(rows, &row.children, Some(group.id));
        upsert(rows, Row::Group(row));
    }

    /// Insert or replace a markup row; its children leave any other markup
    fn upsert_markup(&self, rows: &mut Vec<Row>, markup: &MarkupModel) {
        let row = MarkupRowManager::create(markup, rows, &self.schema, self.sink());
        aggregates::strip_from_markups(rows, &row.children, Some(markup.id));
        upsert(rows, Row::Markup(row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeEvent, RowAddEvent, RowAddToGroupEvent};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tabling_rows::{
        CellValue, Column, GroupId, MarkupId, ModelId, PlaceholderId, RecordingSink, TableResponse,
        TableSchema,
    };

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::body("description", "Description"),
            Column::calculated("estimated", "Estimated").summed(),
            Column::calculated("markup_contribution", "Markup").summed(),
        ])
        .unwrap()
    }

    fn reducer() -> TableReducer {
        TableReducer::new(schema())
    }

    fn model(id: u64, estimated: f64) -> Model {
        Model::new(ModelId(id)).with("estimated", estimated)
    }

    fn table(models: Vec<Model>) -> Vec<Row> {
        reducer().populate(&TableResponse {
            count: models.len(),
            models,
            ..TableResponse::default()
        })
    }

    fn m(id: u64) -> EditableRowId {
        EditableRowId::Model(ModelId(id))
    }

    fn ids(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.id().to_string()).collect()
    }

    fn with_placeholder(rows: &[Row], index: usize) -> (Vec<Row>, PlaceholderId) {
        let event = RowAddEvent::at(index, 1);
        let placeholder = event.placeholder_ids[0];
        let outcome = reducer().apply_change(rows, &ChangeEvent::RowAdd(event)).unwrap();
        (outcome.rows, placeholder)
    }

    #[test]
    fn activation_replaces_placeholder_in_place() {
        let (rows, placeholder) = with_placeholder(&table(vec![model(1, 1.0), model(2, 2.0)]), 1);
        assert_eq!(rows[1].id(), RowId::Placeholder(placeholder));

        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
                placeholder,
                model: model(40, 5.0),
            }]),
        );
        assert_eq!(ids(&rows), vec!["1", "40", "2"]);
        assert_eq!(rows[1].get("estimated"), &CellValue::Number(5.0));
    }

    #[test]
    fn activation_rewrites_group_children() {
        let (rows, placeholder) = with_placeholder(&table(vec![model(1, 1.0)]), 1);
        let rows = reducer().apply_add_to_group(
            &rows,
            &RowAddToGroupEvent {
                group: GroupId(1),
                rows: vec![m(1), EditableRowId::Placeholder(placeholder)],
            },
        );
        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
                placeholder,
                model: model(9, 4.0),
            }]),
        );
        let group = rows[0].as_group().unwrap();
        assert_eq!(group.children, vec![m(1), m(9)]);
        assert_eq!(group.data["estimated"], CellValue::Number(5.0));
    }

    #[test]
    fn activation_of_missing_placeholder_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        let rows = table(vec![model(1, 1.0)]);
        let out = reducer().with_sink(sink.clone()).apply_control(
            &rows,
            &ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
                placeholder: PlaceholderId::new(),
                model: model(2, 1.0),
            }]),
        );
        assert_eq!(out, rows);
        assert_eq!(sink.reports()[0].kind(), "placeholder_not_found");
    }

    #[test]
    fn activation_onto_existing_model_drops_placeholder() {
        let (rows, placeholder) = with_placeholder(&table(vec![model(1, 1.0)]), 0);
        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
                placeholder,
                model: model(1, 7.0),
            }]),
        );
        assert_eq!(ids(&rows), vec!["1"]);
        assert_eq!(rows[0].get("estimated"), &CellValue::Number(7.0));
    }

    #[test]
    fn added_group_takes_children_from_prior_group() {
        let rows = table(vec![model(1, 1.0), model(2, 2.0)]);
        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::ModelsAdded(vec![
                AddedModel::Group(GroupModel::new(GroupId(1), "A", vec![ModelId(1), ModelId(2)])),
                AddedModel::Group(GroupModel::new(GroupId(2), "B", vec![ModelId(2)])),
            ]),
        );
        assert_eq!(rows.group_of(m(1)).map(|g| g.id), Some(GroupId(1)));
        assert_eq!(rows.group_of(m(2)).map(|g| g.id), Some(GroupId(2)));
        assert_eq!(ids(&rows), vec!["group-1", "1", "group-2", "2"]);
    }

    #[test]
    fn added_model_routes_into_group() {
        let rows = reducer().apply_control(
            &table(vec![model(1, 1.0)]),
            &ControlEvent::ModelsAdded(vec![
                AddedModel::Group(GroupModel::new(GroupId(3), "A", vec![])),
                AddedModel::Model {
                    model: model(2, 2.0),
                    group: Some(GroupId(3)),
                },
            ]),
        );
        assert_eq!(ids(&rows), vec!["1", "group-3", "2"]);
        assert_eq!(rows[1].get("estimated"), &CellValue::Number(2.0));
    }

    #[test]
    fn added_model_into_unknown_group_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        let rows = reducer().with_sink(sink.clone()).apply_control(
            &[],
            &ControlEvent::ModelsAdded(vec![AddedModel::Model {
                model: model(2, 2.0),
                group: Some(GroupId(3)),
            }]),
        );
        assert_eq!(ids(&rows), vec!["2"]);
        assert_eq!(sink.reports()[0].kind(), "group_not_found");
    }

    #[test]
    fn updated_model_replaces_content_and_moves_group() {
        let rows = reducer().apply_control(
            &table(vec![model(1, 1.0), model(2, 2.0)]),
            &ControlEvent::ModelsAdded(vec![
                AddedModel::Group(GroupModel::new(GroupId(1), "A", vec![ModelId(1), ModelId(2)])),
                AddedModel::Group(GroupModel::new(GroupId(2), "B", vec![])),
            ]),
        );
        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::ModelsUpdated(vec![UpdatedModel::Model {
                model: model(2, 10.0),
                group: GroupChange::MoveTo(GroupId(2)),
            }]),
        );
        let g1 = rows.iter().filter_map(Row::as_group).find(|g| g.id == GroupId(1)).unwrap();
        let g2 = rows.iter().filter_map(Row::as_group).find(|g| g.id == GroupId(2)).unwrap();
        assert_eq!(g1.data["estimated"], CellValue::Number(1.0));
        assert_eq!(g2.data["estimated"], CellValue::Number(10.0));
    }

    #[test]
    fn updated_model_removed_from_group() {
        let rows = reducer().apply_control(
            &table(vec![model(1, 1.0)]),
            &ControlEvent::ModelsAdded(vec![AddedModel::Group(GroupModel::new(
                GroupId(1),
                "A",
                vec![ModelId(1)],
            ))]),
        );
        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::ModelsUpdated(vec![UpdatedModel::Model {
                model: model(1, 1.0),
                group: GroupChange::Removed,
            }]),
        );
        assert!(rows.group_of(m(1)).is_none());
    }

    #[test]
    fn updated_unknown_model_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        let rows = reducer().with_sink(sink.clone()).apply_control(
            &table(vec![model(1, 1.0)]),
            &ControlEvent::ModelsUpdated(vec![UpdatedModel::Model {
                model: model(5, 1.0),
                group: GroupChange::Unchanged,
            }]),
        );
        assert_eq!(ids(&rows), vec!["1"]);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn updated_markup_recomputes_contributions() {
        let rows = reducer().apply_control(
            &table(vec![model(1, 100.0), model(2, 50.0)]),
            &ControlEvent::ModelsAdded(vec![AddedModel::Markup(MarkupModel::percent(
                MarkupId(1),
                0.1,
                vec![ModelId(1)],
            ))]),
        );
        assert_eq!(rows[0].get("markup_contribution"), &CellValue::Number(10.0));

        let rows = reducer().apply_control(
            &rows,
            &ControlEvent::ModelsUpdated(vec![UpdatedModel::Markup(MarkupModel::percent(
                MarkupId(1),
                0.2,
                vec![ModelId(1), ModelId(2)],
            ))]),
        );
        assert_eq!(rows[0].get("markup_contribution"), &CellValue::Number(20.0));
        assert_eq!(rows[1].get("markup_contribution"), &CellValue::Number(10.0));
        assert_eq!(rows[2].get("estimated"), &CellValue::Number(30.0));
    }
}
