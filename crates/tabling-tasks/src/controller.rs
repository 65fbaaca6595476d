//! Table controller
//!
//! Glue between the pure store and the server. Change events are applied
//! to the store right away; the matching requests then run as keyed tasks
//! and feed their outcome back as control events, field errors or
//! notifications.
//!
//! The store lock is only taken inside synchronous helpers and never held
//! across an `.await`.

use crate::api::{ApiError, GlobalError, ListQuery, TableApi};
use crate::config::TablingConfig;
use crate::error::TaskError;
use crate::notify::{Notification, NotificationBus};
use crate::tasks::{TaskKey, TaskRegistry, TaskTicket};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::sync::Arc;
use tabling_engine::{
    consolidate, CellError, ChangeEvent, ControlEvent, DataChangeEvent, GroupChange, ListAction,
    PlaceholderActivation, TableAction, TableError, TableReducer, TableStore, UpdatedModel,
};
use tabling_rows::{
    EditableRowId, GroupId, Model, ModelId, ModelRowManager, Payload, PlaceholderId,
    PlaceholderRowManager, Row, RowId, RowsExt,
};

#[derive(Debug, Clone, Copy)]
enum Pending {
    Saving,
    Creating,
}

struct State {
    store: TableStore,
    saving: usize,
    creating: usize,
}

struct Inner<A> {
    api: A,
    reducer: TableReducer,
    state: Mutex<State>,
    tasks: TaskRegistry,
    bus: NotificationBus,
    config: TablingConfig,
    /// Unsent edits per model, merged until a save succeeds
    unsaved: DashMap<ModelId, Payload>,
    /// Edits to placeholders whose create is still in flight
    pending_edits: DashMap<PlaceholderId, Payload>,
    /// Placeholders deleted while their create was in flight
    abandoned: DashSet<PlaceholderId>,
}

/// Result of a confirmed create
enum Created {
    /// Placeholder replaced by the model; carries edits still to be saved
    Activated(Option<Payload>),
    /// Placeholder was deleted meanwhile, so the model must go too
    Orphaned,
}

/// Owns one table's store and its requests
pub struct TableController<A: TableApi> {
    inner: Arc<Inner<A>>,
}

impl<A: TableApi> Clone for TableController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: TableApi> std::fmt::Debug for TableController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("reducer", &self.inner.reducer)
            .field("tasks", &self.inner.tasks)
            .finish_non_exhaustive()
    }
}

/// Keeps a saving/creating flag raised while alive
struct InFlight<A: TableApi> {
    inner: Arc<Inner<A>>,
    kind: Pending,
}

impl<A: TableApi> InFlight<A> {
    fn start(inner: &Arc<Inner<A>>, kind: Pending) -> Self {
        inner.adjust(kind, true);
        Self {
            inner: Arc::clone(inner),
            kind,
        }
    }
}

impl<A: TableApi> Drop for InFlight<A> {
    fn drop(&mut self) {
        self.inner.adjust(self.kind, false);
    }
}

impl<A: TableApi> Inner<A> {
    fn dispatch(&self, action: &TableAction) -> Result<(), TableError> {
        self.state.lock().store.dispatch(&self.reducer, action)
    }

    /// Dispatch only if the task was not superseded; returns whether it was current
    fn dispatch_current(&self, ticket: &TaskTicket, actions: &[TableAction]) -> bool {
        let mut state = self.state.lock();
        if !ticket.is_current() {
            tracing::debug!(key = %ticket.key(), "dropping result of superseded task");
            return false;
        }
        for action in actions {
            if let Err(err) = state.store.dispatch(&self.reducer, action) {
                tracing::error!(action = action.name(), error = %err, "dispatch failed");
            }
        }
        true
    }

    fn adjust(&self, kind: Pending, up: bool) {
        let mut state = self.state.lock();
        let State {
            store,
            saving,
            creating,
        } = &mut *state;
        let counter = match kind {
            Pending::Saving => saving,
            Pending::Creating => creating,
        };
        let before = *counter;
        *counter = if up { before + 1 } else { before.saturating_sub(1) };

        let action = match (kind, before, *counter) {
            (Pending::Saving, 0, 1) => Some(TableAction::SetSaving(true)),
            (Pending::Saving, 1, 0) => Some(TableAction::SetSaving(false)),
            (Pending::Creating, 0, 1) => Some(TableAction::SetCreating(true)),
            (Pending::Creating, 1, 0) => Some(TableAction::SetCreating(false)),
            _ => None,
        };
        if let Some(action) = action {
            if let Err(err) = store.dispatch(&self.reducer, &action) {
                tracing::error!(action = action.name(), error = %err, "dispatch failed");
            }
        }
    }

    fn query(&self) -> ListQuery {
        ListQuery {
            search: self.state.lock().store.search.clone(),
            page_size: self.config.page_size,
        }
    }

    fn row(&self, id: RowId) -> Option<Row> {
        self.state.lock().store.rows.find_row(id).cloned()
    }

    /// Swap a placeholder for its created model
    fn activate(&self, ticket: &TaskTicket, placeholder: PlaceholderId, model: Model) -> Option<Created> {
        let mut state = self.state.lock();
        if !ticket.is_current() {
            tracing::debug!(key = %ticket.key(), "dropping result of superseded task");
            return None;
        }
        let edits = self.pending_edits.remove(&placeholder).map(|(_, edits)| edits);
        if self.abandoned.remove(&placeholder).is_some() {
            return Some(Created::Orphaned);
        }

        let model_id = model.id;
        let actions = [
            TableAction::Control(ControlEvent::PlaceholdersActivated(vec![PlaceholderActivation {
                placeholder,
                model,
            }])),
            TableAction::ClearErrors(RowId::Model(model_id)),
        ];
        for action in &actions {
            if let Err(err) = state.store.dispatch(&self.reducer, action) {
                tracing::error!(action = action.name(), error = %err, "dispatch failed");
            }
        }
        Some(Created::Activated(edits))
    }

    /// Turn a failed request into field errors and notifications
    fn report(&self, ticket: &TaskTicket, row: Option<RowId>, operation: &'static str, err: &ApiError) {
        let classified = err.classify();
        let mut global = classified.global;
        let mut actions = Vec::new();
        match row {
            Some(row) if !classified.fields.is_empty() => {
                actions.push(TableAction::AttachErrors(
                    classified
                        .fields
                        .into_iter()
                        .map(|f| CellError {
                            row,
                            field: f.field,
                            code: f.code,
                            message: f.message,
                        })
                        .collect(),
                ));
            }
            _ => global.extend(classified.fields.into_iter().map(|f| GlobalError {
                code: f.code,
                message: format!("{}: {}", f.field, f.message),
            })),
        }

        if !self.dispatch_current(ticket, &actions) {
            return;
        }
        tracing::error!(operation, key = %ticket.key(), error = %err, "request failed");
        for error in global {
            self.bus
                .publish(Notification::error(error.message).with_code(error.code));
        }
    }
}

impl<A: TableApi> TableController<A> {
    /// Create controller with an empty store
    #[must_use]
    pub fn new(api: A, reducer: TableReducer, bus: NotificationBus, config: TablingConfig) -> Self {
        let store = TableStore::new(config.history_max_depth);
        Self {
            inner: Arc::new(Inner {
                api,
                reducer,
                state: Mutex::new(State {
                    store,
                    saving: 0,
                    creating: 0,
                }),
                tasks: TaskRegistry::new(),
                bus,
                config,
                unsaved: DashMap::new(),
                pending_edits: DashMap::new(),
                abandoned: DashSet::new(),
            }),
        }
    }

    /// Copy of the current store
    #[must_use]
    pub fn snapshot(&self) -> TableStore {
        self.inner.state.lock().store.clone()
    }

    /// Read the store without copying it
    pub fn read<R>(&self, f: impl FnOnce(&TableStore) -> R) -> R {
        f(&self.inner.state.lock().store)
    }

    /// Notification bus failures are published to
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    /// In-flight requests
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.inner.tasks
    }

    /// Reducer the store runs through
    #[inline]
    #[must_use]
    pub fn reducer(&self) -> &TableReducer {
        &self.inner.reducer
    }

    /// Wait for every in-flight request
    pub async fn settle(&self) {
        self.inner.tasks.settle().await;
    }

    /// Dispatch a plain store action (sub-stores, errors, flags)
    ///
    /// # Errors
    /// Returns the reducer's contract violations
    pub fn dispatch(&self, action: &TableAction) -> Result<(), TaskError> {
        self.inner.dispatch(action).map_err(TaskError::from)
    }

    /// Fetch the table, superseding any fetch in flight
    pub fn request(&self) -> TaskTicket {
        if let Err(err) = self.inner.dispatch(&TableAction::SetLoading(true)) {
            tracing::error!(error = %err, "dispatch failed");
        }
        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(TaskKey::List, move |ticket| async move {
            let query = inner.query();
            tracing::info!(search = %query.search, page_size = query.page_size, "fetching table");
            match inner.api.list(&query).await {
                Ok(response) => {
                    inner.dispatch_current(&ticket, &[TableAction::Response(response)]);
                }
                Err(err) => {
                    inner.report(&ticket, None, "list", &err);
                    inner.dispatch_current(&ticket, &[TableAction::SetLoading(false)]);
                }
            }
        })
    }

    /// Change the search and refetch once typing settles
    pub fn set_search(&self, search: impl Into<String>) -> TaskTicket {
        if let Err(err) = self.inner.dispatch(&TableAction::SetSearch(search.into())) {
            tracing::error!(error = %err, "dispatch failed");
        }
        let debounce = self.inner.config.search_debounce();
        let controller = self.clone();
        self.inner.tasks.spawn(TaskKey::Search, move |ticket| async move {
            tokio::time::sleep(debounce).await;
            if ticket.is_current() {
                controller.request();
            }
        })
    }

    /// Apply a change locally, then persist it
    ///
    /// # Errors
    /// Returns error if the reducer rejects the event; nothing is sent then
    pub fn handle_change(&self, event: ChangeEvent) -> Result<(), TaskError> {
        self.inner.dispatch(&TableAction::Change(event.clone()))?;
        tracing::debug!(event = event.name(), "change applied, persisting");

        match &event {
            ChangeEvent::DataChange(data) => self.persist_data(data),
            ChangeEvent::RowAdd(add) => {
                for id in &add.placeholder_ids {
                    self.persist_placeholder(*id, Payload::default());
                }
            }
            ChangeEvent::RowDelete(delete) => {
                for id in &delete.rows {
                    self.persist_delete(*id);
                }
            }
            ChangeEvent::RowAddToGroup(e) => self.persist_group(e.group),
            ChangeEvent::RowRemoveFromGroup(e) => self.persist_group(e.group),
        }
        Ok(())
    }

    /// Undo the last change and persist the restored values
    pub fn undo(&self) -> bool {
        self.step(TableAction::Undo)
    }

    /// Redo the next change and persist it
    pub fn redo(&self) -> bool {
        self.step(TableAction::Redo)
    }

    /// Cancel every request and reset the store
    pub fn clear(&self) {
        self.inner.tasks.cancel_all();
        self.inner.unsaved.clear();
        self.inner.pending_edits.clear();
        self.inner.abandoned.clear();
        if let Err(err) = self.inner.dispatch(&TableAction::Clear) {
            tracing::error!(error = %err, "dispatch failed");
        }
    }

    fn step(&self, action: TableAction) -> bool {
        let replayed: Option<DataChangeEvent> = {
            let mut state = self.inner.state.lock();
            let pending = match action {
                TableAction::Undo => state.store.history.pending_undo(),
                _ => state.store.history.pending_redo(),
            };
            if pending.is_some() {
                if let Err(err) = state.store.dispatch(&self.inner.reducer, &action) {
                    tracing::error!(action = action.name(), error = %err, "dispatch failed");
                }
            }
            pending
        };
        match replayed {
            Some(event) => {
                self.persist_data(&event);
                true
            }
            None => false,
        }
    }

    fn persist_data(&self, event: &DataChangeEvent) {
        for change in consolidate(event) {
            let payload = ModelRowManager::payload_from_changes(
                change
                    .fields
                    .iter()
                    .map(|(field, cell)| (field.as_str(), &cell.new_value)),
                self.inner.reducer.schema(),
            );
            match change.id {
                EditableRowId::Model(id) => {
                    if !payload.is_empty() {
                        self.persist_model(id, payload);
                    }
                }
                EditableRowId::Placeholder(id) => self.persist_placeholder(id, payload),
            }
        }
    }

    fn persist_model(&self, id: ModelId, changes: Payload) {
        if self.inner.row(RowId::Model(id)).is_none() {
            return;
        }
        let payload = {
            let mut unsaved = self.inner.unsaved.entry(id).or_default();
            unsaved.0.extend(changes.0);
            unsaved.value().clone()
        };

        let inner = Arc::clone(&self.inner);
        self.inner
            .tasks
            .spawn(TaskKey::Row(RowId::Model(id)), move |ticket| async move {
                let _flight = InFlight::start(&inner, Pending::Saving);
                match inner.api.update(id, &payload).await {
                    Ok(model) => {
                        let applied = inner.dispatch_current(
                            &ticket,
                            &[
                                TableAction::Control(ControlEvent::ModelsUpdated(vec![
                                    UpdatedModel::Model {
                                        model,
                                        group: GroupChange::Unchanged,
                                    },
                                ])),
                                TableAction::ClearErrors(RowId::Model(id)),
                            ],
                        );
                        if applied {
                            inner.unsaved.remove(&id);
                        }
                    }
                    Err(err) => inner.report(&ticket, Some(RowId::Model(id)), "update", &err),
                }
            });
    }

    fn persist_placeholder(&self, id: PlaceholderId, changes: Payload) {
        let key = TaskKey::Row(RowId::Placeholder(id));
        let payload = {
            let state = self.inner.state.lock();
            let Some(Row::Placeholder(row)) = state.store.rows.find_row(RowId::Placeholder(id)) else {
                return;
            };
            if self.inner.tasks.is_running(key) {
                // A second create would duplicate the line item on the server
                tracing::debug!(placeholder = %id, "create in flight, deferring edit");
                self.inner.pending_edits.entry(id).or_default().0.extend(changes.0);
                return;
            }
            self.inner.pending_edits.remove(&id);
            PlaceholderRowManager::payload(row, self.inner.reducer.schema())
        };

        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(key, move |ticket| async move {
            let _flight = InFlight::start(&inner, Pending::Creating);
            match inner.api.create(&payload).await {
                Ok(model) => {
                    let model_id = model.id;
                    tracing::info!(placeholder = %id, model = %model_id, "row created");
                    let controller = TableController {
                        inner: Arc::clone(&inner),
                    };
                    match inner.activate(&ticket, id, model) {
                        Some(Created::Activated(Some(edits))) => controller.persist_model(model_id, edits),
                        Some(Created::Orphaned) => controller.persist_delete(RowId::Model(model_id)),
                        Some(Created::Activated(None)) | None => {}
                    }
                }
                Err(err) => {
                    // The placeholder keeps every edit; the next create sends them all
                    inner.pending_edits.remove(&id);
                    inner.abandoned.remove(&id);
                    inner.report(&ticket, Some(RowId::Placeholder(id)), "create", &err);
                }
            }
        });
    }

    fn persist_delete(&self, id: RowId) {
        let inner = Arc::clone(&self.inner);
        match id {
            RowId::Placeholder(placeholder) => {
                self.inner.pending_edits.remove(&placeholder);
                // The server may already hold the row; delete it once the create answers
                if self.inner.tasks.is_running(TaskKey::Row(id)) {
                    self.inner.abandoned.insert(placeholder);
                }
            }
            RowId::Model(model) => {
                self.inner.unsaved.remove(&model);
                self.inner.tasks.spawn(TaskKey::Row(id), move |ticket| async move {
                    let _flight = InFlight::start(&inner, Pending::Saving);
                    if let Err(err) = inner.api.delete(model).await {
                        inner.report(&ticket, None, "delete", &err);
                    }
                });
            }
            RowId::Group(group) => {
                self.inner.tasks.spawn(TaskKey::Group(group), move |ticket| async move {
                    let _flight = InFlight::start(&inner, Pending::Saving);
                    match inner.api.delete_group(group).await {
                        Ok(()) => {
                            inner.dispatch_current(
                                &ticket,
                                &[TableAction::Groups(ListAction::Removed(group))],
                            );
                        }
                        Err(err) => inner.report(&ticket, None, "delete_group", &err),
                    }
                });
            }
            RowId::Markup(markup) => {
                self.inner.tasks.spawn(TaskKey::Markup(markup), move |ticket| async move {
                    let _flight = InFlight::start(&inner, Pending::Saving);
                    if let Err(err) = inner.api.delete_markup(markup).await {
                        inner.report(&ticket, None, "delete_markup", &err);
                    }
                });
            }
        }
    }

    fn persist_group(&self, group: GroupId) {
        let Some(Row::Group(row)) = self.inner.row(RowId::Group(group)) else {
            return;
        };
        // Placeholders join the group on the server once they are created
        let children: Vec<ModelId> = row.children.iter().filter_map(EditableRowId::model_id).collect();

        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(TaskKey::Group(group), move |ticket| async move {
            let _flight = InFlight::start(&inner, Pending::Saving);
            match inner.api.update_group(group, &children).await {
                Ok(model) => {
                    inner.dispatch_current(&ticket, &[TableAction::Groups(ListAction::Updated(model))]);
                }
                Err(err) => inner.report(&ticket, Some(RowId::Group(group)), "update_group", &err),
            }
        });
    }
}
