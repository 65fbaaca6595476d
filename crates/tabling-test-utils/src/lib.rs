//! Testing utilities for the tabling workspace
//!
//! Shared schema, fixtures and an in-memory [`TableApi`].

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabling_engine::{BudgetRecalculation, RecalculateRow, TableReducer};
use tabling_rows::{
    Column, GroupId, GroupModel, MarkupId, MarkupModel, Model, ModelId, Payload, TableResponse,
    TableSchema,
};
use tabling_tasks::{ApiError, ListQuery, NotificationBus, TableApi, TableController, TablingConfig};

/// Sub-account style schema
pub fn budget_schema() -> TableSchema {
    TableSchema::new(vec![
        Column::body("identifier", "Account"),
        Column::body("description", "Description"),
        Column::body("quantity", "Qty").with_default(1.0),
        Column::body("rate", "Rate"),
        Column::body("multiplier", "X"),
        Column::calculated("estimated", "Estimated").summed(),
        Column::read_only("actual", "Actual").summed(),
        Column::calculated("variance", "Variance").summed(),
        Column::calculated("markup_contribution", "Markup").summed(),
    ])
    .unwrap()
}

pub fn budget_reducer() -> TableReducer {
    TableReducer::new(budget_schema()).with_recalculate(BudgetRecalculation::new())
}

/// Line item with quantity 1 and the given rate
pub fn line_item(id: u64, description: &str, rate: f64) -> Model {
    Model::new(ModelId(id))
        .with("description", description)
        .with("quantity", 1.0)
        .with("rate", rate)
        .with("estimated", rate)
        .with("variance", rate)
}

/// Three line items, the first two grouped, with a 10% markup on the third
pub fn budget_response() -> TableResponse {
    TableResponse {
        models: vec![
            line_item(1, "Camera", 100.0),
            line_item(2, "Lenses", 50.0),
            line_item(3, "Catering", 200.0),
        ],
        groups: vec![GroupModel::new(GroupId(1), "Equipment", vec![ModelId(1), ModelId(2)])],
        markups: vec![MarkupModel::percent(MarkupId(1), 0.1, vec![ModelId(3)])],
        count: 3,
    }
}

/// Recorded request
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    List(ListQuery),
    Create(Payload),
    Update(ModelId, Payload),
    Delete(ModelId),
    UpdateGroup(GroupId, Vec<ModelId>),
    DeleteGroup(GroupId),
    DeleteMarkup(MarkupId),
}

#[derive(Debug, Default)]
struct FakeState {
    response: Mutex<TableResponse>,
    models: Mutex<BTreeMap<ModelId, Model>>,
    calls: Mutex<Vec<ApiCall>>,
    failures: Mutex<VecDeque<ApiError>>,
    delay: Mutex<Duration>,
    next_id: AtomicU64,
}

/// In-memory server; clones share state
#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    state: Arc<FakeState>,
}

impl FakeApi {
    pub fn new(response: TableResponse) -> Self {
        let next = response.models.iter().map(|m| m.id.0).max().unwrap_or(0) + 1;
        let api = Self::default();
        api.state.next_id.store(next, Ordering::SeqCst);
        *api.state.models.lock() = response.models.iter().map(|m| (m.id, m.clone())).collect();
        *api.state.response.lock() = response;
        api
    }

    /// Every call waits this long before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock() = delay;
        self
    }

    /// Fail the next call, whatever it is
    pub fn fail_next(&self, error: ApiError) {
        self.state.failures.lock().push_back(error);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.state.calls.lock().clear();
    }

    pub fn model(&self, id: ModelId) -> Option<Model> {
        self.state.models.lock().get(&id).cloned()
    }

    async fn call(&self, call: ApiCall) -> Result<(), ApiError> {
        self.state.calls.lock().push(call);
        let delay = *self.state.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.state.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn store(&self, mut model: Model) -> Model {
        let derived = BudgetRecalculation::new().recalculate(&model.attributes, &budget_schema());
        model.attributes.extend(derived);
        self.state.models.lock().insert(model.id, model.clone());
        model
    }
}

#[async_trait]
impl TableApi for FakeApi {
    async fn list(&self, query: &ListQuery) -> Result<TableResponse, ApiError> {
        self.call(ApiCall::List(query.clone())).await?;
        let mut response = self.state.response.lock().clone();
        response.models = self
            .state
            .models
            .lock()
            .values()
            .filter(|m| {
                query.search.is_empty()
                    || m.get("description").to_string().to_lowercase().contains(&query.search.to_lowercase())
            })
            .cloned()
            .collect();
        response.count = response.models.len();
        Ok(response)
    }

    async fn create(&self, payload: &Payload) -> Result<Model, ApiError> {
        self.call(ApiCall::Create(payload.clone())).await?;
        let id = ModelId(self.state.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(self.store(Model {
            id,
            attributes: payload.0.clone(),
        }))
    }

    async fn update(&self, id: ModelId, payload: &Payload) -> Result<Model, ApiError> {
        self.call(ApiCall::Update(id, payload.clone())).await?;
        let mut model = self.model(id).unwrap_or_else(|| Model::new(id));
        model.attributes.extend(payload.0.clone());
        Ok(self.store(model))
    }

    async fn delete(&self, id: ModelId) -> Result<(), ApiError> {
        self.call(ApiCall::Delete(id)).await?;
        self.state.models.lock().remove(&id);
        Ok(())
    }

    async fn update_group(&self, id: GroupId, children: &[ModelId]) -> Result<GroupModel, ApiError> {
        self.call(ApiCall::UpdateGroup(id, children.to_vec())).await?;
        let mut response = self.state.response.lock();
        let name = response
            .groups
            .iter()
            .find(|g| g.id == id)
            .map_or_else(|| format!("Group {}", id.0), |g| g.name.clone());
        let group = GroupModel::new(id, name, children.to_vec());
        response.groups.retain(|g| g.id != id);
        response.groups.push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), ApiError> {
        self.call(ApiCall::DeleteGroup(id)).await?;
        self.state.response.lock().groups.retain(|g| g.id != id);
        Ok(())
    }

    async fn delete_markup(&self, id: MarkupId) -> Result<(), ApiError> {
        self.call(ApiCall::DeleteMarkup(id)).await?;
        self.state.response.lock().markups.retain(|m| m.id != id);
        Ok(())
    }
}

/// Controller over a [`FakeApi`] seeded with [`budget_response`]
pub fn setup_controller(bus: NotificationBus) -> (TableController<FakeApi>, FakeApi) {
    setup_controller_with(FakeApi::new(budget_response()), bus)
}

pub fn setup_controller_with(api: FakeApi, bus: NotificationBus) -> (TableController<FakeApi>, FakeApi) {
    let controller = TableController::new(api.clone(), budget_reducer(), bus, TablingConfig::default());
    (controller, api)
}
