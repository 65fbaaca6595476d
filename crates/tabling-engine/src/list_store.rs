//! Plain list sub-stores
//!
//! Nested lists without row semantics (groups, fringes) live in a
//! [`ListStore`] and are driven by [`ListAction`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use tabling_rows::{GroupId, GroupModel, ListResponse, MarkupId, MarkupModel, Model, ModelId};

/// Item with a stable id
pub trait Identified {
    /// Id type
    type Id: Copy + PartialEq + fmt::Debug;

    /// Item id
    fn ident(&self) -> Self::Id;
}

impl Identified for Model {
    type Id = ModelId;

    fn ident(&self) -> ModelId {
        self.id
    }
}

impl Identified for GroupModel {
    type Id = GroupId;

    fn ident(&self) -> GroupId {
        self.id
    }
}

impl Identified for MarkupModel {
    type Id = MarkupId;

    fn ident(&self) -> MarkupId {
        self.id
    }
}

/// Paginated list state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListStore<M> {
    /// Items
    pub data: Vec<M>,
    /// Total on the server
    pub count: usize,
    /// Fetch in flight
    pub loading: bool,
    /// Current search
    pub search: String,
}

impl<M> Default for ListStore<M> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
            loading: false,
            search: String::new(),
        }
    }
}

/// List store transition
#[derive(Debug, Clone, PartialEq)]
pub enum ListAction<M: Identified> {
    /// Fetch started or finished
    Loading(bool),
    /// Wholesale replace
    Response(ListResponse<M>),
    /// Search text changed
    Search(String),
    /// Item created
    Added(M),
    /// Item changed; unknown items are appended
    Updated(M),
    /// Item removed
    Removed(M::Id),
    /// Back to empty
    Clear,
}

impl<M: Identified + Clone> ListStore<M> {
    /// Apply one action
    #[must_use]
    pub fn reduce(&self, action: &ListAction<M>) -> Self {
        let mut next = self.clone();
        match action {
            ListAction::Loading(loading) => next.loading = *loading,
            ListAction::Response(response) => {
                next.data.clone_from(&response.data);
                next.count = response.count;
                next.loading = false;
            }
            ListAction::Search(search) => next.search.clone_from(search),
            ListAction::Added(item) => {
                next.data.push(item.clone());
                next.count += 1;
            }
            ListAction::Updated(item) => {
                match next.data.iter_mut().find(|m| m.ident() == item.ident()) {
                    Some(existing) => *existing = item.clone(),
                    None => {
                        next.data.push(item.clone());
                        next.count += 1;
                    }
                }
            }
            ListAction::Removed(id) => {
                let before = next.data.len();
                next.data.retain(|m| m.ident() != *id);
                next.count = next.count.saturating_sub(before - next.data.len());
            }
            ListAction::Clear => next = Self::default(),
        }
        next
    }

    /// Find an item by id
    #[must_use]
    pub fn get(&self, id: M::Id) -> Option<&M> {
        self.data.iter().find(|m| m.ident() == id)
    }
}
