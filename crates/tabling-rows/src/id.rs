//! Row identifiers
//!
//! Provides the typed identifiers used to address rows within a table:
//! - [`ModelId`], [`GroupId`], [`MarkupId`]: server-assigned numeric ids
//! - [`PlaceholderId`]: client-generated id for rows awaiting persistence
//! - [`EditableRowId`]: ids of rows that accept direct edits
//! - [`RowId`]: any row in a table

use crate::error::RowError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Prefix used when rendering placeholder ids
pub const PLACEHOLDER_PREFIX: &str = "placeholder-";

/// Prefix used when rendering group row ids
pub const GROUP_PREFIX: &str = "group-";

/// Prefix used when rendering markup row ids
pub const MARKUP_PREFIX: &str = "markup-";

/// Server-assigned id of a persisted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub u64);

/// Server-assigned id of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// Server-assigned id of a markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkupId(pub u64);

/// Temporary id of a row that has not been persisted yet (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(pub Ulid);

impl PlaceholderId {
    /// Generate new placeholder id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Generate `count` fresh placeholder ids
    #[must_use]
    pub fn generate(count: usize) -> Vec<Self> {
        (0..count).map(|_| Self::new()).collect()
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ModelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{GROUP_PREFIX}{}", self.0)
    }
}

impl Display for MarkupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKUP_PREFIX}{}", self.0)
    }
}

impl Display for PlaceholderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{PLACEHOLDER_PREFIX}{}", self.0)
    }
}

/// Id of a row that accepts direct data edits
///
/// Group and markup rows are aggregates and cannot be targeted by a data
/// change, so they have no representation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EditableRowId {
    /// Row backed by a persisted model
    Model(ModelId),
    /// Row awaiting persistence
    Placeholder(PlaceholderId),
}

impl EditableRowId {
    /// Model id, if this row is persisted
    #[inline]
    #[must_use]
    pub fn model_id(&self) -> Option<ModelId> {
        match self {
            Self::Model(id) => Some(*id),
            Self::Placeholder(_) => None,
        }
    }

    /// Placeholder id, if this row is not persisted yet
    #[inline]
    #[must_use]
    pub fn placeholder_id(&self) -> Option<PlaceholderId> {
        match self {
            Self::Placeholder(id) => Some(*id),
            Self::Model(_) => None,
        }
    }
}

impl From<ModelId> for EditableRowId {
    fn from(id: ModelId) -> Self {
        Self::Model(id)
    }
}

impl From<PlaceholderId> for EditableRowId {
    fn from(id: PlaceholderId) -> Self {
        Self::Placeholder(id)
    }
}

impl Display for EditableRowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(id) => id.fmt(f),
            Self::Placeholder(id) => id.fmt(f),
        }
    }
}

/// Id of any row in a table
///
/// Unique across variants: the rendered forms never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowId {
    /// Model row
    Model(ModelId),
    /// Placeholder row
    Placeholder(PlaceholderId),
    /// Group aggregate row
    Group(GroupId),
    /// Markup aggregate row
    Markup(MarkupId),
}

impl RowId {
    /// Editable id, if the row accepts direct edits
    #[inline]
    #[must_use]
    pub fn editable(&self) -> Option<EditableRowId> {
        match self {
            Self::Model(id) => Some(EditableRowId::Model(*id)),
            Self::Placeholder(id) => Some(EditableRowId::Placeholder(*id)),
            Self::Group(_) | Self::Markup(_) => None,
        }
    }
}

impl From<EditableRowId> for RowId {
    fn from(id: EditableRowId) -> Self {
        match id {
            EditableRowId::Model(id) => Self::Model(id),
            EditableRowId::Placeholder(id) => Self::Placeholder(id),
        }
    }
}

impl From<ModelId> for RowId {
    fn from(id: ModelId) -> Self {
        Self::Model(id)
    }
}

impl From<PlaceholderId> for RowId {
    fn from(id: PlaceholderId) -> Self {
        Self::Placeholder(id)
    }
}

impl From<GroupId> for RowId {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

impl From<MarkupId> for RowId {
    fn from(id: MarkupId) -> Self {
        Self::Markup(id)
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(id) => id.fmt(f),
            Self::Placeholder(id) => id.fmt(f),
            Self::Group(id) => id.fmt(f),
            Self::Markup(id) => id.fmt(f),
        }
    }
}

impl FromStr for RowId {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RowError::InvalidRowId(s.to_string());

        if let Some(rest) = s.strip_prefix(PLACEHOLDER_PREFIX) {
            let ulid = Ulid::from_string(rest).map_err(|_| invalid())?;
            return Ok(Self::Placeholder(PlaceholderId(ulid)));
        }
        if let Some(rest) = s.strip_prefix(GROUP_PREFIX) {
            return rest
                .parse()
                .map(|id| Self::Group(GroupId(id)))
                .map_err(|_| invalid());
        }
        if let Some(rest) = s.strip_prefix(MARKUP_PREFIX) {
            return rest
                .parse()
                .map(|id| Self::Markup(MarkupId(id)))
                .map_err(|_| invalid());
        }
        s.parse()
            .map(|id| Self::Model(ModelId(id)))
            .map_err(|_| invalid())
    }
}

impl Serialize for RowId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
