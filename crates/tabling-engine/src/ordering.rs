//! Canonical row order
//!
//! Rules:
//! - A group row is followed by a contiguous block of its children. The
//!   block is anchored at whichever comes first: the group row itself or
//!   its first child.
//! - Children inside a block and ungrouped rows keep their relative order.
//! - Markup rows trail, in their relative order.
//!
//! [`order_rows`] is idempotent: ordering an ordered collection is a no-op.

use std::collections::{HashMap, HashSet};
use tabling_rows::{EditableRowId, GroupId, Row};

/// Reorder rows canonically
#[must_use]
pub fn order_rows(rows: Vec<Row>) -> Vec<Row> {
    // child -> owning group (first group wins if membership is duplicated)
    let mut owner: HashMap<EditableRowId, GroupId> = HashMap::new();
    for group in rows.iter().filter_map(Row::as_group) {
        for child in &group.children {
            owner.entry(*child).or_insert(group.id);
        }
    }

    let present: HashSet<EditableRowId> = rows.iter().filter_map(Row::editable_id).collect();
    owner.retain(|child, _| present.contains(child));

    let mut members: HashMap<GroupId, Vec<Row>> = HashMap::new();
    let mut groups: HashMap<GroupId, Row> = HashMap::new();
    // Anchor sequence: ungrouped rows and one slot per group block
    let mut slots: Vec<Slot> = Vec::with_capacity(rows.len());
    let mut anchored: HashSet<GroupId> = HashSet::new();
    let mut markups = Vec::new();

    for row in rows {
        match &row {
            Row::Markup(_) => markups.push(row),
            Row::Group(g) => {
                let id = g.id;
                if anchored.insert(id) {
                    slots.push(Slot::Group(id));
                }
                groups.insert(id, row);
            }
            Row::Model(_) | Row::Placeholder(_) => {
                let owning = row.editable_id().and_then(|id| owner.get(&id).copied());
                match owning {
                    Some(group) => {
                        if anchored.insert(group) {
                            slots.push(Slot::Group(group));
                        }
                        members.entry(group).or_default().push(row);
                    }
                    None => slots.push(Slot::Row(row)),
                }
            }
        }
    }

    let mut ordered = Vec::with_capacity(slots.len() + markups.len());
    for slot in slots {
        match slot {
            Slot::Row(row) => ordered.push(row),
            Slot::Group(id) => {
                if let Some(group) = groups.remove(&id) {
                    ordered.push(group);
                }
                ordered.extend(members.remove(&id).unwrap_or_default());
            }
        }
    }
    ordered.extend(markups);
    ordered
}

enum Slot {
    Row(Row),
    Group(GroupId),
}
