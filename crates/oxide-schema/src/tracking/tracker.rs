//! The descriptor ledger.
//!
//! For every (object, descriptor) pair changed in the current batch the
//! tracker keeps the value observed before the batch started. Objects
//! created in the batch have no "before", so their property changes are
//! not recorded; the plan reads their current state instead.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::{IndexColumn, ObjectId, ViewQuery};
use crate::expr::Expr;
use crate::types::{DataType, ForeignKeyAction};

/// A trackable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Descriptor {
    /// Object name.
    Name,
    /// Column nullability.
    IsNullable,
    /// Column default.
    DefaultValue,
    /// Column type.
    DataType,
    /// Index filter.
    Filter,
    /// Index uniqueness.
    IsUnique,
    /// Index column list.
    IndexColumns,
    /// Foreign key ON DELETE.
    OnDeleteBehavior,
    /// Foreign key ON UPDATE.
    OnUpdateBehavior,
    /// Check condition.
    Condition,
    /// View query.
    Query,
    /// Table primary key.
    PrimaryKey,
}

/// A snapshot of one property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackedValue {
    /// A name.
    Name(String),
    /// A boolean flag.
    Flag(bool),
    /// A column type.
    DataType(DataType),
    /// An optional expression.
    Expr(Option<Expr>),
    /// An index column list.
    Columns(Vec<IndexColumn>),
    /// A foreign key action.
    Action(ForeignKeyAction),
    /// A view query.
    Query(ViewQuery),
    /// An optional object reference.
    Object(Option<ObjectId>),
}

impl TrackedValue {
    /// The name, if this is a name value.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// Records pre-batch values and object lifecycle events.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    originals: HashMap<(ObjectId, Descriptor), TrackedValue>,
    created: HashSet<ObjectId>,
    created_order: Vec<ObjectId>,
    removed: Vec<ObjectId>,
    touched: Vec<ObjectId>,
    touched_set: HashSet<ObjectId>,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, container: ObjectId) {
        if self.touched_set.insert(container) {
            self.touched.push(container);
        }
    }

    /// Records that `descriptor` of `id` changed from `before` to `after`.
    ///
    /// The first `before` seen in a batch is kept. A change back to that
    /// value erases the record.
    pub fn record_change(
        &mut self,
        id: ObjectId,
        container: ObjectId,
        descriptor: Descriptor,
        before: TrackedValue,
        after: TrackedValue,
    ) {
        debug!(object = %id, descriptor = ?descriptor, "Tracked change");
        self.touch(container);
        if self.created.contains(&id) {
            return;
        }
        let key = (id, descriptor);
        match self.originals.get(&key) {
            Some(original) if *original == after => {
                self.originals.remove(&key);
            }
            Some(_) => {}
            None if before != after => {
                self.originals.insert(key, before);
            }
            None => {}
        }
    }

    /// Records that `id` was created in this batch.
    pub fn record_created(&mut self, id: ObjectId, container: ObjectId) {
        debug!(object = %id, "Tracked creation");
        self.touch(container);
        if self.created.insert(id) {
            self.created_order.push(id);
        }
    }

    /// Records that `id` was removed.
    ///
    /// Removing an object created in the same batch erases it from the
    /// ledger entirely.
    pub fn record_removed(&mut self, id: ObjectId, container: ObjectId) {
        debug!(object = %id, "Tracked removal");
        self.touch(container);
        if self.created.remove(&id) {
            self.created_order.retain(|c| *c != id);
            self.originals.retain(|(object, _), _| *object != id);
            return;
        }
        if !self.removed.contains(&id) {
            self.removed.push(id);
        }
    }

    /// Value of `descriptor` on `id` before the batch, if it changed.
    #[must_use]
    pub fn original_value(&self, id: ObjectId, descriptor: Descriptor) -> Option<&TrackedValue> {
        self.originals.get(&(id, descriptor))
    }

    /// Name of `id` before the batch, if it was renamed.
    #[must_use]
    pub fn original_name(&self, id: ObjectId) -> Option<&str> {
        self.original_value(id, Descriptor::Name)
            .and_then(TrackedValue::as_name)
    }

    /// Returns true if `descriptor` of `id` differs from its pre-batch
    /// value.
    #[must_use]
    pub fn has_changed(&self, id: ObjectId, descriptor: Descriptor) -> bool {
        self.originals.contains_key(&(id, descriptor))
    }

    /// Descriptors of `id` changed in this batch, in declaration order.
    #[must_use]
    pub fn changed_descriptors(&self, id: ObjectId) -> Vec<Descriptor> {
        let mut descriptors: Vec<Descriptor> = self
            .originals
            .keys()
            .filter(|(object, _)| *object == id)
            .map(|(_, d)| *d)
            .collect();
        descriptors.sort_unstable();
        descriptors
    }

    /// Returns true if `id` was created in this batch.
    #[must_use]
    pub fn is_created(&self, id: ObjectId) -> bool {
        self.created.contains(&id)
    }

    /// Returns true if pre-existing `id` was removed in this batch.
    #[must_use]
    pub fn is_removed(&self, id: ObjectId) -> bool {
        self.removed.contains(&id)
    }

    /// Objects created in this batch, in creation order.
    pub fn created(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.created_order.iter().copied()
    }

    /// Pre-existing objects removed in this batch, in removal order.
    pub fn removed(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.removed.iter().copied()
    }

    /// Ids of objects with at least one changed descriptor.
    #[must_use]
    pub fn modified(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.originals.keys().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Schemas, tables and views touched in this batch, in first-touch
    /// order.
    pub fn touched(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.touched.iter().copied()
    }

    /// Returns true if anything needs to be flushed.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.originals.is_empty() || !self.created.is_empty() || !self.removed.is_empty()
    }

    /// Forgets everything recorded in the batch.
    pub fn reset(&mut self) {
        self.originals.clear();
        self.created.clear();
        self.created_order.clear();
        self.removed.clear();
        self.touched.clear();
        self.touched_set.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ObjectId {
        ObjectId::new(raw)
    }

    fn name(value: &str) -> TrackedValue {
        TrackedValue::Name(value.to_string())
    }

    #[test]
    fn test_first_original_is_kept() {
        let mut tracker = ChangeTracker::new();
        tracker.record_change(id(2), id(1), Descriptor::Name, name("a"), name("b"));
        tracker.record_change(id(2), id(1), Descriptor::Name, name("b"), name("c"));
        assert_eq!(tracker.original_name(id(2)), Some("a"));
        assert_eq!(tracker.changed_descriptors(id(2)), vec![Descriptor::Name]);
    }

    #[test]
    fn test_change_back_erases_record() {
        let mut tracker = ChangeTracker::new();
        tracker.record_change(id(2), id(1), Descriptor::Name, name("a"), name("b"));
        tracker.record_change(id(2), id(1), Descriptor::Name, name("b"), name("a"));
        assert!(tracker.original_value(id(2), Descriptor::Name).is_none());
        assert!(!tracker.has_pending_changes());
        // The container stays touched.
        assert_eq!(tracker.touched().collect::<Vec<_>>(), vec![id(1)]);
    }

    #[test]
    fn test_created_objects_have_no_originals() {
        let mut tracker = ChangeTracker::new();
        tracker.record_created(id(3), id(1));
        tracker.record_change(id(3), id(1), Descriptor::Name, name("x"), name("y"));
        assert!(tracker.original_name(id(3)).is_none());
        assert!(tracker.is_created(id(3)));
    }

    #[test]
    fn test_create_then_remove_cancels() {
        let mut tracker = ChangeTracker::new();
        tracker.record_created(id(3), id(1));
        tracker.record_removed(id(3), id(1));
        assert!(!tracker.is_created(id(3)));
        assert!(!tracker.is_removed(id(3)));
        assert!(!tracker.has_pending_changes());
    }

    #[test]
    fn test_reset() {
        let mut tracker = ChangeTracker::new();
        tracker.record_removed(id(4), id(1));
        tracker.record_change(
            id(5),
            id(1),
            Descriptor::IsNullable,
            TrackedValue::Flag(true),
            TrackedValue::Flag(false),
        );
        assert_eq!(tracker.modified(), vec![id(5)]);
        tracker.reset();
        assert!(!tracker.has_pending_changes());
        assert_eq!(tracker.touched().count(), 0);
    }
}
