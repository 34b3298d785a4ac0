//! Read-only preview of the pending batch.

use serde::Serialize;

use crate::builder::{Builder, ObjectId, ObjectKind};
use crate::database::Database;
use crate::error::Result;
use crate::tracking::{Descriptor, TrackedValue};

/// One property changed in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    /// The property.
    pub descriptor: Descriptor,
    /// Value before the batch.
    pub original: TrackedValue,
    /// Value now.
    pub current: Option<TrackedValue>,
}

/// An object created or removed in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    /// Object id.
    pub id: ObjectId,
    /// Object kind.
    pub kind: ObjectKind,
    /// Full name.
    pub name: String,
}

/// A live, pre-existing object with changed properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectChanges {
    /// Object id.
    pub id: ObjectId,
    /// Object kind.
    pub kind: ObjectKind,
    /// Full name.
    pub name: String,
    /// Changed properties.
    pub changes: Vec<PropertyChange>,
}

/// Everything pending in the current batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSummary {
    /// Objects created in the batch, in creation order.
    pub created: Vec<ObjectSummary>,
    /// Pre-existing objects removed in the batch, in removal order.
    pub removed: Vec<ObjectSummary>,
    /// Pre-existing objects with changed properties.
    pub modified: Vec<ObjectChanges>,
}

impl ChangeSummary {
    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Database {
    /// Current value of `descriptor` on `id`, or `None` if the object
    /// has no such property.
    pub fn current_value(
        &self,
        id: impl Into<ObjectId>,
        descriptor: Descriptor,
    ) -> Result<Option<TrackedValue>> {
        let builder = self.builder(id)?;
        Ok(match (builder, descriptor) {
            (b, Descriptor::Name) => Some(TrackedValue::Name(b.base().name().to_string())),
            (Builder::Column(c), Descriptor::IsNullable) => Some(TrackedValue::Flag(c.is_nullable())),
            (Builder::Column(c), Descriptor::DefaultValue) => {
                Some(TrackedValue::Expr(c.default().cloned()))
            }
            (Builder::Column(c), Descriptor::DataType) => {
                Some(TrackedValue::DataType(c.data_type().clone()))
            }
            (Builder::Index(i), Descriptor::Filter) => Some(TrackedValue::Expr(i.filter().cloned())),
            (Builder::Index(i), Descriptor::IsUnique) => Some(TrackedValue::Flag(i.is_unique())),
            (Builder::Index(i), Descriptor::IndexColumns) => {
                Some(TrackedValue::Columns(i.columns().to_vec()))
            }
            (Builder::ForeignKey(fk), Descriptor::OnDeleteBehavior) => {
                Some(TrackedValue::Action(fk.on_delete()))
            }
            (Builder::ForeignKey(fk), Descriptor::OnUpdateBehavior) => {
                Some(TrackedValue::Action(fk.on_update()))
            }
            (Builder::Check(c), Descriptor::Condition) => {
                Some(TrackedValue::Expr(Some(c.condition().clone())))
            }
            (Builder::View(v), Descriptor::Query) => Some(TrackedValue::Query(v.query().clone())),
            (Builder::Table(t), Descriptor::PrimaryKey) => {
                Some(TrackedValue::Object(t.primary_key().map(|pk| pk.id())))
            }
            _ => None,
        })
    }

    /// Original and current value of every property of `id` changed in
    /// the batch.
    pub fn changes_for(&self, id: impl Into<ObjectId>) -> Result<Vec<PropertyChange>> {
        let id = id.into();
        let mut changes = Vec::new();
        for descriptor in self.tracker.changed_descriptors(id) {
            let Some(original) = self.tracker.original_value(id, descriptor) else {
                continue;
            };
            changes.push(PropertyChange {
                descriptor,
                original: original.clone(),
                current: self.current_value(id, descriptor)?,
            });
        }
        Ok(changes)
    }

    /// Summarizes the pending batch without compiling it.
    pub fn change_summary(&self) -> Result<ChangeSummary> {
        let describe = |id: ObjectId| -> Result<ObjectSummary> {
            Ok(ObjectSummary {
                id,
                kind: self.builder(id)?.kind(),
                name: self.display_name(id),
            })
        };

        let mut summary = ChangeSummary::default();
        for id in self.tracker.created() {
            summary.created.push(describe(id)?);
        }
        for id in self.tracker.removed() {
            summary.removed.push(describe(id)?);
        }
        for id in self.tracker.modified() {
            if self.tracker.is_removed(id) {
                continue;
            }
            let ObjectSummary { id, kind, name } = describe(id)?;
            summary.modified.push(ObjectChanges {
                id,
                kind,
                name,
                changes: self.changes_for(id)?,
            });
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnDefinition;
    use crate::types::DataType;

    #[test]
    fn test_summary_lists_changes() {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let t = db.create_table(main, "t").unwrap();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        db.accept_changes();
        assert!(db.change_summary().unwrap().is_empty());

        db.rename(a, "b").unwrap();
        db.set_nullable(a, false).unwrap();
        let c = db
            .create_column(t, ColumnDefinition::new("c", DataType::Text))
            .unwrap();

        let summary = db.change_summary().unwrap();
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].id, c.id());
        assert_eq!(summary.created[0].name, "main.t.c");

        assert_eq!(summary.modified.len(), 1);
        let changes = &summary.modified[0].changes;
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].descriptor, Descriptor::Name);
        assert_eq!(changes[0].original, TrackedValue::Name(String::from("a")));
        assert_eq!(
            changes[0].current,
            Some(TrackedValue::Name(String::from("b")))
        );
        assert_eq!(changes[1].descriptor, Descriptor::IsNullable);

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"IsNullable\""));
    }

    #[test]
    fn test_current_value_for_missing_property() {
        let db = Database::sqlite();
        let main = db.default_schema();
        assert_eq!(db.current_value(main, Descriptor::Query).unwrap(), None);
        assert_eq!(
            db.current_value(main, Descriptor::Name).unwrap(),
            Some(TrackedValue::Name(String::from("main")))
        );
    }
}
