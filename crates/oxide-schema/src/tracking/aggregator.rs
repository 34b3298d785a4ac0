//! Per-table rollup of tracked changes.
//!
//! The tracker records changes object by object. Planning works table
//! by table, so [`ChangeAggregator`] folds the ledger entries of a
//! table's columns, indexes and constraints into one [`TableChanges`]
//! value that the compiler can inspect and turn into statements.

use crate::builder::{
    ColumnBuilder, ColumnId, IndexId, ObjectId, ObjectKind, PrimaryKeyId, TableId, TypedId,
};
use crate::database::Database;
use crate::dialect::AlterCapabilities;
use crate::error::Result;
use crate::expr::Expr;
use crate::tracking::{Descriptor, TrackedValue};
use crate::types::DataType;

/// What happened to a column in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnState {
    /// Nothing changed.
    Unchanged,
    /// Added in the batch.
    Created,
    /// Removed in the batch.
    Removed,
    /// Only the name changed.
    Renamed,
    /// Type, nullability or default changed, possibly with the name.
    Modified,
}

/// A column's transition from its pre-batch state.
#[derive(Debug, Clone)]
pub struct ColumnDelta {
    /// The column.
    pub column: ColumnId,
    /// Overall classification.
    pub state: ColumnState,
    /// Name before the batch.
    pub original_name: String,
    /// Name after the batch.
    pub name: String,
    /// Type before the batch.
    pub original_type: DataType,
    /// Nullability before the batch.
    pub original_nullable: bool,
    /// The name changed.
    pub renamed: bool,
    /// The type changed.
    pub type_changed: bool,
    /// The nullability changed.
    pub nullability_changed: bool,
    /// The default changed.
    pub default_changed: bool,
}

impl ColumnDelta {
    /// The column survives the batch and existed before it.
    #[must_use]
    pub fn is_surviving(&self) -> bool {
        !matches!(self.state, ColumnState::Created | ColumnState::Removed)
    }
}

/// An index's transition from its pre-batch state.
///
/// "Virtual" means the index backs the primary key and renders as the
/// PRIMARY KEY constraint.
#[derive(Debug, Clone)]
pub struct IndexTransition {
    /// The index.
    pub index: IndexId,
    /// Name before the batch.
    pub original_name: String,
    /// Existed before the batch.
    pub existed: bool,
    /// Backed the primary key before the batch.
    pub was_virtual: bool,
    /// Exists after the batch.
    pub exists: bool,
    /// Backs the primary key after the batch.
    pub is_virtual: bool,
    /// Uniqueness, columns or filter changed, or the name changed on an
    /// engine that cannot rename indexes.
    pub changed: bool,
    /// Only the name changed and the engine renames indexes in place.
    pub renamed: bool,
}

impl IndexTransition {
    /// A CREATE INDEX from before the batch must be dropped.
    #[must_use]
    pub fn needs_drop(&self) -> bool {
        self.existed && !self.was_virtual && (!self.exists || self.is_virtual || self.changed)
    }

    /// A CREATE INDEX must be issued for the post-batch state.
    #[must_use]
    pub fn needs_create(&self) -> bool {
        self.exists && !self.is_virtual && (!self.existed || self.was_virtual || self.changed)
    }

    /// An `ALTER INDEX ... RENAME` is enough.
    #[must_use]
    pub fn needs_rename(&self) -> bool {
        self.renamed && !self.needs_drop() && !self.needs_create()
    }
}

/// A foreign key or check constraint transition.
#[derive(Debug, Clone)]
pub struct ConstraintDelta {
    /// The constraint.
    pub constraint: ObjectId,
    /// Foreign key or check.
    pub kind: ObjectKind,
    /// Name before the batch.
    pub original_name: String,
    /// The pre-batch constraint must be dropped.
    pub drop: bool,
    /// The post-batch constraint must be added.
    pub add: bool,
    /// Only the name changed and the engine renames constraints in place.
    pub rename: bool,
}

/// Everything that changed on one pre-existing table.
#[derive(Debug, Clone)]
pub struct TableChanges {
    /// The table.
    pub table: TableId,
    /// Name before the batch.
    pub original_name: String,
    /// The table was renamed.
    pub renamed: bool,
    /// Live columns in position order, followed by removed columns.
    pub columns: Vec<ColumnDelta>,
    /// Indexes that exist before or after the batch.
    pub indexes: Vec<IndexTransition>,
    /// Foreign key and check transitions.
    pub constraints: Vec<ConstraintDelta>,
    /// Primary key before the batch.
    pub original_primary_key: Option<PrimaryKeyId>,
    /// The primary key was added, removed or redefined.
    pub primary_key_replaced: bool,
    /// Only the primary key name changed and the engine renames
    /// constraints in place.
    pub primary_key_renamed: bool,
}

impl TableChanges {
    /// Returns true if anything beyond the table name changed.
    #[must_use]
    pub fn has_structural_changes(&self) -> bool {
        self.columns.iter().any(|c| c.state != ColumnState::Unchanged)
            || self
                .indexes
                .iter()
                .any(|i| i.needs_drop() || i.needs_create() || i.needs_rename())
            || self.constraints.iter().any(|c| c.drop || c.add || c.rename)
            || self.primary_key_replaced
            || self.primary_key_renamed
    }

    /// Columns in `state`.
    pub fn columns_in(&self, state: ColumnState) -> impl Iterator<Item = &ColumnDelta> {
        self.columns.iter().filter(move |c| c.state == state)
    }

    /// Returns true if the changes cannot be applied in place by an
    /// engine with `capabilities`, so the table must be rebuilt.
    #[must_use]
    pub fn requires_reconstruction(
        &self,
        db: &Database,
        capabilities: &AlterCapabilities,
    ) -> bool {
        let column_needs_rebuild = |delta: &ColumnDelta| -> bool {
            let Ok(column) = db.column(delta.column) else {
                return false;
            };
            match delta.state {
                ColumnState::Removed => !capabilities.drop_column,
                ColumnState::Created => {
                    let unfillable = !column.is_nullable() && column.default().is_none();
                    let expression_default = column.default().is_some_and(|d| !d.is_constant());
                    (unfillable && !capabilities.alter_column_nullability)
                        || (expression_default && !capabilities.add_column_expression_default)
                }
                ColumnState::Unchanged => false,
                ColumnState::Renamed | ColumnState::Modified => {
                    let became_required = delta.original_nullable && !column.is_nullable();
                    (delta.renamed && !capabilities.rename_column)
                        || (delta.type_changed && !capabilities.alter_column_type)
                        || (delta.nullability_changed && !capabilities.alter_column_nullability)
                        || (became_required
                            && !column.default().is_some_and(Expr::is_constant)
                            && !capabilities.alter_column_nullability)
                        || (delta.default_changed && !capabilities.alter_column_default)
                }
            }
        };

        self.columns.iter().any(column_needs_rebuild)
            || (!capabilities.alter_constraints
                && (self.primary_key_replaced
                    || self.constraints.iter().any(|c| c.drop || c.add)))
    }
}

/// Folds tracked changes into [`TableChanges`].
///
/// Name-only changes of indexes and constraints are classified against
/// the capabilities of the database's dialect: renamed in place when the
/// engine supports it, dropped and recreated otherwise.
#[derive(Debug, Clone, Copy)]
pub struct ChangeAggregator<'a> {
    db: &'a Database,
    capabilities: AlterCapabilities,
}

impl<'a> ChangeAggregator<'a> {
    /// Creates an aggregator over the pending batch of `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            capabilities: db.dialect().capabilities(),
        }
    }

    fn original_name(&self, id: impl Into<ObjectId>) -> Result<String> {
        let id = id.into();
        match self.db.tracker().original_name(id) {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.db.name(id)?.to_string()),
        }
    }

    fn changed(&self, id: impl Into<ObjectId>, descriptor: Descriptor) -> bool {
        self.db.tracker().has_changed(id.into(), descriptor)
    }

    /// Pre-existing objects of `kind` removed from `table` in the batch.
    fn removed_members(&self, table: TableId, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let mut members = Vec::new();
        for id in self.db.tracker().removed() {
            let base = self.db.base(id)?;
            if base.kind() == kind && base.parent() == Some(table.id()) {
                members.push(id);
            }
        }
        Ok(members)
    }

    /// Collects the changes of `table`.
    pub fn aggregate(&self, table: TableId) -> Result<TableChanges> {
        let builder = self.db.table(table)?;
        let original_primary_key = match self.db.original_value(table, Descriptor::PrimaryKey) {
            Some(TrackedValue::Object(pk)) => pk.map(PrimaryKeyId::from_object_id),
            _ => builder.primary_key(),
        };
        let original_pk_index = match original_primary_key {
            Some(pk) => Some(self.db.primary_key(pk)?.index()),
            None => None,
        };

        let mut columns = Vec::new();
        for column in builder.columns().ids() {
            columns.push(self.column_delta(self.db.column(ColumnId::from_object_id(column))?)?);
        }
        for column in self.removed_members(table, ObjectKind::Column)? {
            let builder = self.db.column(ColumnId::from_object_id(column))?;
            let mut delta = self.column_delta(builder)?;
            delta.state = ColumnState::Removed;
            columns.push(delta);
        }

        let mut indexes = Vec::new();
        let removed_indexes = self.removed_members(table, ObjectKind::Index)?;
        let all_indexes = builder
            .indexes()
            .iter()
            .copied()
            .chain(removed_indexes.into_iter().map(IndexId::from_object_id));
        for index in all_indexes {
            indexes.push(self.index_transition(index, original_pk_index)?);
        }

        let (pk_renamed, pk_redefined) = match builder.primary_key() {
            Some(pk) => (
                self.changed(pk, Descriptor::Name),
                self.changed(self.db.primary_key(pk)?.index(), Descriptor::IndexColumns),
            ),
            None => (false, false),
        };
        let primary_key_replaced = self.changed(table, Descriptor::PrimaryKey)
            || pk_redefined
            || (pk_renamed && !self.capabilities.rename_constraint);
        let primary_key_renamed = pk_renamed && !primary_key_replaced;

        Ok(TableChanges {
            table,
            original_name: self.original_name(table)?,
            renamed: self.changed(table, Descriptor::Name),
            columns,
            indexes,
            constraints: self.constraint_deltas(table)?,
            original_primary_key,
            primary_key_replaced,
            primary_key_renamed,
        })
    }

    fn column_delta(&self, column: &ColumnBuilder) -> Result<ColumnDelta> {
        let id = column.id();
        let original_type = match self.db.original_value(id, Descriptor::DataType) {
            Some(TrackedValue::DataType(data_type)) => data_type.clone(),
            _ => column.data_type().clone(),
        };
        let original_nullable = match self.db.original_value(id, Descriptor::IsNullable) {
            Some(TrackedValue::Flag(nullable)) => *nullable,
            _ => column.is_nullable(),
        };
        let renamed = self.changed(id, Descriptor::Name);
        let type_changed = self.changed(id, Descriptor::DataType);
        let nullability_changed = self.changed(id, Descriptor::IsNullable);
        let default_changed = self.changed(id, Descriptor::DefaultValue);

        let state = if self.db.tracker().is_created(id.id()) {
            ColumnState::Created
        } else if column.base().is_removed() {
            ColumnState::Removed
        } else if type_changed || nullability_changed || default_changed {
            ColumnState::Modified
        } else if renamed {
            ColumnState::Renamed
        } else {
            ColumnState::Unchanged
        };

        Ok(ColumnDelta {
            column: id,
            state,
            original_name: self.original_name(id)?,
            name: column.name().to_string(),
            original_type,
            original_nullable,
            renamed,
            type_changed,
            nullability_changed,
            default_changed,
        })
    }

    fn index_transition(
        &self,
        index: IndexId,
        original_pk_index: Option<IndexId>,
    ) -> Result<IndexTransition> {
        let builder = self.db.index(index)?;
        let existed = !self.db.tracker().is_created(index.id());
        let exists = !builder.base().is_removed();
        let survives = existed && exists;
        let name_changed = survives && self.changed(index, Descriptor::Name);
        let redefined = survives
            && [Descriptor::IsUnique, Descriptor::IndexColumns, Descriptor::Filter]
                .into_iter()
                .any(|d| self.changed(index, d));
        let changed = redefined || (name_changed && !self.capabilities.rename_index);
        Ok(IndexTransition {
            index,
            original_name: self.original_name(index)?,
            existed,
            was_virtual: original_pk_index == Some(index),
            exists,
            is_virtual: exists && builder.is_virtual(),
            changed,
            renamed: name_changed && !changed,
        })
    }

    fn constraint_deltas(&self, table: TableId) -> Result<Vec<ConstraintDelta>> {
        let tracker = self.db.tracker();
        let mut deltas = Vec::new();

        for fk in self.db.foreign_keys(table)? {
            let builder = self.db.foreign_key(fk)?;
            let created = tracker.is_created(fk.id());
            let redefined = self.changed(fk, Descriptor::OnDeleteBehavior)
                || self.changed(fk, Descriptor::OnUpdateBehavior)
                || self.changed(builder.origin(), Descriptor::IndexColumns)
                || self.changed(builder.referenced(), Descriptor::IndexColumns);
            deltas.push(self.constraint_delta(
                fk.id(),
                ObjectKind::ForeignKey,
                created,
                redefined,
            )?);
        }

        for check in self.db.checks(table)? {
            let created = tracker.is_created(check.id());
            let redefined = self.changed(check, Descriptor::Condition);
            deltas.push(self.constraint_delta(check.id(), ObjectKind::Check, created, redefined)?);
        }

        for kind in [ObjectKind::ForeignKey, ObjectKind::Check] {
            for removed in self.removed_members(table, kind)? {
                deltas.push(ConstraintDelta {
                    constraint: removed,
                    kind,
                    original_name: self.original_name(removed)?,
                    drop: true,
                    add: false,
                    rename: false,
                });
            }
        }
        Ok(deltas)
    }

    fn constraint_delta(
        &self,
        constraint: ObjectId,
        kind: ObjectKind,
        created: bool,
        redefined: bool,
    ) -> Result<ConstraintDelta> {
        let name_changed = !created && self.changed(constraint, Descriptor::Name);
        let changed = !created
            && (redefined || (name_changed && !self.capabilities.rename_constraint));
        Ok(ConstraintDelta {
            constraint,
            kind,
            original_name: self.original_name(constraint)?,
            drop: changed,
            add: created || changed,
            rename: name_changed && !changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ColumnDefinition, IndexDefinition};
    use crate::expr::lit;

    fn baseline() -> (Database, TableId, ColumnId, ColumnId) {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let t = db.create_table(main, "t").unwrap();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer).not_null())
            .unwrap();
        let b = db
            .create_column(t, ColumnDefinition::new("b", DataType::Text))
            .unwrap();
        db.create_primary_key(t, "pk_t", &[a]).unwrap();
        db.accept_changes();
        (db, t, a, b)
    }

    #[test]
    fn test_unchanged_table() {
        let (db, t, _, _) = baseline();
        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        assert!(!changes.has_structural_changes());
        assert!(!changes.renamed);
        assert!(changes.indexes.iter().all(|i| i.was_virtual && i.is_virtual));
    }

    #[test]
    fn test_column_states() {
        let (mut db, t, a, b) = baseline();
        db.rename(a, "id").unwrap();
        db.set_data_type(b, DataType::Integer).unwrap();
        let c = db
            .create_column(t, ColumnDefinition::new("c", DataType::Integer))
            .unwrap();

        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        let state = |id: ColumnId| {
            changes
                .columns
                .iter()
                .find(|d| d.column == id)
                .map(|d| d.state)
                .unwrap()
        };
        assert_eq!(state(a), ColumnState::Renamed);
        assert_eq!(state(b), ColumnState::Modified);
        assert_eq!(state(c), ColumnState::Created);
        assert_eq!(changes.columns_in(ColumnState::Renamed).next().unwrap().original_name, "a");

        let restrictive = AlterCapabilities::restrictive();
        assert!(changes.requires_reconstruction(&db, &restrictive));
        assert!(!changes.requires_reconstruction(&db, &AlterCapabilities::full()));
    }

    #[test]
    fn test_rename_and_constant_add_stay_in_place() {
        let (mut db, t, _, b) = baseline();
        db.rename(b, "c").unwrap();
        db.create_column(t, ColumnDefinition::new("d", DataType::Integer).default(lit(0)))
            .unwrap();
        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        assert!(!changes.requires_reconstruction(&db, &AlterCapabilities::restrictive()));
    }

    #[test]
    fn test_removed_column_is_reported() {
        let (mut db, t, _, b) = baseline();
        db.remove(b).unwrap();
        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        let removed: Vec<_> = changes.columns_in(ColumnState::Removed).collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].original_name, "b");
        assert!(changes.requires_reconstruction(&db, &AlterCapabilities::restrictive()));
    }

    #[test]
    fn test_primary_key_removal_keeps_unique_index() {
        let (mut db, t, _, _) = baseline();
        let pk = db.table(t).unwrap().primary_key().unwrap();
        let index = db.primary_key(pk).unwrap().index();
        db.remove(pk).unwrap();

        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        assert!(changes.primary_key_replaced);
        assert_eq!(changes.original_primary_key, Some(pk));
        let transition = changes.indexes.iter().find(|i| i.index == index).unwrap();
        assert!(transition.was_virtual);
        assert!(!transition.is_virtual);
        assert!(transition.needs_create());
        assert!(!transition.needs_drop());
    }

    #[test]
    fn test_index_changes() {
        let (mut db, t, a, b) = baseline();
        let ix = db
            .create_index(t, IndexDefinition::new("ix_b").column(b))
            .unwrap();
        db.accept_changes();
        db.set_unique(ix, true).unwrap();
        let fresh = db
            .create_index(t, IndexDefinition::new("ix_ab").column(a).column(b))
            .unwrap();

        let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
        let find = |id: IndexId| changes.indexes.iter().find(|i| i.index == id).unwrap();
        assert!(find(ix).needs_drop());
        assert!(find(ix).needs_create());
        assert!(!find(fresh).needs_drop());
        assert!(find(fresh).needs_create());
    }

    #[test]
    fn test_name_only_changes_follow_dialect() {
        for (mut db, in_place) in [(Database::postgres(), true), (Database::sqlite(), false)] {
            let schema = db.default_schema();
            let t = db.create_table(schema, "t").unwrap();
            let a = db
                .create_column(t, ColumnDefinition::new("a", DataType::Integer).not_null())
                .unwrap();
            let pk = db.create_primary_key(t, "pk_t", &[a]).unwrap();
            let ix = db
                .create_index(t, IndexDefinition::new("ix_a").column(a))
                .unwrap();
            db.accept_changes();
            db.rename(ix, "ix_t_a").unwrap();
            db.rename(pk, "t_pkey").unwrap();

            let changes = ChangeAggregator::new(&db).aggregate(t).unwrap();
            let transition = changes.indexes.iter().find(|i| i.index == ix).unwrap();
            assert_eq!(transition.needs_rename(), in_place);
            assert_eq!(transition.needs_drop(), !in_place);
            assert_eq!(changes.primary_key_renamed, in_place);
            assert_eq!(changes.primary_key_replaced, !in_place);
        }
    }
}
