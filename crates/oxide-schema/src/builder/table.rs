use std::collections::BTreeSet;

use super::{
    Builder, CheckId, ColumnId, ForeignKeyId, IndexId, NamedCollection, ObjectBuilder, ObjectId,
    ObjectKind, PrimaryKeyId, ReferenceSet, SchemaId, TableId, TypedId,
};
use crate::database::Database;
use crate::error::{Result, SchemaError};

/// A table: owns columns and constraints, lists its indexes.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) columns: NamedCollection,
    pub(crate) constraints: NamedCollection,
    pub(crate) indexes: Vec<IndexId>,
    pub(crate) primary_key: Option<PrimaryKeyId>,
    pub(crate) referencing_views: ReferenceSet,
}

impl TableBuilder {
    fn new(base: ObjectBuilder) -> Self {
        Self {
            base,
            columns: NamedCollection::new(),
            constraints: NamedCollection::new(),
            indexes: Vec::new(),
            primary_key: None,
            referencing_views: ReferenceSet::new(),
        }
    }

    /// Table handle.
    #[must_use]
    pub fn id(&self) -> TableId {
        TableId::from_object_id(self.base.id())
    }

    /// Identity header.
    #[must_use]
    pub fn base(&self) -> &ObjectBuilder {
        &self.base
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Owning schema.
    #[must_use]
    pub fn schema(&self) -> SchemaId {
        SchemaId::from_object_id(self.base.parent().unwrap_or(self.base.id()))
    }

    /// Columns in position order.
    #[must_use]
    pub fn columns(&self) -> &NamedCollection {
        &self.columns
    }

    /// Primary, foreign key and check constraints.
    #[must_use]
    pub fn constraints(&self) -> &NamedCollection {
        &self.constraints
    }

    /// Indexes on this table, including the primary key index.
    #[must_use]
    pub fn indexes(&self) -> &[IndexId] {
        &self.indexes
    }

    /// The primary key, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<PrimaryKeyId> {
        self.primary_key
    }

    /// Views selecting from this table.
    #[must_use]
    pub fn referencing_views(&self) -> &ReferenceSet {
        &self.referencing_views
    }
}

impl Database {
    /// Creates an empty table in `schema`.
    pub fn create_table(&mut self, schema: SchemaId, name: &str) -> Result<TableId> {
        self.schema(schema)?.base.ensure_live()?;
        self.ensure_name_free(Some(schema.id()), ObjectKind::Table, name)?;
        let id = self.allocate_id();
        self.register_name(Some(schema.id()), ObjectKind::Table, name, id)?;
        self.insert_builder(Builder::Table(TableBuilder::new(ObjectBuilder::new(
            id,
            name,
            ObjectKind::Table,
            Some(schema.id()),
        ))));
        self.record_created(id)?;
        Ok(TableId::from_object_id(id))
    }

    /// Columns of `table` in position order.
    pub fn columns(&self, table: TableId) -> Result<Vec<ColumnId>> {
        Ok(self
            .table(table)?
            .columns
            .ids()
            .map(ColumnId::from_object_id)
            .collect())
    }

    /// Indexes of `table` in creation order.
    pub fn indexes(&self, table: TableId) -> Result<Vec<IndexId>> {
        Ok(self.table(table)?.indexes.clone())
    }

    /// Foreign keys originating from `table`.
    pub fn foreign_keys(&self, table: TableId) -> Result<Vec<ForeignKeyId>> {
        self.constraints_of_kind(table, ObjectKind::ForeignKey)
    }

    /// Check constraints of `table`.
    pub fn checks(&self, table: TableId) -> Result<Vec<CheckId>> {
        self.constraints_of_kind(table, ObjectKind::Check)
    }

    fn constraints_of_kind<T: TypedId>(&self, table: TableId, kind: ObjectKind) -> Result<Vec<T>> {
        Ok(self
            .table(table)?
            .constraints
            .ids()
            .filter(|id| self.builder(*id).is_ok_and(|b| b.kind() == kind))
            .map(T::from_object_id)
            .collect())
    }

    /// Removes a table with its columns, indexes and constraints.
    ///
    /// Views reading the table and foreign keys from other tables block
    /// the removal; every blocker is reported.
    pub(crate) fn remove_table(&mut self, table: TableId) -> Result<()> {
        SchemaError::collect(self.table_removal_violations(table)?)?;
        self.detach_table(table)
    }

    fn table_removal_violations(&self, table: TableId) -> Result<Vec<SchemaError>> {
        let builder = self.table(table)?;
        let mut errors = Vec::new();
        let mut views: BTreeSet<ObjectId> = builder.referencing_views.ids().collect();
        for column in builder.columns.ids() {
            views.extend(self.column(ColumnId::from_object_id(column))?.views.ids());
        }
        for view in views {
            errors.push(SchemaError::referential(
                self.display_name(table),
                format!("still referenced by view '{}'", self.display_name(view)),
            ));
        }
        for index in &builder.indexes {
            for fk in self.index(*index)?.referencing_keys.ids() {
                if self.table_of(fk)? != table {
                    errors.push(SchemaError::referential(
                        self.display_name(table),
                        format!("still referenced by foreign key '{}'", self.display_name(fk)),
                    ));
                }
            }
        }
        Ok(errors)
    }

    /// Removes the table and everything it owns without checking
    /// external references.
    pub(crate) fn detach_table(&mut self, table: TableId) -> Result<()> {
        let mut staged = self.scratch.rent();
        let result = self.detach_table_members(table, &mut staged);
        self.scratch.release(staged);
        result?;
        self.mark_removed(table.id())
    }

    fn detach_table_members(&mut self, table: TableId, staged: &mut Vec<ObjectId>) -> Result<()> {
        let builder = self.table(table)?;
        let indexes = builder.indexes.clone();

        // Foreign keys first: owned ones and those pointing at our indexes.
        staged.extend(self.foreign_keys(table)?.into_iter().map(ForeignKeyId::id));
        for index in &indexes {
            staged.extend(self.index(*index)?.referencing_keys.ids());
        }
        staged.sort_unstable();
        staged.dedup();
        for fk in staged.drain(..) {
            self.detach_foreign_key(ForeignKeyId::from_object_id(fk))?;
        }

        for check in self.checks(table)? {
            self.detach_check(check)?;
        }
        let primary_key = self.table(table)?.primary_key;
        if let Some(pk) = primary_key {
            self.detach_primary_key(pk)?;
        }
        for index in indexes {
            self.detach_index(index)?;
        }

        staged.extend(self.table(table)?.columns.ids());
        for column in staged.drain(..) {
            self.detach_column(ColumnId::from_object_id(column))?;
        }
        Ok(())
    }
}
